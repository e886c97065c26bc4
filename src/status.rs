/*!
 * Status Records
 * File, directory and filesystem-capacity status with serde support
 */

use serde::{Deserialize, Deserializer, Serialize};
use serde_with::{serde_as, TimestampMilliSeconds};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::backend::{BackendStat, BackendStatVfs};

/// Kind of a namespace entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    File,
    Directory,
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FileType::File => write!(f, "file"),
            FileType::Directory => write!(f, "directory"),
        }
    }
}

/// File permissions (Unix-style) with validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(deserialize_with = "deserialize_permission_mode")]
    pub mode: u32,
}

impl Permissions {
    /// Create permissions (masks to valid bits)
    #[inline]
    #[must_use]
    pub const fn new(mode: u32) -> Self {
        Self {
            mode: mode & 0o7777,
        }
    }

    /// Apply a umask
    #[inline]
    #[must_use]
    pub const fn with_umask(self, umask: u32) -> Self {
        Self::new(self.mode & !umask)
    }

    /// Get user permissions (rwx)
    #[inline]
    #[must_use]
    pub const fn user_permissions(&self) -> u32 {
        (self.mode >> 6) & 0o7
    }

    /// Get group permissions (rwx)
    #[inline]
    #[must_use]
    pub const fn group_permissions(&self) -> u32 {
        (self.mode >> 3) & 0o7
    }

    /// Get other permissions (rwx)
    #[inline]
    #[must_use]
    pub const fn other_permissions(&self) -> u32 {
        self.mode & 0o7
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Self::new(0o644)
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let rwx = |bits: u32| {
            format!(
                "{}{}{}",
                if bits & 0o4 != 0 { 'r' } else { '-' },
                if bits & 0o2 != 0 { 'w' } else { '-' },
                if bits & 0o1 != 0 { 'x' } else { '-' }
            )
        };
        write!(
            f,
            "{}{}{}",
            rwx(self.user_permissions()),
            rwx(self.group_permissions()),
            rwx(self.other_permissions())
        )
    }
}

/// Deserialize and validate permission mode (must be <= 0o7777)
fn deserialize_permission_mode<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let mode = u32::deserialize(deserializer)?;
    if mode > 0o7777 {
        return Err(serde::de::Error::custom(format!(
            "invalid permission mode: 0o{:o} exceeds maximum 0o7777",
            mode
        )));
    }
    Ok(mode)
}

/// Status of one namespace entry, recomputed on every query
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FileStatus {
    /// Fully qualified path (`scheme://authority/path`)
    pub path: String,
    pub file_type: FileType,
    pub length: u64,
    pub replication: u16,
    pub block_size: u64,
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    pub modified: SystemTime,
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    pub accessed: SystemTime,
    pub permission: Permissions,
    pub owner: String,
    pub group: Option<String>,
}

impl FileStatus {
    /// Build from backend attributes
    pub fn from_backend(
        path: String,
        stat: &BackendStat,
        replication: u16,
        owner: &str,
    ) -> Self {
        Self {
            path,
            file_type: if stat.is_dir {
                FileType::Directory
            } else {
                FileType::File
            },
            length: stat.size,
            replication,
            block_size: stat.blksize,
            modified: from_millis(stat.mtime_ms),
            accessed: from_millis(stat.atime_ms),
            permission: Permissions::new(stat.mode),
            owner: owner.to_string(),
            group: None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_dir(&self) -> bool {
        matches!(self.file_type, FileType::Directory)
    }

    #[inline]
    #[must_use]
    pub const fn is_file(&self) -> bool {
        matches!(self.file_type, FileType::File)
    }
}

/// Filesystem capacity in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FsStatus {
    pub capacity: u64,
    pub used: u64,
    pub remaining: u64,
}

impl From<BackendStatVfs> for FsStatus {
    fn from(stat: BackendStatVfs) -> Self {
        Self {
            capacity: stat.bsize.saturating_mul(stat.blocks),
            used: stat
                .bsize
                .saturating_mul(stat.blocks.saturating_sub(stat.bavail)),
            remaining: stat.bsize.saturating_mul(stat.bavail),
        }
    }
}

pub(crate) fn from_millis(ms: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(ms)
}

pub(crate) fn to_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
