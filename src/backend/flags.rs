/*!
 * Backend Open Flags and Attribute Masks
 * Translates open intent into the gateway's flag bits
 */

use serde::{Deserialize, Serialize};

use crate::error::FsError;

/// Gateway open flag bits
pub mod bits {
    pub const O_RDONLY: u32 = 1;
    pub const O_RDWR: u32 = 2;
    pub const O_APPEND: u32 = 4;
    pub const O_CREAT: u32 = 8;
    pub const O_TRUNC: u32 = 16;
    pub const O_EXCL: u32 = 32;
    pub const O_WRONLY: u32 = 64;
    pub const O_DIRECTORY: u32 = 128;
}

/// File open intent (skips false values when serialized)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", default, deny_unknown_fields)]
pub struct OpenFlags {
    #[serde(skip_serializing_if = "is_false")]
    pub read: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub write: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub append: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub truncate: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub create: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub create_new: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl OpenFlags {
    /// Read-only flags
    #[inline]
    #[must_use]
    pub fn read_only() -> Self {
        Self {
            read: true,
            ..Default::default()
        }
    }

    /// Write + create; truncates an existing file when `overwrite` is set,
    /// otherwise the backend rejects an existing file
    #[inline]
    #[must_use]
    pub fn create(overwrite: bool) -> Self {
        Self {
            write: true,
            create: overwrite,
            truncate: overwrite,
            create_new: !overwrite,
            ..Default::default()
        }
    }

    /// Write + append to an existing file
    #[inline]
    #[must_use]
    pub fn append_only() -> Self {
        Self {
            write: true,
            append: true,
            ..Default::default()
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_writable(&self) -> bool {
        self.write || self.append
    }

    #[inline]
    #[must_use]
    pub const fn will_create(&self) -> bool {
        self.create || self.create_new
    }

    /// Convert to gateway flag bits
    pub fn to_backend(&self) -> u32 {
        let mut flags = match (self.read, self.is_writable()) {
            (true, true) => bits::O_RDWR,
            (false, true) => bits::O_WRONLY,
            _ => bits::O_RDONLY,
        };

        if self.append {
            flags |= bits::O_APPEND;
        }
        if self.truncate {
            flags |= bits::O_TRUNC;
        }
        if self.create {
            flags |= bits::O_CREAT;
        }
        if self.create_new {
            flags |= bits::O_CREAT | bits::O_EXCL;
        }

        flags
    }

    /// Convert from gateway flag bits
    pub fn from_backend(flags: u32) -> Self {
        let rdwr = flags & bits::O_RDWR != 0;
        Self {
            read: rdwr || flags & bits::O_RDONLY != 0,
            write: rdwr || flags & bits::O_WRONLY != 0,
            append: flags & bits::O_APPEND != 0,
            truncate: flags & bits::O_TRUNC != 0,
            create: flags & bits::O_CREAT != 0 && flags & bits::O_EXCL == 0,
            create_new: flags & bits::O_CREAT != 0 && flags & bits::O_EXCL != 0,
        }
    }

    /// Validate flag combinations
    #[must_use = "validation result must be checked"]
    pub fn validate(&self) -> Result<(), FsError> {
        if self.create_new && !self.write {
            return Err(FsError::InvalidArgument(
                "create_new requires write flag".into(),
            ));
        }
        if self.truncate && !self.write {
            return Err(FsError::InvalidArgument(
                "truncate requires write flag".into(),
            ));
        }
        if self.append && self.truncate {
            return Err(FsError::InvalidArgument(
                "cannot use both append and truncate".into(),
            ));
        }
        Ok(())
    }
}

/// Attribute selection for `setattr`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SetAttrMask(u32);

impl SetAttrMask {
    pub const MODE: Self = Self(1);
    pub const MTIME: Self = Self(8);
    pub const ATIME: Self = Self(16);

    #[inline]
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[inline]
    #[must_use]
    pub const fn bits(&self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    #[must_use]
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for SetAttrMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for SetAttrMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}
