/*!
 * Gateway Backend Interface
 * Narrow, blocking, handle-oriented client capability set
 */

mod flags;
pub mod memory;

pub use flags::{bits, OpenFlags, SetAttrMask};
pub use memory::{BackendCallStats, MemBackend};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque backend-issued file handle
pub type Handle = u64;

/// Backend call result
pub type BackendResult<T> = Result<T, BackendError>;

/// Errno values the gateway reports
pub mod errno {
    pub const EIO: i32 = 5;
    pub const EBADF: i32 = 9;
    pub const EEXIST: i32 = 17;
    pub const ENOTDIR: i32 = 20;
    pub const EISDIR: i32 = 21;
    pub const EINVAL: i32 = 22;
    pub const ENOTEMPTY: i32 = 39;
}

/// Raw backend failure
///
/// Not-found and already-exists are distinguished signals; everything else
/// carries the gateway's negative error code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("no such file or directory: {0}")]
    NotFound(String),

    #[error("file exists: {0}")]
    AlreadyExists(String),

    #[error("error code {0}")]
    Errno(i32),
}

impl BackendError {
    /// Raw code as the gateway reports it (negative errno)
    pub const fn code(&self) -> i32 {
        match self {
            BackendError::NotFound(_) => -2,
            BackendError::AlreadyExists(_) => -errno::EEXIST,
            BackendError::Errno(code) => *code,
        }
    }
}

/// Session parameters handed to `mount`
#[derive(Clone, Default, PartialEq, Eq)]
pub struct MountArgs {
    pub args: String,
    pub user_id: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub authority: String,
}

impl std::fmt::Debug for MountArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountArgs")
            .field("args", &self.args)
            .field("user_id", &self.user_id)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("authority", &self.authority)
            .finish()
    }
}

/// Entry attributes as the gateway reports them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BackendStat {
    pub mode: u32,
    pub size: u64,
    pub blksize: u64,
    /// Milliseconds since UNIX epoch
    pub mtime_ms: u64,
    /// Milliseconds since UNIX epoch
    pub atime_ms: u64,
    pub is_dir: bool,
}

/// Filesystem-wide block counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BackendStatVfs {
    pub bsize: u64,
    pub blocks: u64,
    pub bavail: u64,
}

/// Gateway client capability set
///
/// Paths are root-relative strings without a leading slash; the root is the
/// empty string. `read` and `write` may transfer fewer bytes than requested.
pub trait Backend: Send + Sync {
    /// Establish the session
    fn mount(&self, args: &MountArgs) -> BackendResult<()>;

    /// Tear down the session
    fn unmount(&self) -> BackendResult<()>;

    fn open(&self, path: &str, flags: u32, mode: u32) -> BackendResult<Handle>;

    fn close(&self, handle: Handle) -> BackendResult<()>;

    /// Read up to `buf.len()` bytes at `offset`; zero means end of data
    fn read(&self, handle: Handle, offset: u64, buf: &mut [u8]) -> BackendResult<usize>;

    /// Write up to `buf.len()` bytes at `offset`; returns the accepted count
    fn write(&self, handle: Handle, offset: u64, buf: &[u8]) -> BackendResult<usize>;

    fn fsync(&self, handle: Handle) -> BackendResult<()>;

    fn lstat(&self, path: &str) -> BackendResult<BackendStat>;

    fn setattr(&self, path: &str, stat: &BackendStat, mask: SetAttrMask) -> BackendResult<()>;

    fn statfs(&self, path: &str) -> BackendResult<BackendStatVfs>;

    /// Remove a file or an empty directory
    fn unlink(&self, path: &str) -> BackendResult<()>;

    fn rename(&self, from: &str, to: &str) -> BackendResult<()>;

    /// Child names of a directory
    fn listdir(&self, path: &str) -> BackendResult<Vec<String>>;

    /// Create a directory and any missing ancestors
    fn mkdirs(&self, path: &str, mode: u32) -> BackendResult<()>;
}
