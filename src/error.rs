/*!
 * Error Types
 * Filesystem error taxonomy with thiserror, miette, and serde support
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::Handle;

/// Filesystem operation result
///
/// # Must Use
/// Filesystem operations can fail and must be handled to prevent data loss
#[must_use = "filesystem operations can fail and must be handled"]
pub type FsResult<T> = Result<T, FsError>;

/// Errors surfaced by the streams, the translator and the facade
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(rename_all = "snake_case", tag = "error", content = "details")]
pub enum FsError {
    #[error("Not found: {0}")]
    #[diagnostic(code(rgwfs::not_found), help("Check that the path exists on the gateway."))]
    NotFound(String),

    #[error("Not a file: {0}")]
    #[diagnostic(
        code(rgwfs::not_a_file),
        help("Directories cannot be opened as byte streams.")
    )]
    NotAFile(String),

    #[error("Not a directory: {0}")]
    #[diagnostic(code(rgwfs::not_a_directory))]
    NotADirectory(String),

    #[error("Already exists: {0}")]
    #[diagnostic(
        code(rgwfs::already_exists),
        help("Pass overwrite=true to replace an existing file.")
    )]
    AlreadyExists(String),

    #[error("Directory not empty: {0}")]
    #[diagnostic(
        code(rgwfs::directory_not_empty),
        help("Use a recursive delete to remove a directory with children.")
    )]
    DirectoryNotEmpty(String),

    #[error("Stream closed (fd={handle})")]
    #[diagnostic(code(rgwfs::closed_stream))]
    ClosedStream { handle: Handle },

    #[error("Cannot seek to {target}: past end of file ({length} bytes)")]
    #[diagnostic(code(rgwfs::invalid_seek))]
    InvalidSeek { target: u64, length: u64 },

    #[error("Failed to create parent directory: {0}")]
    #[diagnostic(code(rgwfs::parent_creation))]
    ParentCreation(String),

    #[error("Failed to fill read buffer (fd={handle}): backend error code {code}")]
    #[diagnostic(
        code(rgwfs::backend_read),
        help("The read buffer was discarded; the stream can be re-positioned and read again.")
    )]
    BackendRead { handle: Handle, code: i32 },

    #[error("Failed to flush write buffer (fd={handle}): backend error code {code}")]
    #[diagnostic(
        code(rgwfs::backend_write),
        help("Buffered bytes were kept; retry the flush or treat the stream as broken.")
    )]
    BackendWrite { handle: Handle, code: i32 },

    #[error("Invalid argument: {0}")]
    #[diagnostic(code(rgwfs::invalid_argument))]
    InvalidArgument(String),

    #[error("Backend {op} failed: error code {code}")]
    #[diagnostic(code(rgwfs::backend))]
    Backend { op: String, code: i32 },

    #[error("Connection to the gateway is shut down")]
    #[diagnostic(
        code(rgwfs::connection_closed),
        help("Open a new connection; a shut down connection cannot be reused.")
    )]
    ConnectionClosed,
}

impl FsError {
    /// True for the missing-path variant
    #[inline]
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, FsError::NotFound(_))
    }
}

impl From<FsError> for std::io::Error {
    fn from(err: FsError) -> Self {
        use std::io::ErrorKind;
        let kind = match &err {
            FsError::NotFound(_) => ErrorKind::NotFound,
            FsError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            FsError::InvalidSeek { .. } | FsError::InvalidArgument(_) => ErrorKind::InvalidInput,
            FsError::ClosedStream { .. } | FsError::ConnectionClosed => ErrorKind::BrokenPipe,
            _ => ErrorKind::Other,
        };
        std::io::Error::new(kind, err)
    }
}
