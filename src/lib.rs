/*!
 * RGW Filesystem Library
 * Hierarchical filesystem facade over a blocking object-gateway client
 *
 * Layers, bottom to top:
 * - `backend`: the gateway capability trait plus an in-memory implementation
 * - `connection`: the mounted session shared by everything above it
 * - `stream`: buffered byte streams over backend handles
 * - `translator`: filesystem semantics on top of backend primitives
 * - `fs`: the public facade with working-directory path resolution
 */

pub mod backend;
pub mod config;
pub mod connection;
pub mod error;
pub mod fs;
pub mod limits;
pub mod path;
pub mod status;
pub mod stream;
pub mod telemetry;
pub mod translator;

// Re-exports
pub use backend::{Backend, BackendError, Handle, MemBackend, OpenFlags, SetAttrMask};
pub use config::RgwConfig;
pub use connection::Connection;
pub use error::{FsError, FsResult};
pub use fs::{CreateOptions, RgwFileSystem};
pub use path::{FsPath, FsUri};
pub use status::{FileStatus, FileType, FsStatus, Permissions};
pub use stream::{RgwInputStream, RgwOutputStream};
pub use telemetry::{init_tracing, try_init_tracing};
pub use translator::Translator;
