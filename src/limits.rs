/*!
 * Filesystem Limits and Constants
 *
 * Centralized location for buffer sizes, defaults and protocol constants.
 */

// =============================================================================
// STREAM BUFFERS
// =============================================================================

/// Read-ahead buffer capacity (4MB)
/// Input streams allocate min(file length, this) bytes
/// [PERF] Matches the gateway's preferred bulk transfer size
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// Write-behind buffer capacity (4MB)
pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 4 * 1024 * 1024;

// =============================================================================
// FILE LAYOUT DEFAULTS
// =============================================================================

/// Default block size reported in file status (64MB)
pub const DEFAULT_BLOCK_SIZE: u64 = 64 * 1024 * 1024;

/// Largest block size accepted by create; larger values are clamped
pub const MAX_BLOCK_SIZE: u64 = i32::MAX as u64;

/// Default replication factor reported in file status
pub const DEFAULT_REPLICATION: u16 = 3;

// =============================================================================
// PERMISSIONS
// =============================================================================

/// Default umask applied to directory permissions
pub const DEFAULT_UMASK: u32 = 0o022;

/// Directory permission before the umask is applied
pub const DEFAULT_DIR_PERMISSION: u32 = 0o777;

/// File permission before the umask is applied
pub const DEFAULT_FILE_PERMISSION: u32 = 0o666;

// =============================================================================
// NAMESPACE
// =============================================================================

/// URI scheme used when no scheme is supplied
pub const DEFAULT_SCHEME: &str = "rgw";

/// Parent of per-user home directories
pub const HOME_PREFIX: &str = "/user";

/// Default gateway client arguments
pub const DEFAULT_CLIENT_ARGS: &str = "--name=client.admin";
