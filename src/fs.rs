/*!
 * Filesystem Facade
 * Public filesystem surface: path resolution plus streams and namespace operations
 */

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info};

use crate::backend::{Backend, BackendStat, OpenFlags, SetAttrMask};
use crate::config::RgwConfig;
use crate::connection::Connection;
use crate::error::{FsError, FsResult};
use crate::limits::{DEFAULT_DIR_PERMISSION, DEFAULT_FILE_PERMISSION, HOME_PREFIX, MAX_BLOCK_SIZE};
use crate::path::{FsPath, FsUri};
use crate::status::{to_millis, FileStatus, FsStatus, Permissions};
use crate::stream::{RgwInputStream, RgwOutputStream};
use crate::translator::Translator;

/// Options for creating a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateOptions {
    /// Requested permission, before the configured umask
    pub permission: Permissions,
    pub overwrite: bool,
    /// Advisory; the gateway decides placement
    pub replication: Option<u16>,
    /// Falls back to the configured block size
    pub block_size: Option<u64>,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            permission: Permissions::new(DEFAULT_FILE_PERMISSION),
            overwrite: false,
            replication: None,
            block_size: None,
        }
    }
}

impl CreateOptions {
    #[must_use]
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    #[must_use]
    pub fn block_size(mut self, block_size: u64) -> Self {
        self.block_size = Some(block_size);
        self
    }

    #[must_use]
    pub fn permission(mut self, permission: Permissions) -> Self {
        self.permission = permission;
        self
    }

    #[must_use]
    pub fn replication(mut self, replication: u16) -> Self {
        self.replication = Some(replication);
        self
    }
}

/// Filesystem over one gateway connection
///
/// Relative paths resolve against the working directory, which starts at
/// the owner's home directory. Every operation is a direct round trip to
/// the backend; nothing is cached between calls.
pub struct RgwFileSystem {
    translator: Translator,
    working_dir: RwLock<FsPath>,
}

impl RgwFileSystem {
    /// Connect to `uri` through `backend`
    pub fn initialize(uri: &str, backend: Arc<dyn Backend>, config: RgwConfig) -> FsResult<Self> {
        let uri = FsUri::parse(uri)?;
        let conn = Connection::open(backend, config, uri)?;
        let home = home_of(&conn.config().owner)?;
        info!(uri = %conn.uri(), home = %home, "Filesystem initialized");

        Ok(Self {
            translator: Translator::new(Arc::new(conn)),
            working_dir: RwLock::new(home),
        })
    }

    fn conn(&self) -> &Arc<Connection> {
        self.translator.connection()
    }

    pub fn uri(&self) -> &FsUri {
        self.conn().uri()
    }

    pub fn config(&self) -> &RgwConfig {
        self.conn().config()
    }

    /// `/user/<owner>`
    pub fn home_directory(&self) -> FsResult<FsPath> {
        home_of(&self.config().owner)
    }

    pub fn working_directory(&self) -> FsPath {
        self.working_dir.read().clone()
    }

    /// Change the working directory; relative input resolves against the current one
    pub fn set_working_directory(&self, path: &str) -> FsResult<()> {
        let resolved = self.resolve(path)?;
        debug!(path = %resolved, "Working directory changed");
        *self.working_dir.write() = resolved;
        Ok(())
    }

    /// Absolute, normalized form of `path`
    ///
    /// A fully qualified path must name this filesystem's scheme and authority.
    pub fn resolve(&self, path: &str) -> FsResult<FsPath> {
        if path.contains("://") {
            let uri = FsUri::parse(path)?;
            if &uri != self.uri() {
                return Err(FsError::InvalidArgument(format!(
                    "wrong filesystem: {}, expected {}",
                    path,
                    self.uri()
                )));
            }
        }
        FsPath::resolve(path, &self.working_dir.read())
    }

    /// `scheme://authority/absolute/path`
    pub fn make_qualified(&self, path: &str) -> FsResult<String> {
        Ok(self.uri().qualify(&self.resolve(path)?))
    }

    pub fn default_block_size(&self) -> u64 {
        self.config().block_size
    }

    pub fn default_replication(&self) -> u16 {
        self.config().replication
    }

    /// Open a file for buffered reading
    pub fn open(&self, path: &str) -> FsResult<RgwInputStream> {
        let path = self.resolve(path)?;
        let (handle, size) = self.translator.open_for_read(&path)?;
        Ok(RgwInputStream::new(
            Arc::clone(self.conn()),
            handle,
            size,
            self.config().read_buffer_size,
        ))
    }

    /// Create a file, creating missing parents
    pub fn create(&self, path: &str, overwrite: bool, block_size: u64) -> FsResult<RgwOutputStream> {
        self.create_with(
            path,
            CreateOptions::default()
                .overwrite(overwrite)
                .block_size(block_size),
        )
    }

    pub fn create_with(&self, path: &str, options: CreateOptions) -> FsResult<RgwOutputStream> {
        let path = self.resolve(path)?;
        self.create_resolved(&path, options)
    }

    /// Create a file whose parent directory must already exist
    pub fn create_non_recursive(
        &self,
        path: &str,
        options: CreateOptions,
    ) -> FsResult<RgwOutputStream> {
        let path = self.resolve(path)?;
        if let Some(parent) = path.parent() {
            if !self.translator.lstat(&parent)?.is_dir {
                return Err(FsError::AlreadyExists(parent.to_string()));
            }
        }
        self.create_resolved(&path, options)
    }

    fn create_resolved(&self, path: &FsPath, options: CreateOptions) -> FsResult<RgwOutputStream> {
        let block_size = self.effective_block_size(path, options.block_size)?;

        match self.translator.lstat(path) {
            Ok(stat) if stat.is_dir => return Err(FsError::NotAFile(path.to_string())),
            Ok(_) if !options.overwrite => return Err(FsError::AlreadyExists(path.to_string())),
            Ok(_) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        let permission = options.permission.with_umask(self.config().umask);
        let (handle, _) = self.translator.open_for_write(
            path,
            OpenFlags::create(options.overwrite),
            permission,
        )?;
        debug!(
            path = %path,
            handle,
            permission = %permission,
            block_size,
            replication = options.replication.unwrap_or(self.default_replication()),
            "Created file"
        );

        Ok(RgwOutputStream::new(
            Arc::clone(self.conn()),
            handle,
            0,
            self.config().write_buffer_size,
        ))
    }

    fn effective_block_size(&self, path: &FsPath, requested: Option<u64>) -> FsResult<u64> {
        let block_size = requested.unwrap_or(self.default_block_size());
        if block_size == 0 {
            return Err(FsError::InvalidArgument(format!(
                "block size must be positive: {}",
                path
            )));
        }
        if block_size > MAX_BLOCK_SIZE {
            info!(path = %path, requested = block_size, clamped = MAX_BLOCK_SIZE, "Block size clamped");
            return Ok(MAX_BLOCK_SIZE);
        }
        Ok(block_size)
    }

    /// Open an existing file for writing at its end
    pub fn append(&self, path: &str) -> FsResult<RgwOutputStream> {
        let path = self.resolve(path)?;
        let (handle, size) = self.translator.open_for_write(
            &path,
            OpenFlags::append_only(),
            Permissions::new(DEFAULT_FILE_PERMISSION),
        )?;
        Ok(RgwOutputStream::new(
            Arc::clone(self.conn()),
            handle,
            size,
            self.config().write_buffer_size,
        ))
    }

    pub fn rename(&self, src: &str, dst: &str) -> FsResult<bool> {
        let src = self.resolve(src)?;
        let dst = self.resolve(dst)?;
        self.translator.rename(&src, &dst)
    }

    /// Delete a path; `Ok(false)` when it did not exist
    pub fn delete(&self, path: &str, recursive: bool) -> FsResult<bool> {
        let path = self.resolve(path)?;
        self.translator.delete(&path, recursive)
    }

    /// Create a directory and missing ancestors with the default permission
    pub fn mkdirs(&self, path: &str) -> FsResult<bool> {
        self.mkdirs_with_permission(path, Permissions::new(DEFAULT_DIR_PERMISSION))
    }

    pub fn mkdirs_with_permission(&self, path: &str, permission: Permissions) -> FsResult<bool> {
        let path = self.resolve(path)?;
        self.translator
            .mkdirs(&path, permission.with_umask(self.config().umask))
    }

    pub fn get_file_status(&self, path: &str) -> FsResult<FileStatus> {
        let path = self.resolve(path)?;
        self.translator.stat(&path)
    }

    pub fn list_status(&self, path: &str) -> FsResult<Vec<FileStatus>> {
        let path = self.resolve(path)?;
        self.translator.list_status(&path)
    }

    /// Capacity, used and remaining bytes of the filesystem holding `path`
    pub fn get_capacity(&self, path: &str) -> FsResult<FsStatus> {
        let path = self.resolve(path)?;
        self.translator.stat_filesystem(&path)
    }

    pub fn set_permission(&self, path: &str, permission: Permissions) -> FsResult<()> {
        let path = self.resolve(path)?;
        let stat = BackendStat {
            mode: permission.mode,
            ..Default::default()
        };
        self.translator.set_attr(&path, &stat, SetAttrMask::MODE)
    }

    /// Update modification and access times; `None` leaves a time unchanged
    pub fn set_times(
        &self,
        path: &str,
        modified: Option<SystemTime>,
        accessed: Option<SystemTime>,
    ) -> FsResult<()> {
        let path = self.resolve(path)?;
        let mut stat = BackendStat::default();
        let mut mask = SetAttrMask::empty();
        if let Some(time) = modified {
            stat.mtime_ms = to_millis(time);
            mask |= SetAttrMask::MTIME;
        }
        if let Some(time) = accessed {
            stat.atime_ms = to_millis(time);
            mask |= SetAttrMask::ATIME;
        }
        self.translator.set_attr(&path, &stat, mask)
    }

    pub fn exists(&self, path: &str) -> FsResult<bool> {
        let path = self.resolve(path)?;
        self.translator.exists(&path)
    }

    pub fn is_file(&self, path: &str) -> FsResult<bool> {
        self.is_kind(path, false)
    }

    pub fn is_directory(&self, path: &str) -> FsResult<bool> {
        self.is_kind(path, true)
    }

    fn is_kind(&self, path: &str, dir: bool) -> FsResult<bool> {
        let path = self.resolve(path)?;
        match self.translator.lstat(&path) {
            Ok(stat) => Ok(stat.is_dir == dir),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Shut the connection down; open streams fail afterwards
    pub fn close(&self) -> FsResult<()> {
        self.conn().shutdown()
    }
}

impl std::fmt::Debug for RgwFileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RgwFileSystem")
            .field("uri", self.uri())
            .field("working_dir", &*self.working_dir.read())
            .finish()
    }
}

fn home_of(owner: &str) -> FsResult<FsPath> {
    FsPath::parse(&format!("{}/{}", HOME_PREFIX, owner))
}
