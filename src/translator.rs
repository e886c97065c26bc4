/*!
 * Path/Protocol Translator
 * Maps filesystem semantics onto the backend's primitive operations
 */

use std::sync::Arc;
use tracing::{debug, warn};

use crate::backend::{errno, Backend, BackendError, BackendStat, Handle, OpenFlags, SetAttrMask};
use crate::connection::Connection;
use crate::error::{FsError, FsResult};
use crate::limits::DEFAULT_DIR_PERMISSION;
use crate::path::FsPath;
use crate::status::{FileStatus, FsStatus, Permissions};

/// Filesystem-semantics layer over one connection
///
/// Enforces what the backend does not: file vs. directory checks on open,
/// idempotent directory creation, parent creation on create, and recursive
/// delete by listing.
#[derive(Debug, Clone)]
pub struct Translator {
    conn: Arc<Connection>,
}

impl Translator {
    pub fn new(conn: Arc<Connection>) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.conn
    }

    fn backend(&self) -> FsResult<&dyn Backend> {
        self.conn.backend()
    }

    /// Raw backend attributes
    pub fn lstat(&self, path: &FsPath) -> FsResult<BackendStat> {
        self.backend()?
            .lstat(path.backend_key())
            .map_err(|e| translate(e, "lstat", path))
    }

    /// Status record for one entry
    pub fn stat(&self, path: &FsPath) -> FsResult<FileStatus> {
        let stat = self.lstat(path)?;
        let config = self.conn.config();
        Ok(FileStatus::from_backend(
            self.conn.uri().qualify(path),
            &stat,
            config.replication,
            &config.owner,
        ))
    }

    pub fn exists(&self, path: &FsPath) -> FsResult<bool> {
        match self.lstat(path) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Open a file for reading; returns the handle and the file length
    pub fn open_for_read(&self, path: &FsPath) -> FsResult<(Handle, u64)> {
        let handle = self
            .backend()?
            .open(path.backend_key(), OpenFlags::read_only().to_backend(), 0)
            .map_err(|e| translate(e, "open", path))?;
        let stat = self.checked_file_stat(path, handle)?;

        debug!(path = %path, handle, size = stat.size, "Opened for read");
        Ok((handle, stat.size))
    }

    /// Open a file for writing, creating its parent first when creating
    ///
    /// Returns the handle and the file length once opened (zero after a
    /// truncating open).
    pub fn open_for_write(
        &self,
        path: &FsPath,
        flags: OpenFlags,
        permission: Permissions,
    ) -> FsResult<(Handle, u64)> {
        flags.validate()?;
        if flags.will_create() {
            if let Some(parent) = path.parent() {
                self.ensure_parent(&parent)?;
            }
        }

        let handle = self
            .backend()?
            .open(path.backend_key(), flags.to_backend(), permission.mode)
            .map_err(|e| translate(e, "open", path))?;
        let stat = self.checked_file_stat(path, handle)?;

        debug!(path = %path, handle, ?flags, size = stat.size, "Opened for write");
        Ok((handle, stat.size))
    }

    /// Create a directory and its ancestors; an existing directory is success
    pub fn mkdirs(&self, path: &FsPath, permission: Permissions) -> FsResult<bool> {
        match self
            .backend()?
            .mkdirs(path.backend_key(), permission.mode)
        {
            Ok(()) => {
                debug!(path = %path, permission = %permission, "Created directory");
                Ok(true)
            }
            Err(BackendError::AlreadyExists(_)) => {
                if self.lstat(path)?.is_dir {
                    Ok(true)
                } else {
                    Err(FsError::NotADirectory(path.to_string()))
                }
            }
            Err(e) => Err(translate(e, "mkdirs", path)),
        }
    }

    /// Rename `src` to `dst`; every backend failure propagates
    pub fn rename(&self, src: &FsPath, dst: &FsPath) -> FsResult<bool> {
        if src.is_root() {
            return Ok(false);
        }
        if src == dst {
            return self.exists(src);
        }

        self.backend()?
            .rename(src.backend_key(), dst.backend_key())
            .map_err(|e| translate(e, "rename", src))?;
        debug!(src = %src, dst = %dst, "Renamed");
        Ok(true)
    }

    /// Delete a file, or a directory (children first when `recursive`)
    ///
    /// A missing path yields `Ok(false)`. A child that fails to delete aborts
    /// the walk and leaves the directory partially deleted.
    pub fn delete(&self, path: &FsPath, recursive: bool) -> FsResult<bool> {
        let stat = match self.lstat(path) {
            Ok(stat) => stat,
            Err(e) if e.is_not_found() => return Ok(false),
            Err(e) => return Err(e),
        };

        if !stat.is_dir {
            self.unlink(path)?;
            return Ok(true);
        }

        let children = self.listdir(path)?;
        if !recursive && !children.is_empty() {
            return Err(FsError::DirectoryNotEmpty(path.to_string()));
        }

        for child in &children {
            let child = path.join(child);
            if !self.delete(&child, recursive)? {
                warn!(path = %path, child = %child, "Recursive delete aborted");
                return Ok(false);
            }
        }

        // The root itself is never removed
        if !path.is_root() {
            self.unlink(path)?;
        }
        Ok(true)
    }

    /// Status of a file, or of every child of a directory
    pub fn list_status(&self, path: &FsPath) -> FsResult<Vec<FileStatus>> {
        let status = self.stat(path)?;
        if status.is_file() {
            return Ok(vec![status]);
        }

        self.listdir(path)?
            .iter()
            .map(|name| self.stat(&path.join(name)))
            .collect()
    }

    /// Capacity of the filesystem holding `path`
    pub fn stat_filesystem(&self, path: &FsPath) -> FsResult<FsStatus> {
        self.backend()?
            .statfs(path.backend_key())
            .map(FsStatus::from)
            .map_err(|e| translate(e, "statfs", path))
    }

    /// Update the attributes selected by `mask`
    pub fn set_attr(&self, path: &FsPath, stat: &BackendStat, mask: SetAttrMask) -> FsResult<()> {
        if mask.is_empty() {
            return Ok(());
        }
        self.backend()?
            .setattr(path.backend_key(), stat, mask)
            .map_err(|e| translate(e, "setattr", path))
    }

    fn listdir(&self, path: &FsPath) -> FsResult<Vec<String>> {
        self.backend()?
            .listdir(path.backend_key())
            .map_err(|e| translate(e, "listdir", path))
    }

    fn unlink(&self, path: &FsPath) -> FsResult<()> {
        self.backend()?
            .unlink(path.backend_key())
            .map_err(|e| translate(e, "unlink", path))?;
        debug!(path = %path, "Unlinked");
        Ok(())
    }

    /// Stat a just-opened path; a directory (or a failed stat) closes the handle
    fn checked_file_stat(&self, path: &FsPath, handle: Handle) -> FsResult<BackendStat> {
        let result = match self.lstat(path) {
            Ok(stat) if stat.is_dir => Err(FsError::NotAFile(path.to_string())),
            other => other,
        };
        if result.is_err() {
            self.close_quietly(handle);
        }
        result
    }

    fn ensure_parent(&self, parent: &FsPath) -> FsResult<()> {
        match self.lstat(parent) {
            Ok(stat) if stat.is_dir => Ok(()),
            Ok(_) => Err(FsError::ParentCreation(format!(
                "{}: exists and is not a directory",
                parent
            ))),
            Err(e) if e.is_not_found() => {
                let permission =
                    Permissions::new(DEFAULT_DIR_PERMISSION).with_umask(self.conn.config().umask);
                match self.mkdirs(parent, permission) {
                    Ok(true) => Ok(()),
                    Ok(false) => Err(FsError::ParentCreation(parent.to_string())),
                    Err(e) => Err(FsError::ParentCreation(format!("{}: {}", parent, e))),
                }
            }
            Err(e) => Err(e),
        }
    }

    fn close_quietly(&self, handle: Handle) {
        let result = self.backend().and_then(|backend| {
            backend.close(handle).map_err(|e| FsError::Backend {
                op: "close".into(),
                code: e.code(),
            })
        });
        if let Err(e) = result {
            warn!(handle, error = %e, "Failed to release handle");
        }
    }
}

/// Backend failure to filesystem error
fn translate(err: BackendError, op: &str, path: &FsPath) -> FsError {
    match err {
        BackendError::NotFound(key) => FsError::NotFound(format!("/{}", key.trim_start_matches('/'))),
        BackendError::AlreadyExists(key) => {
            FsError::AlreadyExists(format!("/{}", key.trim_start_matches('/')))
        }
        BackendError::Errno(code) if code == -errno::ENOTDIR => {
            FsError::NotADirectory(path.to_string())
        }
        BackendError::Errno(code) if code == -errno::EISDIR => FsError::NotAFile(path.to_string()),
        BackendError::Errno(code) if code == -errno::ENOTEMPTY => {
            FsError::DirectoryNotEmpty(path.to_string())
        }
        BackendError::Errno(code) => FsError::Backend {
            op: format!("{} {}", op, path),
            code,
        },
    }
}
