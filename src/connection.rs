/*!
 * Gateway Connection
 * Explicitly owned backend session with open/shutdown lifecycle
 */

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};

use crate::backend::Backend;
use crate::config::RgwConfig;
use crate::error::{FsError, FsResult};
use crate::path::FsUri;

/// Mounted session against one gateway authority
///
/// Shared by the translator and every stream opened through it. All
/// operations fail with `ConnectionClosed` once `shutdown` has run.
pub struct Connection {
    backend: Arc<dyn Backend>,
    config: RgwConfig,
    uri: FsUri,
    mounted: Mutex<bool>,
}

impl Connection {
    /// Validate the config and mount the backend
    pub fn open(backend: Arc<dyn Backend>, config: RgwConfig, uri: FsUri) -> FsResult<Self> {
        config.validate()?;
        backend
            .mount(&config.mount_args(&uri.authority))
            .map_err(|e| FsError::Backend {
                op: "mount".into(),
                code: e.code(),
            })?;
        info!(uri = %uri, user = ?config.user_id, "Connected to gateway");

        Ok(Self {
            backend,
            config,
            uri,
            mounted: Mutex::new(true),
        })
    }

    /// The backend, if the session is still mounted
    pub fn backend(&self) -> FsResult<&dyn Backend> {
        if *self.mounted.lock() {
            Ok(self.backend.as_ref())
        } else {
            Err(FsError::ConnectionClosed)
        }
    }

    pub fn config(&self) -> &RgwConfig {
        &self.config
    }

    pub fn uri(&self) -> &FsUri {
        &self.uri
    }

    pub fn is_open(&self) -> bool {
        *self.mounted.lock()
    }

    /// Unmount the backend; later calls are no-ops
    pub fn shutdown(&self) -> FsResult<()> {
        let mut mounted = self.mounted.lock();
        if !*mounted {
            return Ok(());
        }
        *mounted = false;
        info!(uri = %self.uri, "Disconnecting from gateway");
        self.backend.unmount().map_err(|e| FsError::Backend {
            op: "unmount".into(),
            code: e.code(),
        })
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("uri", &self.uri)
            .field("config", &self.config)
            .field("mounted", &self.is_open())
            .finish()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(uri = %self.uri, error = %e, "Gateway unmount failed during drop");
        }
    }
}
