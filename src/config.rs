/*!
 * Gateway Configuration
 * Connection arguments, credentials and filesystem defaults
 */

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::backend::MountArgs;
use crate::error::{FsError, FsResult};
use crate::limits::{
    DEFAULT_BLOCK_SIZE, DEFAULT_CLIENT_ARGS, DEFAULT_READ_BUFFER_SIZE, DEFAULT_REPLICATION,
    DEFAULT_UMASK, DEFAULT_WRITE_BUFFER_SIZE,
};

/// Property keys accepted by `RgwConfig::from_properties`
pub mod keys {
    pub const ARGS: &str = "fs.ceph.rgw.args";
    pub const BLOCK_SIZE: &str = "fs.ceph.rgw.blocksize";
    pub const REPLICATION: &str = "fs.ceph.replication";
    pub const USER_ID: &str = "fs.ceph.rgw.userid";
    pub const ACCESS_KEY: &str = "fs.ceph.rgw.access.key";
    pub const SECRET_KEY: &str = "fs.ceph.rgw.secret.key";
    pub const READ_BUFFER: &str = "fs.ceph.rgw.read.buffer";
    pub const WRITE_BUFFER: &str = "fs.ceph.rgw.write.buffer";
    pub const UMASK: &str = "fs.permissions.umask-mode";
    pub const OWNER: &str = "fs.ceph.rgw.owner";
}

/// Filesystem configuration, handed to the connection at initialization only
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct RgwConfig {
    pub args: String,
    pub user_id: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub block_size: u64,
    pub replication: u16,
    pub read_buffer_size: usize,
    pub write_buffer_size: usize,
    pub umask: u32,
    pub owner: String,
}

impl Default for RgwConfig {
    fn default() -> Self {
        Self {
            args: DEFAULT_CLIENT_ARGS.to_string(),
            user_id: None,
            access_key: None,
            secret_key: None,
            block_size: DEFAULT_BLOCK_SIZE,
            replication: DEFAULT_REPLICATION,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
            umask: DEFAULT_UMASK,
            owner: whoami::username(),
        }
    }
}

impl fmt::Debug for RgwConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RgwConfig")
            .field("args", &self.args)
            .field("user_id", &self.user_id)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("block_size", &self.block_size)
            .field("replication", &self.replication)
            .field("read_buffer_size", &self.read_buffer_size)
            .field("write_buffer_size", &self.write_buffer_size)
            .field("umask", &format_args!("{:#o}", self.umask))
            .field("owner", &self.owner)
            .finish()
    }
}

impl RgwConfig {
    /// Build from string key/value pairs; unknown keys are ignored
    pub fn from_properties<I, K, V>(properties: I) -> FsResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::default();
        for (key, value) in properties {
            let (key, value) = (key.as_ref(), value.as_ref().trim());
            match key {
                keys::ARGS => config.args = value.to_string(),
                keys::USER_ID => config.user_id = non_empty(value),
                keys::ACCESS_KEY => config.access_key = non_empty(value),
                keys::SECRET_KEY => config.secret_key = non_empty(value),
                keys::BLOCK_SIZE => config.block_size = parse_number(key, value)?,
                keys::REPLICATION => config.replication = parse_number(key, value)?,
                keys::READ_BUFFER => config.read_buffer_size = parse_number(key, value)?,
                keys::WRITE_BUFFER => config.write_buffer_size = parse_number(key, value)?,
                keys::UMASK => {
                    config.umask = u32::from_str_radix(value, 8).map_err(|_| {
                        FsError::InvalidArgument(format!("{}: invalid octal umask {:?}", key, value))
                    })?
                }
                keys::OWNER => config.owner = value.to_string(),
                _ => {}
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Reject sizes the streams cannot work with
    pub fn validate(&self) -> FsResult<()> {
        if self.block_size == 0 {
            return Err(FsError::InvalidArgument("block size must be positive".into()));
        }
        if self.read_buffer_size == 0 || self.write_buffer_size == 0 {
            return Err(FsError::InvalidArgument(
                "stream buffer sizes must be positive".into(),
            ));
        }
        if self.umask > 0o777 {
            return Err(FsError::InvalidArgument(format!(
                "invalid umask {:#o}",
                self.umask
            )));
        }
        Ok(())
    }

    /// Session parameters for `Backend::mount`
    pub fn mount_args(&self, authority: &str) -> MountArgs {
        MountArgs {
            args: self.args.clone(),
            user_id: self.user_id.clone(),
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
            authority: authority.to_string(),
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> FsResult<T> {
    value
        .parse()
        .map_err(|_| FsError::InvalidArgument(format!("{}: invalid number {:?}", key, value)))
}
