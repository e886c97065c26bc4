/*!
 * Filesystem Paths
 * URI parsing and absolute path normalization
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::{FsError, FsResult};
use crate::limits::DEFAULT_SCHEME;

/// Filesystem URI: `scheme://authority`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FsUri {
    pub scheme: String,
    pub authority: String,
}

impl FsUri {
    /// Parse `scheme://authority[/path]`, keeping only scheme and authority
    pub fn parse(uri: &str) -> FsResult<Self> {
        let (scheme, rest) = match uri.split_once("://") {
            Some((scheme, rest)) => (scheme, rest),
            None => (DEFAULT_SCHEME, uri),
        };
        if scheme.is_empty() {
            return Err(FsError::InvalidArgument(format!("missing scheme: {}", uri)));
        }

        let authority = rest.split('/').next().unwrap_or_default();
        Ok(Self {
            scheme: scheme.to_string(),
            authority: authority.to_string(),
        })
    }

    /// Attach this URI to an absolute path
    pub fn qualify(&self, path: &FsPath) -> String {
        format!("{}{}", self, path)
    }
}

impl fmt::Display for FsUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.authority)
    }
}

/// Normalized absolute path (`/a/b`), relative to the filesystem root
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FsPath(String);

impl FsPath {
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Parse an absolute path or URI
    pub fn parse(input: &str) -> FsResult<Self> {
        let path = strip_scheme_and_authority(input);
        if !path.starts_with('/') {
            return Err(FsError::InvalidArgument(format!(
                "path is not absolute: {}",
                input
            )));
        }
        Self::clean(path)
    }

    /// Resolve `input` against `base` when it is relative
    pub fn resolve(input: &str, base: &FsPath) -> FsResult<Self> {
        let path = strip_scheme_and_authority(input);
        if path.is_empty() {
            return Err(FsError::InvalidArgument("empty path".into()));
        }
        if path.starts_with('/') {
            Self::clean(path)
        } else {
            Self::clean(&format!("{}/{}", base.0, path))
        }
    }

    /// Normalize `.`, `..` and repeated separators; `..` stops at the root
    fn clean(path: &str) -> FsResult<Self> {
        let cleaned = PathBuf::from(path_clean::clean(path));
        let cleaned = cleaned
            .to_str()
            .ok_or_else(|| FsError::InvalidArgument(format!("invalid UTF-8 in path: {}", path)))?;
        if cleaned.starts_with('/') {
            Ok(Self(cleaned.to_string()))
        } else {
            Ok(Self(format!("/{}", cleaned)))
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Root-relative form the backend understands (root is empty)
    #[inline]
    pub fn backend_key(&self) -> &str {
        self.0.trim_start_matches('/')
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Parent directory, `None` for the root
    pub fn parent(&self) -> Option<FsPath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => None,
        }
    }

    /// Final component, empty for the root
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    /// Child path
    pub fn join(&self, child: &str) -> FsPath {
        let child = child.trim_matches('/');
        if self.is_root() {
            Self(format!("/{}", child))
        } else {
            Self(format!("{}/{}", self.0, child))
        }
    }
}

impl fmt::Display for FsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Drop a leading `scheme://authority`, leaving the path part
fn strip_scheme_and_authority(input: &str) -> &str {
    match input.split_once("://") {
        Some((_, rest)) => match rest.find('/') {
            Some(idx) => &rest[idx..],
            None => "/",
        },
        None => input,
    }
}
