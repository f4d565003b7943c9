//! Remote filesystem access under an impersonated identity.
//!
//! Uploads never talk to a filesystem directly. They ask an [`Impersonation`]
//! capability for a [`RemoteFileSystem`] handle acting as a given identity,
//! and every call made through that handle is attributed to it.

pub mod local;
pub mod memory;

pub use local::{LocalFileSystem, LocalImpersonation};
pub use memory::{FaultOp, MemoryFileSystem, OpRecord};

use std::fmt;
use std::io::{self, Write};
use thiserror::Error;

/// Errors from remote filesystem calls.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("{op} {path} failed: {source}")]
    Io {
        op: &'static str,
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("identity {identity} may not act on {path}")]
    PermissionDenied { identity: String, path: String },

    #[error("cannot impersonate {0}")]
    UnknownIdentity(String),

    #[error("{op} {path} failed: injected fault")]
    Injected { op: &'static str, path: String },
}

impl RemoteError {
    pub(crate) fn io(op: &'static str, path: &RemotePath, source: io::Error) -> Self {
        RemoteError::Io {
            op,
            path: path.to_string(),
            source,
        }
    }
}

/// `/`-separated path on the remote filesystem.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RemotePath(String);

impl RemotePath {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() && path.starts_with('/') {
            return RemotePath("/".to_string());
        }
        RemotePath(trimmed.to_string())
    }

    /// Child path `<self>/<name>`.
    pub fn join(&self, name: &str) -> RemotePath {
        let name = name.trim_matches('/');
        if self.0.ends_with('/') {
            RemotePath(format!("{}{}", self.0, name))
        } else {
            RemotePath(format!("{}/{}", self.0, name))
        }
    }

    pub fn parent(&self) -> Option<RemotePath> {
        let idx = self.0.rfind('/')?;
        if idx == 0 {
            return (self.0.len() > 1).then(|| RemotePath("/".to_string()));
        }
        Some(RemotePath(self.0[..idx].to_string()))
    }

    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Output stream of a file being created remotely.
pub trait RemoteWrite: Write + Send {
    /// Flush and release the stream. Data is durable once this returns.
    fn close(self: Box<Self>) -> io::Result<()>;
}

/// Filesystem operations used by the uploader.
pub trait RemoteFileSystem: Send {
    /// Identity this handle acts as.
    fn identity(&self) -> &str;

    /// Create (or truncate) a file, creating missing parent directories.
    fn create(&self, path: &RemotePath) -> Result<Box<dyn RemoteWrite>, RemoteError>;

    /// Atomically rename `from` to `to`.
    ///
    /// Returns `Ok(false)` when the rename was refused (missing source or
    /// existing destination).
    fn rename(&self, from: &RemotePath, to: &RemotePath) -> Result<bool, RemoteError>;

    /// Delete a path. Returns `Ok(false)` when it did not exist.
    fn delete(&self, path: &RemotePath, recursive: bool) -> Result<bool, RemoteError>;

    fn exists(&self, path: &RemotePath) -> Result<bool, RemoteError>;
}

/// Capability to act on the remote filesystem as another identity.
pub trait Impersonation: Send + Sync {
    fn open_as(&self, identity: &str) -> Result<Box<dyn RemoteFileSystem>, RemoteError>;
}
