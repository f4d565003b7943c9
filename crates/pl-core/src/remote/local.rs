//! Remote filesystem backed by a locally mounted path.
//!
//! Useful when the warehouse storage is exposed as a mount (NFS, FUSE) or for
//! single-host deployments. Paths may carry a `file://` scheme.

use super::{Impersonation, RemoteError, RemoteFileSystem, RemotePath, RemoteWrite};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tracing::debug;

/// Impersonation for local mounts.
///
/// The running process cannot switch users, so by default the identity is
/// only recorded. With [`LocalImpersonation::strict`] the identity must match
/// the effective user of this process.
#[derive(Debug, Clone, Default)]
pub struct LocalImpersonation {
    strict: bool,
}

impl LocalImpersonation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse identities other than the effective user.
    pub fn strict() -> Self {
        Self { strict: true }
    }
}

impl Impersonation for LocalImpersonation {
    fn open_as(&self, identity: &str) -> Result<Box<dyn RemoteFileSystem>, RemoteError> {
        if self.strict {
            match effective_user() {
                Some(user) if user == identity => {}
                _ => return Err(RemoteError::UnknownIdentity(identity.to_string())),
            }
        }
        debug!(identity, "opening local filesystem");
        Ok(Box::new(LocalFileSystem::new(identity)))
    }
}

/// Name of the effective user of this process.
#[cfg(unix)]
pub fn effective_user() -> Option<String> {
    use std::ffi::CStr;
    // SAFETY: getpwuid returns a pointer to static storage or null; the name
    // is copied out before any other passwd call can overwrite it.
    unsafe {
        let pwd = libc::getpwuid(libc::geteuid());
        if pwd.is_null() {
            return None;
        }
        CStr::from_ptr((*pwd).pw_name)
            .to_str()
            .ok()
            .map(str::to_string)
    }
}

#[cfg(not(unix))]
pub fn effective_user() -> Option<String> {
    None
}

/// Handle on a local mount acting as one identity.
#[derive(Debug, Clone)]
pub struct LocalFileSystem {
    identity: String,
}

impl LocalFileSystem {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
        }
    }

    fn local_path(path: &RemotePath) -> PathBuf {
        let raw = path.as_str();
        PathBuf::from(raw.strip_prefix("file://").unwrap_or(raw))
    }
}

struct LocalWriter {
    inner: BufWriter<File>,
}

impl Write for LocalWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl RemoteWrite for LocalWriter {
    fn close(self: Box<Self>) -> io::Result<()> {
        let file = self.inner.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()
    }
}

impl RemoteFileSystem for LocalFileSystem {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn create(&self, path: &RemotePath) -> Result<Box<dyn RemoteWrite>, RemoteError> {
        let local = Self::local_path(path);
        if let Some(parent) = local.parent() {
            fs::create_dir_all(parent).map_err(|e| RemoteError::io("create", path, e))?;
        }
        let file = File::create(&local).map_err(|e| RemoteError::io("create", path, e))?;
        Ok(Box::new(LocalWriter {
            inner: BufWriter::new(file),
        }))
    }

    fn rename(&self, from: &RemotePath, to: &RemotePath) -> Result<bool, RemoteError> {
        let src = Self::local_path(from);
        let dst = Self::local_path(to);
        if !src.exists() || dst.exists() {
            return Ok(false);
        }
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent).map_err(|e| RemoteError::io("rename", to, e))?;
        }
        fs::rename(&src, &dst).map_err(|e| RemoteError::io("rename", from, e))?;
        Ok(true)
    }

    fn delete(&self, path: &RemotePath, recursive: bool) -> Result<bool, RemoteError> {
        let local = Self::local_path(path);
        let metadata = match fs::symlink_metadata(&local) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(RemoteError::io("delete", path, e)),
        };
        let result = if metadata.is_dir() {
            if recursive {
                fs::remove_dir_all(&local)
            } else {
                fs::remove_dir(&local)
            }
        } else {
            fs::remove_file(&local)
        };
        result.map_err(|e| RemoteError::io("delete", path, e))?;
        Ok(true)
    }

    fn exists(&self, path: &RemotePath) -> Result<bool, RemoteError> {
        Ok(Self::local_path(path).exists())
    }
}
