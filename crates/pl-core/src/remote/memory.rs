//! In-memory remote filesystem.
//!
//! Backs `--dry-run` and the upload tests. Every call is recorded with the
//! identity that made it, and faults can be injected per operation and path.

use super::{Impersonation, RemoteError, RemoteFileSystem, RemotePath, RemoteWrite};
use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

/// Operation a fault can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOp {
    Create,
    Write,
    Rename,
    Delete,
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpRecord {
    pub identity: String,
    pub op: &'static str,
    pub path: String,
}

#[derive(Debug, Default)]
struct State {
    files: BTreeMap<RemotePath, Vec<u8>>,
    faults: Vec<(FaultOp, String)>,
    ops: Vec<OpRecord>,
    identities: Option<BTreeSet<String>>,
}

impl State {
    fn faulted(&self, op: FaultOp, path: &RemotePath) -> bool {
        self.faults
            .iter()
            .any(|(fault, needle)| *fault == op && path.as_str().contains(needle.as_str()))
    }

    fn record(&mut self, identity: &str, op: &'static str, path: &RemotePath) {
        self.ops.push(OpRecord {
            identity: identity.to_string(),
            op,
            path: path.to_string(),
        });
    }

    fn has_children(&self, path: &RemotePath) -> bool {
        let prefix = format!("{}/", path.as_str().trim_end_matches('/'));
        self.files.keys().any(|k| k.as_str().starts_with(&prefix))
    }
}

/// Shared in-memory filesystem. Clones see the same files.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    state: Arc<Mutex<State>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only allow impersonating the listed identities.
    pub fn with_identities<I, S>(self, identities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock().identities = Some(identities.into_iter().map(Into::into).collect());
        self
    }

    /// Fail `op` on every path containing `path_fragment`.
    pub fn inject_fault(&self, op: FaultOp, path_fragment: impl Into<String>) {
        self.lock().faults.push((op, path_fragment.into()));
    }

    pub fn clear_faults(&self) {
        self.lock().faults.clear();
    }

    /// Paths currently stored, sorted.
    pub fn files(&self) -> Vec<String> {
        self.lock().files.keys().map(|p| p.to_string()).collect()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.lock().files.contains_key(&RemotePath::new(path))
    }

    pub fn read(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().files.get(&RemotePath::new(path)).cloned()
    }

    /// Calls made so far, in order.
    pub fn ops(&self) -> Vec<OpRecord> {
        self.lock().ops.clone()
    }

    /// Insert a file directly, bypassing the op log.
    pub fn seed(&self, path: &str, content: impl Into<Vec<u8>>) {
        self.lock()
            .files
            .insert(RemotePath::new(path), content.into());
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock leaves plain data behind; keep going.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Impersonation for MemoryFileSystem {
    fn open_as(&self, identity: &str) -> Result<Box<dyn RemoteFileSystem>, RemoteError> {
        if let Some(allowed) = &self.lock().identities {
            if !allowed.contains(identity) {
                return Err(RemoteError::UnknownIdentity(identity.to_string()));
            }
        }
        Ok(Box::new(MemoryHandle {
            fs: self.clone(),
            identity: identity.to_string(),
        }))
    }
}

struct MemoryHandle {
    fs: MemoryFileSystem,
    identity: String,
}

impl RemoteFileSystem for MemoryHandle {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn create(&self, path: &RemotePath) -> Result<Box<dyn RemoteWrite>, RemoteError> {
        let mut state = self.fs.lock();
        state.record(&self.identity, "create", path);
        if state.faulted(FaultOp::Create, path) {
            return Err(RemoteError::Injected {
                op: "create",
                path: path.to_string(),
            });
        }
        state.files.insert(path.clone(), Vec::new());
        Ok(Box::new(MemoryWriter {
            fs: self.fs.clone(),
            path: path.clone(),
        }))
    }

    fn rename(&self, from: &RemotePath, to: &RemotePath) -> Result<bool, RemoteError> {
        let mut state = self.fs.lock();
        state.record(&self.identity, "rename", from);
        if state.faulted(FaultOp::Rename, from) || state.faulted(FaultOp::Rename, to) {
            return Err(RemoteError::Injected {
                op: "rename",
                path: from.to_string(),
            });
        }
        if state.files.contains_key(to) {
            return Ok(false);
        }
        match state.files.remove(from) {
            Some(content) => {
                state.files.insert(to.clone(), content);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete(&self, path: &RemotePath, recursive: bool) -> Result<bool, RemoteError> {
        let mut state = self.fs.lock();
        state.record(&self.identity, "delete", path);
        if state.faulted(FaultOp::Delete, path) {
            return Err(RemoteError::Injected {
                op: "delete",
                path: path.to_string(),
            });
        }
        if state.has_children(path) {
            if !recursive {
                return Err(RemoteError::io(
                    "delete",
                    path,
                    io::Error::new(io::ErrorKind::Other, "directory not empty"),
                ));
            }
            let prefix = format!("{}/", path.as_str());
            state.files.retain(|k, _| !k.as_str().starts_with(&prefix));
            state.files.remove(path);
            return Ok(true);
        }
        Ok(state.files.remove(path).is_some())
    }

    fn exists(&self, path: &RemotePath) -> Result<bool, RemoteError> {
        let state = self.fs.lock();
        Ok(state.files.contains_key(path) || state.has_children(path))
    }
}

struct MemoryWriter {
    fs: MemoryFileSystem,
    path: RemotePath,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.fs.lock();
        if state.faulted(FaultOp::Write, &self.path) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("write {} failed: injected fault", self.path),
            ));
        }
        state
            .files
            .entry(self.path.clone())
            .or_default()
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl RemoteWrite for MemoryWriter {
    fn close(self: Box<Self>) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_are_visible_through_every_clone() {
        let mem = MemoryFileSystem::new();
        let handle = mem.open_as("hdfs").unwrap();
        let path = RemotePath::new("/up/tmp/a.zip");
        let mut out = handle.create(&path).unwrap();
        out.write_all(b"abc").unwrap();
        out.close().unwrap();

        let other = mem.clone();
        assert_eq!(other.read("/up/tmp/a.zip").unwrap(), b"abc");
        assert!(handle.exists(&RemotePath::new("/up/tmp")).unwrap());
    }

    #[test]
    fn ops_are_attributed_to_identity() {
        let mem = MemoryFileSystem::new();
        let handle = mem.open_as("alice").unwrap();
        let a = RemotePath::new("/a");
        let b = RemotePath::new("/b");
        handle.create(&a).unwrap().close().unwrap();
        assert!(handle.rename(&a, &b).unwrap());
        assert!(handle.delete(&b, false).unwrap());

        let ops = mem.ops();
        assert_eq!(ops.len(), 3);
        assert!(ops.iter().all(|op| op.identity == "alice"));
        assert_eq!(
            ops.iter().map(|o| o.op).collect::<Vec<_>>(),
            vec!["create", "rename", "delete"]
        );
    }

    #[test]
    fn rename_does_not_overwrite() {
        let mem = MemoryFileSystem::new();
        mem.seed("/a", "1");
        mem.seed("/b", "2");
        let handle = mem.open_as("u").unwrap();
        assert!(!handle
            .rename(&RemotePath::new("/a"), &RemotePath::new("/b"))
            .unwrap());
        assert_eq!(mem.read("/b").unwrap(), b"2");
    }

    #[test]
    fn injected_faults_fire_on_matching_paths_only() {
        let mem = MemoryFileSystem::new();
        mem.inject_fault(FaultOp::Rename, "part_b");
        let handle = mem.open_as("u").unwrap();
        mem.seed("/tmp/x__part_a.zip", "");
        mem.seed("/tmp/x__part_b.zip", "");
        assert!(handle
            .rename(
                &RemotePath::new("/tmp/x__part_a.zip"),
                &RemotePath::new("/x__part_a.zip")
            )
            .unwrap());
        let err = handle
            .rename(
                &RemotePath::new("/tmp/x__part_b.zip"),
                &RemotePath::new("/x__part_b.zip"),
            )
            .unwrap_err();
        assert!(matches!(err, RemoteError::Injected { op: "rename", .. }));
    }

    #[test]
    fn write_fault_surfaces_as_io_error() {
        let mem = MemoryFileSystem::new();
        mem.inject_fault(FaultOp::Write, "a.zip");
        let handle = mem.open_as("u").unwrap();
        let mut out = handle.create(&RemotePath::new("/a.zip")).unwrap();
        assert!(out.write_all(b"x").is_err());
        assert!(mem.contains("/a.zip"));
    }

    #[test]
    fn non_recursive_delete_refuses_directories_with_children() {
        let mem = MemoryFileSystem::new();
        mem.seed("/d/f", "x");
        let handle = mem.open_as("u").unwrap();
        assert!(handle.delete(&RemotePath::new("/d"), false).is_err());
        assert!(handle.delete(&RemotePath::new("/d"), true).unwrap());
        assert!(mem.files().is_empty());
    }

    #[test]
    fn restricted_identities() {
        let mem = MemoryFileSystem::new().with_identities(["hdfs"]);
        assert!(mem.open_as("hdfs").is_ok());
        assert!(matches!(
            mem.open_as("root").err().unwrap(),
            RemoteError::UnknownIdentity(_)
        ));
    }
}
