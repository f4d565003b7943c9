//! Remote paths created by the current upload.

use crate::remote::RemotePath;

/// Ordered record of remote paths an upload has created.
///
/// A path is recorded before the file is written, so a failure part-way
/// through a write still leaves it on record. Entries only go away through
/// [`ArtifactLedger::promote`], [`ArtifactLedger::commit`] or rollback
/// draining them with [`ArtifactLedger::take`].
#[derive(Debug, Default)]
pub struct ArtifactLedger {
    paths: Vec<RemotePath>,
}

impl ArtifactLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, path: RemotePath) {
        self.paths.push(path);
    }

    /// Replace `staged` with `published` once a rename succeeded.
    ///
    /// The published path keeps the staged path's position.
    pub fn promote(&mut self, staged: &RemotePath, published: RemotePath) {
        match self.paths.iter().position(|p| p == staged) {
            Some(idx) => self.paths[idx] = published,
            None => self.paths.push(published),
        }
    }

    /// Forget everything; the upload succeeded.
    pub fn commit(&mut self) -> Vec<RemotePath> {
        std::mem::take(&mut self.paths)
    }

    /// Drain the recorded paths for rollback.
    pub fn take(&mut self) -> Vec<RemotePath> {
        std::mem::take(&mut self.paths)
    }

    pub fn paths(&self) -> &[RemotePath] {
        &self.paths
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }
}
