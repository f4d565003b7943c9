//! Publishing fragment archives to the remote filesystem.
//!
//! Every fragment directory produced by the builder is zipped straight into
//! `<root>/tmp/<prefix>__<fragment>.zip` and then renamed to
//! `<root>/<prefix>__<fragment>.zip`. All remote calls go through a handle
//! acting as the configured identity. If anything fails, every path this
//! upload created is deleted again through the same handle.

pub mod ledger;

use crate::remote::{Impersonation, RemoteError, RemoteFileSystem, RemotePath};
use ledger::ArtifactLedger;
use pl_bundle::{BundleError, FragmentArchiver};
use pl_common::{FailureKind, UploadPrefix};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Subdirectory of the data directory the builder reserves for detached parts.
pub const DETACHED_DIR: &str = "detached";

/// Staging directory under the upload root.
pub const STAGING_DIR: &str = "tmp";

/// Errors from uploading one partition.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("cannot act as {identity}: {source}")]
    Impersonate {
        identity: String,
        #[source]
        source: RemoteError,
    },

    #[error("cannot list fragments in {}: {source}", .path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to archive fragment {fragment}: {source}")]
    Archive {
        fragment: String,
        #[source]
        source: BundleError,
    },

    #[error("failed to stage {path}: {source}")]
    Stage {
        path: String,
        #[source]
        source: RemoteError,
    },

    #[error("failed to close {path}: {source}")]
    Close {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to rename {from} to {to}")]
    Rename {
        from: String,
        to: String,
        #[source]
        source: Option<RemoteError>,
    },
}

impl UploadError {
    pub fn kind(&self) -> FailureKind {
        match self {
            UploadError::Scan { .. } | UploadError::Archive { .. } => FailureKind::Archive,
            UploadError::Impersonate { .. }
            | UploadError::Stage { .. }
            | UploadError::Close { .. }
            | UploadError::Rename { .. } => FailureKind::Publish,
        }
    }
}

/// What a successful upload published.
#[derive(Debug, Clone, Serialize)]
pub struct UploadReport {
    pub prefix: UploadPrefix,
    pub fragments: usize,
    pub published: Vec<String>,
    pub uncompressed_bytes: u64,
}

/// What a rollback managed to remove.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackReport {
    pub deleted: Vec<String>,
    pub missing: Vec<String>,
    pub failed: Vec<String>,
}

/// Uploads fragment directories under one identity.
#[derive(Clone)]
pub struct UploadManager {
    impersonation: Arc<dyn Impersonation>,
    identity: String,
    root: RemotePath,
    archiver: FragmentArchiver,
}

impl std::fmt::Debug for UploadManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadManager")
            .field("identity", &self.identity)
            .field("root", &self.root)
            .field("archiver", &self.archiver)
            .finish_non_exhaustive()
    }
}

impl UploadManager {
    pub fn new(
        impersonation: Arc<dyn Impersonation>,
        identity: impl Into<String>,
        root: impl Into<String>,
    ) -> Self {
        Self {
            impersonation,
            identity: identity.into(),
            root: RemotePath::new(root),
            archiver: FragmentArchiver::new(),
        }
    }

    pub fn with_archiver(mut self, archiver: FragmentArchiver) -> Self {
        self.archiver = archiver;
        self
    }

    pub fn root(&self) -> &RemotePath {
        &self.root
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Publish every fragment under `data_dir` with a fresh prefix.
    pub fn upload(&self, data_dir: &Path) -> Result<UploadReport, UploadError> {
        self.upload_with_prefix(data_dir, UploadPrefix::new())
    }

    /// Publish every fragment under `data_dir`, naming archives with `prefix`.
    ///
    /// On error everything created so far is rolled back before returning.
    pub fn upload_with_prefix(
        &self,
        data_dir: &Path,
        prefix: UploadPrefix,
    ) -> Result<UploadReport, UploadError> {
        let fs = self
            .impersonation
            .open_as(&self.identity)
            .map_err(|source| UploadError::Impersonate {
                identity: self.identity.clone(),
                source,
            })?;

        let mut ledger = ArtifactLedger::new();
        match self.publish_all(fs.as_ref(), data_dir, &prefix, &mut ledger) {
            Ok((fragments, uncompressed_bytes)) => {
                let published: Vec<String> =
                    ledger.commit().iter().map(|p| p.to_string()).collect();
                info!(
                    prefix = %prefix,
                    fragments,
                    bytes = uncompressed_bytes,
                    identity = %self.identity,
                    "partition uploaded"
                );
                Ok(UploadReport {
                    prefix,
                    fragments,
                    published,
                    uncompressed_bytes,
                })
            }
            Err(e) => {
                warn!(error = %e, artifacts = ledger.len(), "upload failed, rolling back");
                rollback(fs.as_ref(), &mut ledger);
                Err(e)
            }
        }
    }

    fn publish_all(
        &self,
        fs: &dyn RemoteFileSystem,
        data_dir: &Path,
        prefix: &UploadPrefix,
        ledger: &mut ArtifactLedger,
    ) -> Result<(usize, u64), UploadError> {
        let fragments = list_fragments(data_dir)?;
        let staging = self.root.join(STAGING_DIR);
        let mut bytes = 0u64;

        for (name, dir) in &fragments {
            let archive = prefix.archive_name(name);
            let staged = staging.join(&archive);
            let published = self.root.join(&archive);

            ledger.record(staged.clone());
            let mut out = fs.create(&staged).map_err(|source| UploadError::Stage {
                path: staged.to_string(),
                source,
            })?;
            let stats = self
                .archiver
                .write(dir, &mut out)
                .map_err(|source| UploadError::Archive {
                    fragment: name.clone(),
                    source,
                })?;
            out.close().map_err(|source| UploadError::Close {
                path: staged.to_string(),
                source,
            })?;
            debug!(fragment = %name, path = %staged, entries = stats.entries, "fragment staged");

            match fs.rename(&staged, &published) {
                Ok(true) => {}
                Ok(false) => {
                    return Err(UploadError::Rename {
                        from: staged.to_string(),
                        to: published.to_string(),
                        source: None,
                    })
                }
                Err(e) => {
                    return Err(UploadError::Rename {
                        from: staged.to_string(),
                        to: published.to_string(),
                        source: Some(e),
                    })
                }
            }
            ledger.promote(&staged, published.clone());
            bytes += stats.uncompressed_bytes;
            info!(fragment = %name, path = %published, "fragment published");
        }
        Ok((fragments.len(), bytes))
    }
}

/// Fragment directories under `data_dir`, sorted by name.
///
/// Plain files and the reserved `detached` directory are skipped.
pub fn list_fragments(data_dir: &Path) -> Result<Vec<(String, PathBuf)>, UploadError> {
    let scan_err = |source| UploadError::Scan {
        path: data_dir.to_path_buf(),
        source,
    };
    let mut fragments = Vec::new();
    for entry in fs::read_dir(data_dir).map_err(scan_err)? {
        let entry = entry.map_err(scan_err)?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == DETACHED_DIR {
            continue;
        }
        fragments.push((name, path));
    }
    fragments.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(fragments)
}

/// Delete every path in `ledger`, non-recursively.
///
/// Individual failures are logged and skipped.
pub fn rollback(fs: &dyn RemoteFileSystem, ledger: &mut ArtifactLedger) -> RollbackReport {
    let mut report = RollbackReport::default();
    for path in ledger.take() {
        match fs.delete(&path, false) {
            Ok(true) => {
                debug!(path = %path, "rolled back");
                report.deleted.push(path.to_string());
            }
            Ok(false) => {
                debug!(path = %path, "nothing to roll back");
                report.missing.push(path.to_string());
            }
            Err(e) => {
                warn!(path = %path, error = %e, "failed to delete during rollback");
                report.failed.push(path.to_string());
            }
        }
    }
    info!(
        deleted = report.deleted.len(),
        failed = report.failed.len(),
        identity = fs.identity(),
        "rollback finished"
    );
    report
}
