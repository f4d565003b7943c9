//! One partition from rows to published archives.

use crate::build::{BuildError, BuildOrchestrator};
use crate::encode::RowEncoder;
use crate::remote::Impersonation;
use crate::sql::{BuildSql, SqlError};
use crate::upload::{UploadError, UploadManager};
use pl_bundle::FragmentArchiver;
use pl_common::{ColumnLayout, FailureKind, Row, TableIdent, UploadPrefix};
use pl_config::LoaderConfig;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tempfile::TempDir;
use thiserror::Error;
use tracing::{error, info, warn};

const WORKDIR_PREFIX: &str = "partload-";

/// Errors that abort a partition.
#[derive(Debug, Error)]
pub enum PartitionError {
    #[error(transparent)]
    Config(#[from] pl_common::Error),

    #[error(transparent)]
    Sql(#[from] SqlError),

    #[error("failed to create working directory under {}: {source}", .parent.display())]
    WorkDir {
        parent: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Upload(#[from] UploadError),
}

impl PartitionError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PartitionError::Config(_) | PartitionError::Sql(_) => FailureKind::Config,
            PartitionError::WorkDir { .. } => FailureKind::Setup,
            PartitionError::Build(e) => e.kind(),
            PartitionError::Upload(e) => e.kind(),
        }
    }
}

/// Summary of a published partition.
#[derive(Debug, Clone, Serialize)]
pub struct PartitionReport {
    pub table: String,
    pub prefix: UploadPrefix,
    pub rows_written: u64,
    pub fragments: usize,
    pub published: Vec<String>,
    pub uncompressed_bytes: u64,
    pub elapsed_ms: u64,
}

/// Everything needed to build and publish partitions of one table.
#[derive(Debug, Clone)]
pub struct PartitionJob {
    table: TableIdent,
    build_sql: String,
    encoder: RowEncoder,
    orchestrator: BuildOrchestrator,
    uploader: UploadManager,
    work_parent: Option<PathBuf>,
}

impl PartitionJob {
    pub fn new(
        table: TableIdent,
        build_sql: impl Into<String>,
        encoder: RowEncoder,
        orchestrator: BuildOrchestrator,
        uploader: UploadManager,
    ) -> Self {
        Self {
            table,
            build_sql: build_sql.into(),
            encoder,
            orchestrator,
            uploader,
            work_parent: None,
        }
    }

    /// Create working directories under `parent` instead of the system
    /// temp directory.
    pub fn with_work_parent(mut self, parent: Option<PathBuf>) -> Self {
        self.work_parent = parent;
        self
    }

    /// Assemble a job from a validated configuration.
    pub fn from_config(
        config: &LoaderConfig,
        impersonation: Arc<dyn Impersonation>,
    ) -> Result<Self, PartitionError> {
        let table = config.table_ident();
        let fields = config.field_order();
        let layout = ColumnLayout::resolve(
            &table.full_name(),
            &fields,
            &config.schema,
            &config.default_literals(),
        )?;
        let build_sql = BuildSql::new(
            table.clone(),
            &fields,
            &config.schema,
            config.create_table_sql.as_deref().unwrap_or_default(),
        )?
        .render();
        let identity = config
            .remote_user()
            .ok_or_else(|| pl_common::Error::Config("no remote user configured".to_string()))?;
        let uploader = UploadManager::new(impersonation, identity, config.upload_root())
            .with_archiver(FragmentArchiver::new().with_compression(config.archive.compression));

        Ok(Self::new(
            table,
            build_sql,
            RowEncoder::new(layout),
            BuildOrchestrator::from_config(&config.builder),
            uploader,
        )
        .with_work_parent(config.work_dir.clone()))
    }

    pub fn table(&self) -> &TableIdent {
        &self.table
    }

    pub fn build_sql(&self) -> &str {
        &self.build_sql
    }

    pub fn encoder(&self) -> &RowEncoder {
        &self.encoder
    }

    /// Build and publish one partition.
    ///
    /// The working directory is removed before this returns, whatever the
    /// outcome.
    pub fn run<I>(&self, rows: I) -> Result<PartitionReport, PartitionError>
    where
        I: IntoIterator<Item = Row>,
        I::IntoIter: Send,
    {
        let started = Instant::now();
        let workdir = self.create_workdir()?;
        let result = self.run_in(workdir.path(), rows, started);

        let path = workdir.path().to_path_buf();
        if let Err(e) = workdir.close() {
            warn!(
                path = %path.display(),
                error = %e,
                kind = %FailureKind::Cleanup,
                "failed to remove working directory"
            );
        }

        match &result {
            Ok(report) => info!(
                table = %self.table,
                rows = report.rows_written,
                fragments = report.fragments,
                elapsed_ms = report.elapsed_ms,
                "partition finished"
            ),
            Err(e) => error!(table = %self.table, kind = %e.kind(), error = %e, "partition failed"),
        }
        result
    }

    fn run_in<I>(
        &self,
        workdir: &Path,
        rows: I,
        started: Instant,
    ) -> Result<PartitionReport, PartitionError>
    where
        I: IntoIterator<Item = Row>,
        I::IntoIter: Send,
    {
        info!(table = %self.table, workdir = %workdir.display(), "building partition");
        let built = self
            .orchestrator
            .run(workdir, &self.build_sql, &self.encoder, rows)?;

        let data_dir = workdir.join(self.table.data_dir());
        let uploaded = self.uploader.upload(&data_dir)?;

        Ok(PartitionReport {
            table: self.table.full_name(),
            prefix: uploaded.prefix,
            rows_written: built.rows_written,
            fragments: uploaded.fragments,
            published: uploaded.published,
            uncompressed_bytes: uploaded.uncompressed_bytes,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }

    fn create_workdir(&self) -> Result<TempDir, PartitionError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(WORKDIR_PREFIX);
        match &self.work_parent {
            Some(parent) => builder
                .tempdir_in(parent)
                .map_err(|source| PartitionError::WorkDir {
                    parent: parent.clone(),
                    source,
                }),
            None => builder.tempdir().map_err(|source| PartitionError::WorkDir {
                parent: std::env::temp_dir(),
                source,
            }),
        }
    }
}
