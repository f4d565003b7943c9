//! partload core library.
//!
//! Bulk-loads partitions of rows into immutable columnar fragments:
//!
//! - [`encode`]: rows to pipe lines
//! - [`build`]: named pipe, external builder process and row writer
//! - [`upload`]: fragment archives staged and renamed on a remote filesystem,
//!   rolled back on failure
//! - [`remote`]: remote filesystem access under an impersonated identity
//! - [`partition`]: one partition end to end
//! - [`sql`]: build instructions for the builder

pub mod build;
pub mod encode;
pub mod exit_codes;
pub mod input;
pub mod logging;
pub mod partition;
pub mod remote;
pub mod sql;
pub mod upload;

pub use build::{BuildError, BuildOrchestrator, BuildOutcome};
pub use encode::{EncodeError, RowEncoder};
pub use exit_codes::ExitCode;
pub use partition::{PartitionError, PartitionJob, PartitionReport};
pub use remote::{Impersonation, RemoteError, RemoteFileSystem, RemotePath};
pub use sql::{BuildSql, SqlError};
pub use upload::{UploadError, UploadManager, UploadReport};
