//! Table and upload identity types.
//!
//! A partition's remote artifacts are named by an [`UploadPrefix`] shared by
//! every fragment of that partition, which keeps concurrent partitions that
//! target the same root from colliding.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Fully qualified target table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableIdent {
    pub database: String,
    pub table: String,
}

impl TableIdent {
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        TableIdent {
            database: database.into(),
            table: table.into(),
        }
    }

    /// `database.table`
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.database, self.table)
    }

    /// Directory, relative to the builder's working directory, where the
    /// builder leaves the fragment directories of this table.
    ///
    /// The layout is fixed by the builder's own server configuration.
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from("clickhouse_data/data/data")
            .join(&self.database)
            .join(&self.table)
    }
}

impl fmt::Display for TableIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.table)
    }
}

/// Partition-scoped unique prefix for uploaded archive names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadPrefix(pub String);

impl UploadPrefix {
    /// Generate a fresh random prefix.
    pub fn new() -> Self {
        UploadPrefix(uuid::Uuid::new_v4().to_string())
    }

    /// Archive name for one fragment: `<prefix>__<fragment>.zip`.
    pub fn archive_name(&self, fragment: &str) -> String {
        format!("{}__{}.zip", self.0, fragment)
    }
}

impl Default for UploadPrefix {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UploadPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
