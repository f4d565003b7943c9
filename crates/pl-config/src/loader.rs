//! Loader configuration types.
//!
//! A configuration file describes one target table and where its parts go:
//!
//! ```toml
//! database = "analytics"
//! table = "events"
//! upload_root = "/warehouse/parts"
//! username = "loader"
//! password = "secret"
//!
//! [builder]
//! binary_dir = "/opt/part-builder"
//! timeout_secs = 3600
//!
//! [schema]
//! id = "UInt64"
//! name = "Nullable(String)"
//!
//! [default_values]
//! name = "'unknown'"
//! ```

use pl_bundle::Compression;
use pl_common::TableIdent;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors from reading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML in {}: {source}", .path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Complete loader configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    #[serde(default)]
    pub database: String,

    #[serde(default)]
    pub table: String,

    /// Remote root under which archives are published.
    #[serde(default, alias = "tmpUploadPath")]
    pub upload_root: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Identity used for remote filesystem calls; defaults to `username`.
    #[serde(default, alias = "hdfsUser")]
    pub remote_user: Option<String>,

    /// Parent directory for per-partition working directories.
    #[serde(default)]
    pub work_dir: Option<PathBuf>,

    #[serde(default)]
    pub builder: BuilderConfig,

    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Column name → target-store type string.
    #[serde(default)]
    pub schema: HashMap<String, String>,

    /// Column order of incoming rows. Empty means every schema column in
    /// name order.
    #[serde(default)]
    pub fields: Vec<String>,

    /// Column name → default literal for absent values.
    #[serde(default, alias = "defaultValues")]
    pub default_values: HashMap<String, serde_json::Value>,

    /// `CREATE TABLE` statement of the target table.
    #[serde(default)]
    pub create_table_sql: Option<String>,
}

/// External builder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuilderConfig {
    /// Directory containing `build.sh`.
    #[serde(default)]
    pub binary_dir: PathBuf,

    /// Shell used to run the build script.
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Kill the builder after this many seconds. Unset means no limit.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_shell() -> String {
    "sh".to_string()
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            binary_dir: PathBuf::new(),
            shell: default_shell(),
            timeout_secs: None,
        }
    }
}

impl BuilderConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Archive settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveConfig {
    #[serde(default)]
    pub compression: Compression,
}

impl LoaderConfig {
    /// Load from a `.toml` or `.json` file, chosen by extension (TOML when
    /// the extension is anything else).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json {
            serde_json::from_str(&content).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })
        } else {
            toml::from_str(&content).map_err(|source| ConfigError::Toml {
                path: path.to_path_buf(),
                source,
            })
        }
    }

    /// Load and validate in one step.
    pub fn load_validated(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        let result = crate::validate::validate(&config);
        if !result.is_valid() {
            return Err(ConfigError::Invalid(
                result.errors.iter().map(|e| e.to_string()).collect(),
            ));
        }
        Ok(config)
    }

    pub fn table_ident(&self) -> TableIdent {
        TableIdent::new(&self.database, &self.table)
    }

    /// Upload root with exactly one trailing `/`.
    pub fn upload_root(&self) -> String {
        format!("{}/", self.upload_root.trim_end_matches('/'))
    }

    /// Identity for remote filesystem calls.
    pub fn remote_user(&self) -> Option<&str> {
        self.remote_user
            .as_deref()
            .or(self.username.as_deref())
            .filter(|u| !u.is_empty())
    }

    /// Column order of incoming rows.
    pub fn field_order(&self) -> Vec<String> {
        if !self.fields.is_empty() {
            return self.fields.clone();
        }
        let mut names: Vec<String> = self.schema.keys().cloned().collect();
        names.sort();
        names
    }

    /// Default literals as text. Strings are taken verbatim; numbers and
    /// booleans use their JSON spelling.
    pub fn default_literals(&self) -> HashMap<String, String> {
        self.default_values
            .iter()
            .filter_map(|(column, value)| {
                let text = match value {
                    serde_json::Value::Null => return None,
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Some((column.clone(), text))
            })
            .collect()
    }
}
