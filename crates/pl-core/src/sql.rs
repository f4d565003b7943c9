//! Build instructions handed to the builder in `build.sql`.
//!
//! The builder runs these statements in order:
//!
//! 1. `CREATE TABLE input (...) ENGINE = File(CSV, stdin)` describing the rows
//!    arriving on the pipe, one column per field in row order.
//! 2. `create database if not exists <db>`.
//! 3. The target table's DDL with its engine replaced by a local
//!    `MergeTree()` and any `storage_policy` setting removed.
//! 4. `insert into <db>.<table> (...) select * from input`.
//! 5. `optimize table <db>.<table> final`, merging everything into as few
//!    fragments as possible.

use pl_common::{FailureKind, TableIdent};
use regex::Regex;
use std::collections::HashMap;
use thiserror::Error;

/// Separator between statements.
pub const STATEMENT_SEPARATOR: &str = ";\n";

#[derive(Debug, Error)]
pub enum SqlError {
    #[error("{column} is not a valid column in table {table}")]
    UnknownColumn { column: String, table: String },

    #[error("no CREATE TABLE statement configured for {0}")]
    MissingCreateTable(String),

    #[error("invalid rewrite pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl SqlError {
    pub fn kind(&self) -> FailureKind {
        FailureKind::Config
    }
}

/// Rewrites the target table DDL for an offline build.
#[derive(Debug, Clone)]
pub struct DdlRewriter {
    engine: Regex,
    storage_policy: Regex,
}

impl DdlRewriter {
    pub fn new() -> Result<Self, SqlError> {
        Ok(Self {
            engine: Regex::new(r"ENGINE\s*=\s*\w+\s*\(.*?\)")?,
            storage_policy: Regex::new(r",\s*storage_policy\s*=\s*'\w+'")?,
        })
    }

    /// Swap the engine for `MergeTree()` and drop `storage_policy`.
    pub fn rewrite(&self, ddl: &str) -> String {
        let local = self.engine.replace_all(ddl, "ENGINE = MergeTree()");
        self.storage_policy.replace_all(&local, "").into_owned()
    }
}

/// Assembled build instructions for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSql {
    table: TableIdent,
    columns: Vec<(String, String)>,
    target_ddl: String,
}

impl BuildSql {
    /// Resolve the type of every field from `schema` and rewrite the
    /// target DDL.
    pub fn new(
        table: TableIdent,
        fields: &[String],
        schema: &HashMap<String, String>,
        create_table_sql: &str,
    ) -> Result<Self, SqlError> {
        if create_table_sql.trim().is_empty() {
            return Err(SqlError::MissingCreateTable(table.full_name()));
        }
        let columns = fields
            .iter()
            .map(|field| {
                schema
                    .get(field)
                    .map(|ty| (field.clone(), ty.clone()))
                    .ok_or_else(|| SqlError::UnknownColumn {
                        column: field.clone(),
                        table: table.full_name(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let target_ddl = DdlRewriter::new()?.rewrite(create_table_sql.trim().trim_end_matches(';'));
        Ok(Self {
            table,
            columns,
            target_ddl,
        })
    }

    pub fn input_table(&self) -> String {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|(name, ty)| format!("`{}` {}", name, ty))
            .collect();
        format!(
            "CREATE TABLE input (\n{}\n) ENGINE = File(CSV, stdin)",
            columns.join(",\n")
        )
    }

    pub fn create_database(&self) -> String {
        format!("create database if not exists {}", self.table.database)
    }

    pub fn target_table(&self) -> &str {
        &self.target_ddl
    }

    pub fn insert(&self) -> String {
        let fields: Vec<String> = self
            .columns
            .iter()
            .map(|(name, _)| format!("`{}`", name))
            .collect();
        format!(
            "insert into {} ({}) select * from input",
            self.table.full_name(),
            fields.join(",")
        )
    }

    pub fn optimize(&self) -> String {
        format!("optimize table {} final", self.table.full_name())
    }

    /// Full contents of `build.sql`.
    pub fn render(&self) -> String {
        [
            self.input_table(),
            self.create_database(),
            self.target_ddl.clone(),
            self.insert(),
            self.optimize(),
        ]
        .join(STATEMENT_SEPARATOR)
    }
}
