//! Rows from JSON Lines files.
//!
//! Each non-blank line is an object keyed by column name. Columns missing
//! from an object, or set to `null`, are absent values.

use pl_common::{ColumnLayout, Row, Value};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("cannot read rows from {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("line {line}: invalid JSON: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("line {line}: expected a JSON object")]
    NotAnObject { line: usize },

    #[error("line {line}, column {column}: {source}")]
    Value {
        line: usize,
        column: String,
        #[source]
        source: pl_common::Error,
    },
}

/// Read every row of a JSON Lines file.
pub fn read_rows_file(path: &Path, layout: &ColumnLayout) -> Result<Vec<Row>, InputError> {
    let file = File::open(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_rows(file, layout).map_err(|e| match e {
        InputError::Io { source, .. } => InputError::Io {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })
}

/// Read every row from a JSON Lines stream.
pub fn read_rows<R: Read>(input: R, layout: &ColumnLayout) -> Result<Vec<Row>, InputError> {
    let mut rows = Vec::new();
    for (idx, line) in BufReader::new(input).lines().enumerate() {
        let line_no = idx + 1;
        let line = line.map_err(|source| InputError::Io {
            path: PathBuf::new(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let json: serde_json::Value =
            serde_json::from_str(&line).map_err(|source| InputError::Json {
                line: line_no,
                source,
            })?;
        let object = json
            .as_object()
            .ok_or(InputError::NotAnObject { line: line_no })?;

        let mut row = Vec::with_capacity(layout.width());
        for (name, ty) in layout.names().iter().zip(layout.types()) {
            let value = match object.get(name) {
                None => Value::Null,
                Some(v) => Value::from_json(v, *ty).map_err(|source| InputError::Value {
                    line: line_no,
                    column: name.clone(),
                    source,
                })?,
            };
            row.push(value);
        }
        rows.push(row);
    }
    debug!(rows = rows.len(), "rows read");
    Ok(rows)
}
