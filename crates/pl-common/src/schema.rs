//! Column type categories and the per-partition column layout.
//!
//! The encoder only needs to know how a column is rendered, not its exact
//! store type, so every target-store type string collapses into one of five
//! [`ColumnType`] categories.

use crate::error::{Error, Result};
use crate::value::Row;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Rendering category of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    String,
    Decimal,
    ArrayOfString,
    ArrayOfOther,
    Other,
}

impl ColumnType {
    pub fn as_str(self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Decimal => "decimal",
            ColumnType::ArrayOfString => "array of string",
            ColumnType::ArrayOfOther => "array",
            ColumnType::Other => "scalar",
        }
    }

    /// Classify a target-store type string.
    ///
    /// `Nullable(..)` and `LowCardinality(..)` wrappers are looked through, so
    /// `Nullable(String)` is still [`ColumnType::String`].
    pub fn classify(type_name: &str) -> ColumnType {
        let inner = strip_wrappers(type_name);
        if inner.eq_ignore_ascii_case("string") {
            return ColumnType::String;
        }
        if starts_with_ignore_case(inner, "decimal") {
            return ColumnType::Decimal;
        }
        if let Some(element) = unwrap_call(inner, "array") {
            if strip_wrappers(element).eq_ignore_ascii_case("string") {
                return ColumnType::ArrayOfString;
            }
            return ColumnType::ArrayOfOther;
        }
        ColumnType::Other
    }
}

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// `Name(inner)` -> `inner`, matching `name` case-insensitively.
fn unwrap_call<'a>(s: &'a str, name: &str) -> Option<&'a str> {
    let s = s.trim();
    if !starts_with_ignore_case(s, name) {
        return None;
    }
    let rest = s[name.len()..].trim_start();
    let body = rest.strip_prefix('(')?.strip_suffix(')')?;
    Some(body.trim())
}

fn strip_wrappers(type_name: &str) -> &str {
    let mut current = type_name.trim();
    loop {
        if let Some(inner) = unwrap_call(current, "nullable") {
            current = inner;
        } else if let Some(inner) = unwrap_call(current, "lowcardinality") {
            current = inner;
        } else {
            return current;
        }
    }
}

/// Per-column rendering information, positionally aligned with every row of
/// a partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    names: Vec<String>,
    types: Vec<ColumnType>,
    defaults: Vec<Option<String>>,
}

impl ColumnLayout {
    /// Build a layout from parallel arrays.
    ///
    /// Fails with [`Error::LayoutMismatch`] unless all three have the same
    /// length.
    pub fn new(
        names: Vec<String>,
        types: Vec<ColumnType>,
        defaults: Vec<Option<String>>,
    ) -> Result<Self> {
        if names.len() != types.len() || types.len() != defaults.len() {
            return Err(Error::LayoutMismatch {
                types: types.len(),
                defaults: defaults.len(),
                width: names.len(),
            });
        }
        Ok(ColumnLayout {
            names,
            types,
            defaults,
        })
    }

    /// Resolve a layout for `fields` (in row order) from the target table's
    /// column→type map and the configured column→default map.
    pub fn resolve(
        table: &str,
        fields: &[String],
        schema: &HashMap<String, String>,
        defaults: &HashMap<String, String>,
    ) -> Result<Self> {
        let mut types = Vec::with_capacity(fields.len());
        let mut resolved_defaults = Vec::with_capacity(fields.len());
        for field in fields {
            let type_name = schema.get(field).ok_or_else(|| Error::UnknownColumn {
                column: field.clone(),
                table: table.to_string(),
            })?;
            types.push(ColumnType::classify(type_name));
            resolved_defaults.push(defaults.get(field).cloned());
        }
        Self::new(fields.to_vec(), types, resolved_defaults)
    }

    pub fn width(&self) -> usize {
        self.types.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn types(&self) -> &[ColumnType] {
        &self.types
    }

    pub fn defaults(&self) -> &[Option<String>] {
        &self.defaults
    }

    /// Verify a row lines up with this layout.
    pub fn check_row(&self, row: &Row) -> Result<()> {
        if row.len() != self.width() {
            return Err(Error::RowWidth {
                expected: self.width(),
                actual: row.len(),
            });
        }
        Ok(())
    }
}
