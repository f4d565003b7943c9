//! partload common types, IDs, and errors.
//!
//! This crate provides foundational types shared across the partload crates:
//! - The row value model handed over by the surrounding dataset engine
//! - Column type categories derived from target-store type strings
//! - Table and upload identifiers
//! - Common error types and the failure taxonomy

pub mod error;
pub mod id;
pub mod schema;
pub mod value;

pub use error::{Error, FailureKind, Result};
pub use id::{TableIdent, UploadPrefix};
pub use schema::{ColumnLayout, ColumnType};
pub use value::{Decimal, Row, Value};

/// Field delimiter of the pipe protocol.
pub const FIELD_DELIMITER: char = ',';

/// Row terminator of the pipe protocol.
pub const LINE_END: char = '\n';
