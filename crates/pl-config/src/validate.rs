//! Semantic validation of a loaded configuration.

use crate::loader::LoaderConfig;
use std::fmt;

/// A single validation problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required option missing or empty.
    Missing(&'static str),
    /// Only one of username/password given.
    CredentialPair,
    /// Timeout of zero seconds.
    ZeroTimeout,
    /// Default given for a column the schema does not know.
    UnknownDefault(String),
    /// Row field missing from the schema.
    UnknownField(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Missing(option) => write!(f, "option {} is required", option),
            ValidationError::CredentialPair => {
                f.write_str("please specify username and password at the same time")
            }
            ValidationError::ZeroTimeout => f.write_str("builder.timeout_secs must be positive"),
            ValidationError::UnknownDefault(column) => {
                write!(f, "default value given for unknown column {}", column)
            }
            ValidationError::UnknownField(column) => {
                write!(f, "field {} is not a column of the schema", column)
            }
        }
    }
}

/// Outcome of validation.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check a configuration, collecting every problem.
pub fn validate(config: &LoaderConfig) -> ValidationResult {
    let mut errors = Vec::new();

    let required = [
        ("database", config.database.as_str()),
        ("table", config.table.as_str()),
        ("upload_root", config.upload_root.as_str()),
    ];
    for (name, value) in required {
        if value.trim().is_empty() {
            errors.push(ValidationError::Missing(name));
        }
    }
    if config.builder.binary_dir.as_os_str().is_empty() {
        errors.push(ValidationError::Missing("builder.binary_dir"));
    }
    if config.username.is_some() != config.password.is_some() {
        errors.push(ValidationError::CredentialPair);
    }
    if config.remote_user().is_none() {
        errors.push(ValidationError::Missing("remote_user"));
    }
    if config.builder.timeout_secs == Some(0) {
        errors.push(ValidationError::ZeroTimeout);
    }
    if !config.schema.is_empty() {
        let mut unknown: Vec<_> = config
            .default_values
            .keys()
            .filter(|column| !config.schema.contains_key(*column))
            .cloned()
            .collect();
        unknown.sort();
        errors.extend(unknown.into_iter().map(ValidationError::UnknownDefault));
        errors.extend(
            config
                .fields
                .iter()
                .filter(|field| !config.schema.contains_key(*field))
                .cloned()
                .map(ValidationError::UnknownField),
        );
    }

    ValidationResult { errors }
}
