//! Error types for the userload batch.
//!
//! One enum per component, tied together by [`BatchError`]:
//!
//! - [`SourceError`] - reading and parsing the input file
//! - [`ValidationError`] - why a row was dropped (collected, never raised)
//! - [`SinkError`] - writing or re-reading the processed file
//! - [`GatewayError`] - database session and statement failures
//! - [`ConfigError`] - environment / CLI configuration
//! - [`BatchError`] - top-level orchestration
//!
//! Conversions into [`BatchError`] are automatic via `From`,
//! so `?` works across the file stages.

use std::path::PathBuf;

use thiserror::Error;

// =============================================================================
// Record Source Errors
// =============================================================================

/// Errors while reading the delimited input file.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The file could not be read.
    #[error("Cannot read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Header and row shapes disagree, or the bytes are not valid CSV.
    #[error("Line {line}: {message}")]
    Parse { line: u64, message: String },

    /// A required column is absent from the header.
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// The file has no header row.
    #[error("Input file is empty")]
    Empty,
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Why an email address failed the syntax check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmailRejection {
    Empty,
    MissingAt,
    MultipleAt,
    InvalidLocalPart,
    InvalidDomain,
    NoDotInDomain,
    TooLong,
}

impl EmailRejection {
    /// Stable reason code used in logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::MissingAt => "missing_at",
            Self::MultipleAt => "multiple_at",
            Self::InvalidLocalPart => "invalid_local_part",
            Self::InvalidDomain => "invalid_domain",
            Self::NoDotInDomain => "no_dot_in_domain",
            Self::TooLong => "too_long",
        }
    }
}

impl std::fmt::Display for EmailRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Reason a raw row was excluded from the output set.
///
/// These are recovered locally by dropping the row; the batch carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Email failed the syntax check.
    #[error("Invalid email '{email}' ({reason})")]
    InvalidEmail { email: String, reason: EmailRejection },

    /// `signup_date` did not match `DD.MM.YYYY HH:MM`.
    #[error("Unparseable signup_date '{value}'")]
    InvalidSignupDate { value: String },

    /// `user_id` is not a UUID.
    #[error("Invalid user_id '{value}'")]
    InvalidUserId { value: String },

    /// A required field is empty.
    #[error("Missing value for field: {0}")]
    MissingField(&'static str),

    /// A stored `domain` that is not the part of `email` after the `@`.
    #[error("Domain '{domain}' does not match email '{email}'")]
    DomainMismatch { email: String, domain: String },
}

impl ValidationError {
    /// Short reason code, used to group rejections in the summary.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidEmail { .. } => "invalid_email",
            Self::InvalidSignupDate { .. } => "invalid_signup_date",
            Self::InvalidUserId { .. } => "invalid_user_id",
            Self::MissingField(_) => "missing_field",
            Self::DomainMismatch { .. } => "domain_mismatch",
        }
    }
}

// =============================================================================
// Sink Writer Errors
// =============================================================================

/// Errors while writing (or re-reading) the processed file.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The target could not be opened or written.
    #[error("Cannot write '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serialization or deserialization of a record failed.
    #[error("CSV error: {0}")]
    Csv(String),
}

// =============================================================================
// Persistence Gateway Errors
// =============================================================================

/// Database errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The database could not be reached.
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// The statement was malformed or rejected; the transaction was rolled back.
    #[error("Query '{statement}' failed: {message}")]
    Query { statement: String, message: String },

    /// An operation was attempted without a live session.
    #[error("Not connected: cannot run {operation}")]
    NotConnected { operation: &'static str },

    /// A result column has a type that cannot be rendered.
    #[error("Column '{column}' has unsupported type {type_name}")]
    UnsupportedColumn { column: String, type_name: String },
}

impl GatewayError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn query(statement: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Query {
            statement: statement.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Invalid configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: '{value}' ({reason})")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: &'static str,
    },
}

// =============================================================================
// Batch Errors (top-level)
// =============================================================================

/// Fatal batch errors.
///
/// Database failures are deliberately absent: they are logged and recorded
/// in the report, and never abort the batch.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for Record Source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Result type for Sink Writer operations.
pub type SinkResult<T> = Result<T, SinkError>;

/// Result type for Persistence Gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for batch runs.
pub type BatchResult<T> = Result<T, BatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let source_err = SourceError::MissingColumn("email".into());
        let batch_err: BatchError = source_err.into();
        assert!(batch_err.to_string().contains("email"));

        let sink_err = SinkError::Csv("bad record".into());
        let batch_err: BatchError = sink_err.into();
        assert!(batch_err.to_string().contains("bad record"));
    }

    #[test]
    fn test_validation_error_format() {
        let err = ValidationError::InvalidEmail {
            email: "not-an-email".into(),
            reason: EmailRejection::MissingAt,
        };
        let msg = err.to_string();
        assert!(msg.contains("not-an-email"));
        assert!(msg.contains("missing_at"));
        assert_eq!(err.code(), "invalid_email");
    }

    #[test]
    fn test_gateway_error_format() {
        let err = GatewayError::NotConnected { operation: "upsert" };
        assert!(err.to_string().contains("upsert"));

        let err = GatewayError::query("distinct_domains", "relation does not exist");
        let msg = err.to_string();
        assert!(msg.contains("distinct_domains"));
        assert!(msg.contains("relation does not exist"));
    }
}
