//! Error types shared by the store, the onboarding workflow and config loading.

use crate::validation::FieldErrors;

/// Rejected environment settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Storage failures.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// The database file or connection could not be opened.
    #[error("cannot open database: {0}")]
    Open(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("no {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error("schema migration: {0}")]
    Migration(String),

    /// A stored value did not decode into its Rust type.
    #[error("bad stored value: {0}")]
    Serialization(String),
}

impl DatabaseError {
    /// Classify a libSQL write error, separating constraint violations from
    /// ordinary query failures.
    pub fn from_write(context: &str, err: libsql::Error) -> Self {
        let message = err.to_string();
        if message.contains("constraint failed") {
            Self::Constraint(format!("{context}: {message}"))
        } else {
            Self::Query(format!("{context}: {message}"))
        }
    }

    /// Whether this is a UNIQUE violation on the given `table.column`.
    pub fn is_unique_violation(&self, column: &str) -> bool {
        matches!(self, Self::Constraint(msg) if msg.contains("UNIQUE") && msg.contains(column))
    }
}

/// Input rejected by a validation schema.
///
/// Carries a summary message plus the per-field messages, mirroring the
/// `validationErrors` object returned to HTTP callers.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
    pub errors: FieldErrors,
}

impl ValidationError {
    pub fn new(message: impl Into<String>, errors: FieldErrors) -> Self {
        Self {
            message: message.into(),
            errors,
        }
    }

    /// A validation failure on a single field.
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.clone()]);
        Self { message, errors }
    }
}

/// Onboarding workflow errors.
#[derive(Debug, thiserror::Error)]
pub enum OnboardingError {
    #[error("Application {id} not found")]
    NotFound { id: i64 },

    #[error("Invalid step number: {step}")]
    InvalidStep { step: i64 },

    #[error("Application {id} is {status} and cannot be modified")]
    Closed { id: i64, status: String },

    #[error("Invalid form data: {0}")]
    InvalidData(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}
