//! Common error types for the confrarias workflows

use serde::Serialize;
use thiserror::Error;

/// Common result type for confrarias operations
pub type Result<T> = std::result::Result<T, Error>;

/// A single field-level validation message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// All field-level messages produced while validating one payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(pub Vec<FieldError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if any message is attached to `field`
    pub fn has(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.push(field, message);
        errors
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Error taxonomy shared by every workflow
///
/// The first group is caller-facing and safe to display. The second group
/// (`Database`, `Io`, `Upstream`, `Config`) wraps collaborator failures and
/// must be logged and replaced with a generic message at the HTTP boundary.
#[derive(Error, Debug)]
pub enum Error {
    /// No session present
    #[error("É necessário iniciar sessão")]
    NotAuthenticated,

    /// Session present but privilege insufficient
    #[error("Não tens permissão para esta ação: {0}")]
    NotAuthorized(String),

    /// Payload failed schema validation
    #[error("Dados inválidos: {0}")]
    Validation(FieldErrors),

    /// Requested row does not exist
    #[error("Não encontrado: {0}")]
    NotFound(String),

    /// Unique constraint violation (duplicate request, testimonial, type...)
    #[error("{0}")]
    Conflict(String),

    /// Referential guard blocked a deletion
    #[error("{what} está em uso por {count} registo(s)")]
    InUse { what: String, count: i64 },

    /// Transition out of a terminal (or otherwise wrong) state
    #[error("Transição inválida: {0}")]
    InvalidTransition(String),

    /// Relational store error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Blob store / filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Identity provider or other collaborator failure
    #[error("Upstream failure: {0}")]
    Upstream(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error originates from a collaborator rather than the caller
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Error::Database(_) | Error::Io(_) | Error::Upstream(_) | Error::Config(_)
        )
    }

    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        Error::Validation(FieldErrors::single(field, message))
    }
}

/// Translate a unique-constraint violation into `Conflict(message)`
///
/// Any other database error is passed through unchanged.
pub fn conflict_on_unique(err: sqlx::Error, message: &str) -> Error {
    let is_unique = err
        .as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false);

    if is_unique {
        Error::Conflict(message.to_string())
    } else {
        Error::Database(err)
    }
}
