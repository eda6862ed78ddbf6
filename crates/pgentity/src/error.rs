//! Error types for pgentity

use std::sync::Arc;
use thiserror::Error;

/// Result type alias for pgentity operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for engine operations.
///
/// `OrmError` is `Clone` so that a shared execution can hand the same outcome to
/// every awaiter; driver errors are kept behind an `Arc`.
#[derive(Debug, Clone, Error)]
pub enum OrmError {
    /// Missing or inconsistent model metadata, unresolved relation target,
    /// unknown connection name.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A predicate, select list, sort or population request that cannot be
    /// compiled against the model. Raised before any statement is sent.
    #[error("Query error on model `{model}`: {message}{}", predicate_suffix(.predicate))]
    Query {
        model: String,
        message: String,
        predicate: Option<String>,
    },

    /// Error returned by the PostgreSQL driver.
    #[error("Driver error: {0}")]
    Driver(Arc<tokio_postgres::Error>),

    /// Unique constraint violation
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// A lifecycle hook rejected or reshaped its payload.
    #[error("Lifecycle hook error on model `{model}`: {message}")]
    Hook { model: String, message: String },

    /// Pool error
    #[error("Pool error: {0}")]
    Pool(String),

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

fn predicate_suffix(predicate: &Option<String>) -> String {
    match predicate {
        Some(p) => format!(" (predicate: {p})"),
        None => String::new(),
    }
}

impl OrmError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a query error naming the owning model.
    pub fn query(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Query {
            model: model.into(),
            message: message.into(),
            predicate: None,
        }
    }

    /// Create a query error naming the owning model and the offending predicate.
    pub fn query_with_predicate(
        model: impl Into<String>,
        message: impl Into<String>,
        predicate: impl Into<String>,
    ) -> Self {
        Self::Query {
            model: model.into(),
            message: message.into(),
            predicate: Some(predicate.into()),
        }
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a lifecycle hook error
    pub fn hook(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Hook {
            model: model.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Check if this is a query (predicate/select/populate) error
    pub fn is_query(&self) -> bool {
        matches!(self, Self::Query { .. })
    }

    /// Check if this is a configuration error
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }

    /// Parse a tokio_postgres error into a more specific OrmError
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let constraint = db_err.constraint().unwrap_or("unknown");
            let message = db_err.message();

            match db_err.code().code() {
                "23505" => return Self::UniqueViolation(format!("{}: {}", constraint, message)),
                "23503" => {
                    return Self::ForeignKeyViolation(format!("{}: {}", constraint, message));
                }
                "23514" => return Self::CheckViolation(format!("{}: {}", constraint, message)),
                _ => {}
            }
        }
        Self::Driver(Arc::new(err))
    }
}

impl From<tokio_postgres::Error> for OrmError {
    fn from(err: tokio_postgres::Error) -> Self {
        Self::from_db_error(err)
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for OrmError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_error_names_model_and_predicate() {
        let err = OrmError::query_with_predicate(
            "Product",
            "unknown property `nope`",
            r#"{"nope":1}"#,
        );
        let msg = err.to_string();
        assert!(msg.contains("`Product`"));
        assert!(msg.contains("unknown property `nope`"));
        assert!(msg.contains(r#"(predicate: {"nope":1})"#));
        assert!(err.is_query());
    }

    #[test]
    fn query_error_without_predicate() {
        let err = OrmError::query("Store", "bad sort");
        assert_eq!(err.to_string(), "Query error on model `Store`: bad sort");
    }
}
