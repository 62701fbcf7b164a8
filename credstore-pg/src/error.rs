//! Error types for the storage layer.

use thiserror::Error;

/// Result type alias for storage operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Storage error taxonomy.
///
/// The synchronous facade converts every variant into a `false`/`None`
/// sentinel at its boundary; the variants exist so that conversion can
/// log what actually went wrong.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The enablement signal is absent, or a record is unusable as given.
    #[error("storage not configured: {reason}")]
    Config { reason: String },

    /// Pool or driver construction failed (unreachable host, bad auth).
    /// Never cached: the next call retries construction.
    #[error("storage unavailable: {source}")]
    Unavailable {
        #[source]
        source: sqlx::Error,
    },

    /// A specific statement failed; the enclosing transaction, if any,
    /// rolls back.
    #[error("{op} failed: {source}")]
    Operation {
        op: &'static str,
        #[source]
        source: sqlx::Error,
    },

    /// The execution bridge could not produce a result.
    #[error("execution bridge failed: {reason}")]
    Bridge { reason: String },
}

impl StoreError {
    /// Create a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Create an unavailable error from a driver failure
    pub fn unavailable(source: sqlx::Error) -> Self {
        Self::Unavailable { source }
    }

    /// Create an operation error tagged with the failing operation
    pub fn operation(op: &'static str, source: sqlx::Error) -> Self {
        Self::Operation { op, source }
    }

    /// Create a bridge error
    pub fn bridge(reason: impl Into<String>) -> Self {
        Self::Bridge {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_errors_name_the_operation() {
        let err = StoreError::operation("sync accounts", sqlx::Error::PoolClosed);
        assert!(err.to_string().starts_with("sync accounts failed"));
    }

    #[test]
    fn config_errors_carry_the_reason() {
        let err = StoreError::config("DATABASE_URL is not set");
        assert!(err.to_string().contains("DATABASE_URL"));
    }
}
