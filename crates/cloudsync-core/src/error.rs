//! Error types for cloudsync-core
//!
//! Every failure in this crate is scoped to a single task run, a single
//! queue item, or a single caller request. Nothing here is fatal to the
//! process.

use thiserror::Error;

use crate::task::TaskId;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// A task with the same name already exists
    #[error("task name already exists: {0}")]
    DuplicateTaskName(String),

    /// Period type/value pair could not be parsed
    #[error("invalid period '{value}' for period type '{period_type}'")]
    InvalidPeriod {
        /// Raw period type (`day`, `hour`, `minute`)
        period_type: String,
        /// Raw period value
        value: String,
    },

    /// Task lookup returned nothing
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// Inventory service read or write failed
    #[error("inventory error: {0}")]
    Inventory(String),

    /// Cloud provider listing failed
    #[error("cloud provider error: {0}")]
    Cloud(String),

    /// An inventory record carried an unexpected type for a field
    #[error("field '{field}' is not a valid {expected}")]
    FieldCoercion {
        /// Attribute key
        field: &'static str,
        /// Expected type name
        expected: &'static str,
    },

    /// Shared signal queue transport failed
    #[error("signal queue error: {0}")]
    Signal(String),

    /// JSON encode/decode failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<redis::RedisError> for Error {
    fn from(e: redis::RedisError) -> Self {
        Error::Signal(e.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::DuplicateTaskName("nightly".to_string());
        assert_eq!(err.to_string(), "task name already exists: nightly");

        let err = Error::FieldCoercion {
            field: "bk_host_innerip",
            expected: "string",
        };
        assert_eq!(err.to_string(), "field 'bk_host_innerip' is not a valid string");
    }

    #[test]
    fn test_invalid_period_display() {
        let err = Error::InvalidPeriod {
            period_type: "hour".to_string(),
            value: "75".to_string(),
        };
        assert!(err.to_string().contains("'75'"));
    }
}
