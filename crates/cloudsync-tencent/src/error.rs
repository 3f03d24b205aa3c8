//! Error types for cloudsync-tencent

use thiserror::Error;

/// Tencent Cloud client error
#[derive(Debug, Error)]
pub enum Error {
    /// The API answered with an error envelope
    #[error("api error {code}: {message}")]
    Api {
        /// Error code (e.g. `AuthFailure.SignatureFailure`)
        code: String,
        /// Error message
        message: String,
    },

    /// Transport failure
    #[error("network error: {0}")]
    Network(String),

    /// Response body did not match the expected shape
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Client misconfiguration
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Network(e.to_string())
    }
}

impl From<Error> for cloudsync_core::Error {
    fn from(e: Error) -> Self {
        cloudsync_core::Error::Cloud(e.to_string())
    }
}
