//! Crate-level error types.
//!
//! [`VantageError`] unifies every error source (configuration, credential
//! storage, exchange API, JSON) behind a single enum so callers can match
//! on the variant they care about while still using the `?` operator for
//! easy propagation.

use crate::exchange::ApiError;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, VantageError>;

/// Top-level error type returned by all public APIs.
#[derive(Debug, thiserror::Error)]
pub enum VantageError {
    /// A configuration value was missing, malformed, or inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// The credential store could not be read, written, or decrypted.
    #[error("credential store error: {0}")]
    Credentials(#[from] crate::credentials::StoreError),

    /// An exchange REST call failed (transport, signature, or API error).
    #[error("exchange error: {0}")]
    Exchange(#[from] ApiError),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A filesystem operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
