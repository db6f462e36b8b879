//! Error types for bucketd
//!
//! Provides unified error handling using thiserror.

use std::io;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::admission::Rejection;
use crate::models::ErrorResponse;

// == Bucket Error Enum ==
/// Outcome of a request that did not produce a value.
#[derive(Error, Debug)]
pub enum BucketError {
    /// Hostname, domain or limit check failed, or the store is at capacity.
    #[error(transparent)]
    Rejected(#[from] Rejection),

    /// Key not found in the store
    #[error("key not found: {0}")]
    NotFound(String),

    /// The backing store failed to answer
    #[error(transparent)]
    Store(#[from] StoreError),
}

// == Store Error ==
/// Opaque failure reported by the backing engine.
#[derive(Error, Debug, Clone)]
#[error("store error: {0}")]
pub struct StoreError(pub String);

impl StoreError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        Self(err.to_string())
    }
}

// == Config Error ==
/// Configuration loading and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFile(#[source] io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value {value:?} for {var}")]
    InvalidEnv { var: String, value: String },

    #[error("invalid mode {0:?}, must be 'http', 'dns' or 'both'")]
    InvalidMode(String),

    #[error("http.hostname must be set when the HTTP listener is enabled")]
    MissingHostname,

    #[error("dns.fqdn must be set when the DNS listener is enabled")]
    MissingFqdn,

    #[error("store.cleanup_interval must be greater than 0")]
    ZeroCleanupInterval,

    #[error("invalid store engine {0:?}, must be 'redis' or 'memory'")]
    InvalidEngine(String),

    #[error("redis.address must be set when the redis engine is selected")]
    MissingRedisAddress,
}

// == IntoResponse Implementation ==
impl IntoResponse for BucketError {
    fn into_response(self) -> Response {
        let status = match &self {
            BucketError::Rejected(Rejection::OverCapacity) => StatusCode::TOO_MANY_REQUESTS,
            BucketError::Rejected(_) => StatusCode::BAD_REQUEST,
            BucketError::NotFound(_) => StatusCode::NOT_FOUND,
            BucketError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for request handling.
pub type Result<T> = std::result::Result<T, BucketError>;
