//! Error types for the bus server
//!
//! [`ApiError`] covers everything a single request can run into and knows its
//! status code. [`ServerError`] and [`ConfigError`] are startup failures
//! returned to the host.

use std::net::SocketAddr;
use std::path::PathBuf;

use state_store::WriteError;
use thiserror::Error;
use warp::http::StatusCode;
use warp::reply::{Reply, Response};

/// A request-level failure, reported to the client as status + text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("The key \"{0}\" was not found.")]
    KeyNotFound(String),

    #[error("The key \"{0}\" is not writable.")]
    NotWritable(String),

    #[error("Could not decode JSON into a single map: {0}")]
    MalformedBody(String),

    #[error("The key prefix \"{0}\" is not valid UTF-8.")]
    InvalidPrefix(String),

    #[error("Specify user and password")]
    Unauthorized,

    /// Carries the methods the route does accept
    #[error("HTTP Method not implemented, use {0}")]
    UnsupportedMethod(&'static str),

    #[error("Could not encode state: {0}")]
    Serialization(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::KeyNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::NotWritable(_) | ApiError::Unauthorized => StatusCode::FORBIDDEN,
            ApiError::InvalidPrefix(_) => StatusCode::BAD_REQUEST,
            ApiError::UnsupportedMethod(_) => StatusCode::NOT_IMPLEMENTED,
            ApiError::MalformedBody(_) | ApiError::Serialization(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn into_response(self) -> Response {
        let status = self.status();
        warp::reply::with_status(self.to_string(), status).into_response()
    }
}

impl From<WriteError> for ApiError {
    fn from(err: WriteError) -> Self {
        match err {
            WriteError::KeyNotFound(key) => ApiError::KeyNotFound(key),
            WriteError::NotWritable(key) => ApiError::NotWritable(key),
        }
    }
}

impl warp::reject::Reject for ApiError {}

/// Invalid configuration values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid listen address: {0}")]
    InvalidListenAddress(String),
}

/// Reasons the server could not be started
#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Cannot read TLS file {}: {}", .path.display(), .source)]
    Tls {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Server failed to start: {0}")]
    StartFailed(String),
}
