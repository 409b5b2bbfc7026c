//! Error types for the gateway

use crate::pattern::PatternError;
use ferry_core::Status;
use http::{Method, StatusCode};
use thiserror::Error;

/// Gateway errors
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Route not found: {0}")]
    RouteNotFound(String),

    #[error("Method not allowed: {method} for path {path}")]
    MethodNotAllowed {
        method: Method,
        path: String,
        allowed: Vec<Method>,
    },

    #[error("Invalid path pattern: {0}")]
    Pattern(#[from] PatternError),

    #[error("Invalid endpoint: {0}")]
    Endpoint(#[from] ferry_client::ClientError),
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

impl GatewayError {
    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::RouteNotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::Pattern(_) | GatewayError::Endpoint(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Structured status for the error body
    pub fn to_status(&self) -> Status {
        match self {
            GatewayError::RouteNotFound(_) => Status::not_found(self.to_string()),
            GatewayError::MethodNotAllowed { .. } => Status::unimplemented(self.to_string()),
            GatewayError::Pattern(_) | GatewayError::Endpoint(_) => Status::internal(self.to_string()),
        }
    }
}
