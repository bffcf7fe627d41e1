//! Shared error type across apigate crates.

use thiserror::Error;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Invalid input / malformed request.
    BadRequest,
    /// Configuration rejected at load time.
    InvalidConfig,
    /// Unsupported configuration version.
    UnsupportedVersion,
    /// No authorization record matched the caller.
    NoMatchingRouter,
    /// Not allowed by policy.
    NotAllowed,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::InvalidConfig => "INVALID_CONFIG",
            ClientCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ClientCode::NoMatchingRouter => "NO_MATCHING_ROUTER",
            ClientCode::NotAllowed => "NOT_ALLOWED",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, ApiGateError>;

/// Unified error type used by core and gateway.
///
/// Expected policy denials are not errors; they travel as
/// [`Decision::Deny`](crate::Decision). Only malformed input, configuration
/// problems and invariant violations end up here.
#[derive(Debug, Error)]
pub enum ApiGateError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("no matching router for user {0}")]
    NoMatchingRouter(String),
    #[error("not allowed: {0}")]
    NotAllowed(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl ApiGateError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            ApiGateError::BadRequest(_) => ClientCode::BadRequest,
            ApiGateError::InvalidConfig(_) => ClientCode::InvalidConfig,
            ApiGateError::UnsupportedVersion => ClientCode::UnsupportedVersion,
            ApiGateError::NoMatchingRouter(_) => ClientCode::NoMatchingRouter,
            ApiGateError::NotAllowed(_) => ClientCode::NotAllowed,
            ApiGateError::Internal(_) => ClientCode::Internal,
        }
    }
}
