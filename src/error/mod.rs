//! Failure taxonomy for a single proxied request.
//!
//! Every variant is scoped to the request that produced it; nothing here is
//! fatal to the process.

use thiserror::Error;

use crate::http::StatusCode;

/// Why a `/gamepasses/:userId` request did not produce a list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyError {
    /// The user id is not a non-negative integer.
    #[error("invalid user id {input:?}: must be numeric")]
    InvalidInput { input: String },

    /// The request gate refused the client.
    #[error("rate limit exceeded")]
    RateLimited,

    /// An upstream call answered 403.
    #[error("upstream {endpoint} returned 403 Forbidden")]
    UpstreamForbidden { endpoint: &'static str },

    /// Transport error, timeout, non-2xx status or unparseable body.
    #[error("upstream {endpoint} failed: {reason}")]
    UpstreamFailure {
        endpoint: &'static str,
        reason: String,
    },
}

pub type ProxyResult<T> = Result<T, ProxyError>;

impl ProxyError {
    pub(crate) fn failure(endpoint: &'static str, reason: impl Into<String>) -> Self {
        Self::UpstreamFailure {
            endpoint,
            reason: reason.into(),
        }
    }

    /// Status code the front door answers with.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput { .. } => StatusCode::BadRequest,
            Self::RateLimited => StatusCode::TooManyRequests,
            Self::UpstreamForbidden { .. } => StatusCode::Forbidden,
            Self::UpstreamFailure { .. } => StatusCode::BadGateway,
        }
    }

    /// Fixed client-facing message. Upstream details stay in the logs.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "Invalid userId: must be numeric",
            Self::RateLimited => "Too many requests, please try again later.",
            Self::UpstreamForbidden { .. } => "Upstream denied access (403 Forbidden)",
            Self::UpstreamFailure { .. } => "Failed to fetch gamepasses from upstream",
        }
    }
}
