//! Request-scoped failure taxonomy.
//!
//! Every failure is resolved at the resolver boundary into one of three
//! kinds. Negative answers (`Forbidden` decisions, `NotFound` expansions) are
//! not errors and travel in the success channel instead.

use std::fmt;

use ozone_core::UpstreamError;

/// Failures of a gateway operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The caller supplied an incomplete or unparseable query.
    #[error("Bad request: {message}")]
    BadRequest {
        /// What was wrong with the query.
        message: String,
    },

    /// Missing, malformed or invalid bearer token.
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Why the caller could not be authenticated.
        message: String,
    },

    /// Transport failure or timeout talking to an upstream service.
    #[error("Upstream unavailable: {service} - {message}")]
    UpstreamUnavailable {
        /// Which upstream failed.
        service: String,
        /// Description of the failure.
        message: String,
    },
}

impl GatewayError {
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn upstream_unavailable(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Wrap a transport failure from the named upstream.
    #[must_use]
    pub fn from_upstream(service: &str, err: &UpstreamError) -> Self {
        Self::upstream_unavailable(service, err.to_string())
    }

    /// The message surfaced to the caller.
    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message }
            | Self::Unauthorized { message }
            | Self::UpstreamUnavailable { message, .. } => message,
        }
    }

    /// HTTP status code for this failure.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest { .. } => 400,
            Self::Unauthorized { .. } => 401,
            Self::UpstreamUnavailable { .. } => 424,
        }
    }

    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::BadRequest { .. } => ErrorCategory::Validation,
            Self::Unauthorized { .. } => ErrorCategory::Authentication,
            Self::UpstreamUnavailable { .. } => ErrorCategory::Dependency,
        }
    }

    /// Whether the caller is at fault, as opposed to a dependency.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::UpstreamUnavailable { .. })
    }
}

/// Categories of gateway errors for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Request validation errors.
    Validation,
    /// Identity verification errors.
    Authentication,
    /// An upstream service is down or too slow.
    Dependency,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Authentication => write!(f, "authentication"),
            Self::Dependency => write!(f, "dependency"),
        }
    }
}
