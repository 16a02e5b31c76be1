//! Error types for the portal controller
//!
//! Errors fall into four groups that callers handle differently:
//! - configuration errors (bad TLS material, unsupported backend database mode),
//!   fatal at startup and never retried
//! - transient backend errors (timeouts, transport failures, non-2xx responses),
//!   returned to the controller runtime which requeues the object
//! - contract violations (unsupported kinds, empty backend paths) that indicate a
//!   caller bug rather than a transient condition
//! - Kubernetes API errors, classified by status code

use thiserror::Error;

/// Main error type for portal controller operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// The Admin API could not be reached or answered with a non-2xx status
    #[error("backend error during {operation}: {message}")]
    Backend {
        /// Admin API operation that failed (e.g. "PUT /files/content/a")
        operation: String,
        /// Description of the failure
        message: String,
        /// HTTP status code, when the backend answered at all
        status: Option<u16>,
    },

    /// A backend call exceeded its deadline
    #[error("backend request timed out during {0}")]
    Timeout(String),

    /// A required argument was missing or empty
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An object of a kind this controller does not manage was presented
    #[error("unsupported kind: {0}")]
    UnsupportedKind(String),

    /// The Admin API reported a database mode this controller cannot work with
    #[error("{0} is not a supported database backend")]
    UnsupportedBackendMode(String),

    /// Invalid configuration (flags, TLS material, root info)
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Internal/operational error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a backend error for an operation that got no HTTP response
    pub fn backend(operation: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Backend {
            operation: operation.into(),
            message: msg.into(),
            status: None,
        }
    }

    /// Create a backend error carrying the HTTP status the Admin API answered with
    pub fn backend_status(operation: impl Into<String>, status: u16, msg: impl Into<String>) -> Self {
        Self::Backend {
            operation: operation.into(),
            message: msg.into(),
            status: Some(status),
        }
    }

    /// Create an invalid argument error with the given message
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create an unsupported kind error with the given message
    pub fn unsupported_kind(msg: impl Into<String>) -> Self {
        Self::UnsupportedKind(msg.into())
    }

    /// Create a configuration error with the given message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if this error is retryable
    ///
    /// Backend failures and timeouts are transient. Configuration errors and
    /// contract violations need a code or config change and are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube(source) => !matches!(
                source,
                kube::Error::Api(ae) if (400..500).contains(&ae.code) && ae.code != 409 && ae.code != 429
            ),
            Error::Backend { .. } => true,
            Error::Timeout(_) => true,
            Error::InvalidArgument(_) => false,
            Error::UnsupportedKind(_) => false,
            Error::UnsupportedBackendMode(_) => false,
            Error::Config(_) => false,
            Error::Serialization(_) => false,
            Error::Internal(_) => true,
        }
    }

    /// HTTP status code the backend answered with, if any
    pub fn backend_status_code(&self) -> Option<u16> {
        match self {
            Error::Backend { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
