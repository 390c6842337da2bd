//! Contract error types for the external module framework
//!
//! These errors are transport-agnostic and surfaced synchronously to the
//! calling module. None of them are retried automatically.

/// External module framework errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameworkError {
    /// Malformed module configuration (fatal at registration time)
    #[error("Configuration error in module '{prefix}': {message}")]
    Configuration {
        /// Module directory prefix
        prefix: String,
        /// Error details
        message: String,
    },

    /// Bad key or value on a single call
    #[error("Validation error: {message}")]
    Validation {
        /// Validation error message
        message: String,
    },

    /// Key or serialized value exceeds the configured limits
    #[error("Size limit exceeded for setting '{key}': {message}")]
    SizeLimit {
        /// Offending key
        key: String,
        /// Limit details
        message: String,
    },

    /// Attempt to override a reserved field or cross a module boundary
    #[error("Permission denied: {message}")]
    Permission {
        /// Permission error message
        message: String,
    },

    /// Malformed log query text
    #[error("Query syntax error: {message}")]
    Syntax {
        /// Parser error message
        message: String,
    },

    /// A parameter that could not be detected from the request context
    #[error("You must supply the following either in the request context or as an argument: {name}")]
    MissingParameter {
        /// Parameter name
        name: String,
    },

    /// Storage failure (details are logged, not exposed)
    #[error("Internal error")]
    Internal,
}

impl FrameworkError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub(crate) fn permission(message: impl Into<String>) -> Self {
        Self::Permission {
            message: message.into(),
        }
    }

    pub(crate) fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax {
            message: message.into(),
        }
    }

    /// Log a storage error and collapse it into [`FrameworkError::Internal`]
    pub(crate) fn internal(error: anyhow::Error) -> Self {
        tracing::error!(error = ?error, "storage operation failed");
        Self::Internal
    }
}
