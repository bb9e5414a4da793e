//! Error types shared by the plugin crates
//!
//! Errors are structured with fields to aid debugging in production.
//! Each variant carries the object kind or context it was raised for.

use thiserror::Error;

/// Main error type for plugin operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Conversion between the untyped item and a typed object failed
    #[error("serialization error{}: {message}", kind.as_ref().map(|k| format!(" for {}", k)).unwrap_or_default())]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being converted (if known)
        kind: Option<String>,
    },

    /// Invalid input, e.g. a malformed resource name or label selector
    #[error("validation error: {message}")]
    Validation {
        /// Description of what's invalid
        message: String,
        /// The invalid field path (e.g., "spec.includedResources")
        field: Option<String>,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "telemetry", "server")
        context: String,
    },
}

impl Error {
    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error with resource kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create a validation error with a field path
    pub fn validation_for_field(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }
}
