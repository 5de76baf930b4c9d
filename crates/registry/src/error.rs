//! Error types for registry operations
use thiserror::Error;

use crate::events::ErrorKind;

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the registry.
///
/// Only [`Error::Duplicate`] and [`Error::Missing`] are published on the
/// registry's error channel. Every other variant is raised without a
/// notification.
#[derive(Error, Debug)]
pub enum Error {
    /// The identifier already has a binding in this registry.
    #[error("\"{identifier}\" already configured")]
    Duplicate {
        /// Display name of the identifier
        identifier: String,
    },

    /// No binding was found anywhere along the fallback chain.
    #[error("\"{identifier}\" could not be resolved")]
    Missing {
        /// Display name of the identifier
        identifier: String,
    },

    /// The registry, scope or channel has already been disposed.
    #[error("{target} is disposed")]
    Disposed {
        /// Description of the disposed object
        target: String,
    },

    /// A recipe parameter list does not fit the declared parameter slots.
    #[error("Invalid parameters for \"{identifier}\": {reason}")]
    Parameters {
        /// Display name of the identifier being bound or built
        identifier: String,
        /// What did not match
        reason: String,
    },

    /// An erased instance did not have the identifier's declared type.
    #[error("Instance of \"{identifier}\" is not a {expected}")]
    TypeMismatch {
        /// Display name of the identifier
        identifier: String,
        /// The type the caller asked for
        expected: &'static str,
    },

    /// Registry configuration is invalid
    #[error("Configuration error: {message}")]
    Configuration {
        /// The error message
        message: String,
    },

    /// A caller-supplied builder failed with a foreign error.
    ///
    /// The registry never produces this variant on its own; builders use
    /// [`Error::build`] to surface errors that are not registry errors.
    #[error("Failed to build \"{identifier}\": {source}")]
    Build {
        /// Display name of the identifier
        identifier: String,
        /// The underlying error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Wrap a foreign error raised while building `identifier`.
    pub fn build<S, E>(identifier: S, source: E) -> Self
    where
        S: Into<String>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Build {
            identifier: identifier.into(),
            source: source.into(),
        }
    }

    /// The notification kind of this error, if it is one that gets published.
    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Duplicate { .. } => Some(ErrorKind::Duplicate),
            Self::Missing { .. } => Some(ErrorKind::Missing),
            _ => None,
        }
    }

    /// Whether this is the disposed-guard failure.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        matches!(self, Self::Disposed { .. })
    }

    /// Get the identifier display name associated with this error (if any)
    #[must_use]
    pub fn identifier(&self) -> Option<&str> {
        match self {
            Self::Disposed { .. } | Self::Configuration { .. } => None,
            Self::Duplicate { identifier }
            | Self::Missing { identifier }
            | Self::Parameters { identifier, .. }
            | Self::TypeMismatch { identifier, .. }
            | Self::Build { identifier, .. } => Some(identifier),
        }
    }
}
