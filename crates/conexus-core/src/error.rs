use thiserror::Error;

/// Result type alias used throughout the search core.
pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds the search core distinguishes.
///
/// Validation and internal errors are never retried; connector errors are
/// recovered locally by the federation layer rather than failing the whole
/// request; timeouts surface only at the federation boundary.
#[derive(Error, Debug)]
pub enum Error {
    /// Empty id, empty vector, empty query, dimension mismatch, or an
    /// unsupported configuration value.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// `get`/`delete` against an id that does not exist.
    #[error("not found: {resource}")]
    NotFound { resource: String },

    /// Schema init, query execution, or (de)serialization failure.
    #[error("io error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A cancellation token fired while an operation was in flight.
    #[error("operation cancelled")]
    Cancelled,

    /// A federation deadline elapsed before all connectors returned.
    #[error("timeout after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// A specific connector failed; recorded on `FederatedResult.errors`
    /// rather than failing the overall request.
    #[error("connector {connector_id} failed: {message}")]
    Connector {
        connector_id: String,
        message: String,
    },

    /// An invariant was violated. Logged; surfaced to the caller as opaque.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl Error {
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
            source: None,
        }
    }

    pub fn io_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Io {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn connector<S1: Into<String>, S2: Into<String>>(connector_id: S1, message: S2) -> Self {
        Self::Connector {
            connector_id: connector_id.into(),
            message: message.into(),
        }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn timeout(elapsed_ms: u64) -> Self {
        Self::Timeout { elapsed_ms }
    }

    /// True for errors that a caller might reasonably retry (timeouts and
    /// io failures), false for validation/not-found/internal errors.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Io { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(source: serde_json::Error) -> Self {
        Self::Io {
            message: "json (de)serialization failed".to_string(),
            source: Some(Box::new(source)),
        }
    }
}
