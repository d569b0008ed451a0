use serde::Serialize;
use thiserror::Error;

/// Boxed cause carried by upstream failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error category used for status mapping and retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Request failed validation
    InvalidRequest,
    /// Unknown session or container
    NotFound,
    /// No host port could be leased
    ResourceExhausted,
    /// The container engine call failed
    Upstream,
    /// State could not be determined
    Unknown,
    /// Local failure unrelated to the request
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::NotFound => "not_found",
            ErrorKind::ResourceExhausted => "resource_exhausted",
            ErrorKind::Upstream => "upstream",
            ErrorKind::Unknown => "unknown",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cube unified error type
#[derive(Error, Debug)]
pub enum CubeError {
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Resource exhausted: {message}")]
    ResourceExhausted {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Container engine error: {message}")]
    Upstream {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Unknown state: {message}")]
    Unknown { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Output error: {0}")]
    Output(String),
}

impl CubeError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest { message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound { message: message.into() }
    }

    pub fn exhausted(message: impl Into<String>) -> Self {
        Self::ResourceExhausted { message: message.into(), source: None }
    }

    /// Upstream failure wrapping the engine's own error
    pub fn upstream<E>(message: impl Into<String>, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Upstream { message: message.into(), source: Some(source.into()) }
    }

    pub fn upstream_msg(message: impl Into<String>) -> Self {
        Self::Upstream { message: message.into(), source: None }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown { message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            CubeError::InvalidRequest { .. } => ErrorKind::InvalidRequest,
            CubeError::NotFound { .. } => ErrorKind::NotFound,
            CubeError::ResourceExhausted { .. } => ErrorKind::ResourceExhausted,
            CubeError::Upstream { .. } => ErrorKind::Upstream,
            CubeError::Unknown { .. } => ErrorKind::Unknown,
            CubeError::Config { .. }
            | CubeError::Internal { .. }
            | CubeError::Io(_)
            | CubeError::Output(_) => ErrorKind::Internal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Prefix the message with the operation that failed, keeping kind and cause
    pub fn context(self, what: impl std::fmt::Display) -> Self {
        match self {
            CubeError::InvalidRequest { message } => CubeError::InvalidRequest {
                message: format!("{}: {}", what, message),
            },
            CubeError::NotFound { message } => CubeError::NotFound {
                message: format!("{}: {}", what, message),
            },
            CubeError::ResourceExhausted { message, source } => CubeError::ResourceExhausted {
                message: format!("{}: {}", what, message),
                source,
            },
            CubeError::Upstream { message, source } => CubeError::Upstream {
                message: format!("{}: {}", what, message),
                source,
            },
            CubeError::Unknown { message } => CubeError::Unknown {
                message: format!("{}: {}", what, message),
            },
            other => other,
        }
    }
}

pub type CubeResult<T> = Result<T, CubeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(CubeError::invalid_request("x").kind(), ErrorKind::InvalidRequest);
        assert_eq!(CubeError::not_found("x").kind(), ErrorKind::NotFound);
        assert_eq!(CubeError::exhausted("x").kind(), ErrorKind::ResourceExhausted);
        assert_eq!(CubeError::upstream_msg("x").kind(), ErrorKind::Upstream);
        assert_eq!(CubeError::config("x").kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_context_keeps_kind_and_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = CubeError::upstream("engine unreachable", io).context("failed to create container");

        assert_eq!(err.kind(), ErrorKind::Upstream);
        assert!(err.to_string().contains("failed to create container: engine unreachable"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_not_found_check() {
        let err = CubeError::not_found("session 'abc'").context("delete");
        assert!(err.is_not_found());
        assert!(!CubeError::internal("boom").is_not_found());
    }
}
