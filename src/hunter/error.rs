use thiserror::Error;

use crate::handlers::HandlerError;
use crate::transform::TransformError;

/// Failure delivered to every consumer attached when a hunt ends.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HuntError {
    #[error("no handler can load {0}")]
    UnrecognizedRequest(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("handler contract violated: {0}")]
    ContractViolation(String),

    #[error("failed: {0}")]
    Failed(String),

    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("request was cancelled")]
    Cancelled,

    #[error("engine is shutting down")]
    Shutdown,
}

impl HuntError {
    /// Map a handler failure onto the taxonomy.
    pub fn classify(err: &HandlerError) -> Self {
        if err.is_transient() {
            HuntError::Transient(err.to_string())
        } else if err.is_resource_exhaustion() {
            HuntError::ResourceExhausted(err.to_string())
        } else {
            HuntError::Failed(err.to_string())
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, HuntError::Transient(_))
    }

    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(self, HuntError::ResourceExhausted(_))
    }
}

impl From<HandlerError> for HuntError {
    fn from(err: HandlerError) -> Self {
        Self::classify(&err)
    }
}

impl From<TransformError> for HuntError {
    fn from(err: TransformError) -> Self {
        match err {
            TransformError::OutOfMemory { .. } => HuntError::ResourceExhausted(err.to_string()),
            TransformError::NullResult { .. } => HuntError::ContractViolation(err.to_string()),
            TransformError::Degenerate => HuntError::Failed(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_classify_handler_errors() {
        let io = HandlerError::Io(io::Error::other("reset"));
        assert!(HuntError::classify(&io).is_retryable());

        let response = HandlerError::Response("HTTP 503".into());
        assert!(HuntError::classify(&response).is_retryable());

        let oom = HandlerError::OutOfMemory("decoder".into());
        assert!(HuntError::classify(&oom).is_resource_exhaustion());

        let decode = HandlerError::Decode("bad header".into());
        assert!(matches!(HuntError::classify(&decode), HuntError::Failed(_)));
    }

    #[test]
    fn test_from_transform_error() {
        let oom: HuntError = TransformError::OutOfMemory {
            width: 1,
            height: 1,
        }
        .into();
        assert!(oom.is_resource_exhaustion());

        let null: HuntError = TransformError::NullResult { key: "k".into() }.into();
        assert!(matches!(null, HuntError::ContractViolation(_)));
        assert!(!null.is_retryable());
    }
}
