use thiserror::Error;

use super::ScaleMode;

/// Invalid builder usage.
///
/// These are caller bugs, not runtime conditions: they are reported at the
/// offending call and never reach consumers as a load failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("image resource id may not be 0")]
    ZeroResourceId,

    #[error("invalid image uri '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("target size must be positive, got {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    #[error("{requested} can not be used together with {active}")]
    ConflictingScaleMode {
        requested: ScaleMode,
        active: ScaleMode,
    },

    #[error("{0} requires calling resize")]
    MissingResize(ScaleMode),
}

pub type Result<T> = std::result::Result<T, RequestError>;
