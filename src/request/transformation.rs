use crate::bitmap::SharedImage;

/// Custom post-processing step applied after the built-in geometry.
///
/// Returning `None` is a contract violation and fails the whole load.
/// Implementations that produce a new image simply drop their handle on
/// the source.
pub trait Transformation: Send + Sync {
    fn transform(&self, source: SharedImage) -> Option<SharedImage>;

    /// Stable identifier folded into the request fingerprint.
    fn key(&self) -> String;
}
