use std::fmt;

use crate::bitmap::SharedImage;

/// Where a delivered image came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadedFrom {
    Memory,
    Disk,
    Network,
}

impl fmt::Display for LoadedFrom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoadedFrom::Memory => "memory",
            LoadedFrom::Disk => "disk",
            LoadedFrom::Network => "network",
        })
    }
}

/// Output of [`RequestHandler::load`](super::RequestHandler::load)
#[derive(Debug, Clone)]
pub struct LoadResult {
    /// `None` without an error is a handler contract violation.
    pub image: Option<SharedImage>,
    pub loaded_from: LoadedFrom,
    /// Orientation correction in degrees declared by the source container.
    pub exif_rotation: u32,
}

impl LoadResult {
    pub fn new(image: SharedImage, loaded_from: LoadedFrom) -> Self {
        Self {
            image: Some(image),
            loaded_from,
            exif_rotation: 0,
        }
    }

    pub fn empty(loaded_from: LoadedFrom) -> Self {
        Self {
            image: None,
            loaded_from,
            exif_rotation: 0,
        }
    }

    pub fn with_exif_rotation(mut self, degrees: u32) -> Self {
        self.exif_rotation = degrees;
        self
    }
}
