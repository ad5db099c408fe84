//! Geometry planning: crop window and matrix for one request

use super::matrix::Matrix;
use crate::request::{Request, ScaleMode};

/// Axis-aligned pixel rectangle within an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropWindow {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropWindow {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    pub fn covers(&self, width: u32, height: u32) -> bool {
        *self == Self::full(width, height)
    }
}

/// Everything needed to render one request from one decoded source.
///
/// The crop window and scale are computed against the source as displayed,
/// that is after the orientation correction, so a portrait photo stored
/// sideways is cropped as a portrait.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformPlan {
    pub source_width: u32,
    pub source_height: u32,
    /// Orientation correction in degrees, normalised to `0..360`.
    pub exif_rotation: u32,
    /// Crop window in oriented coordinates.
    pub crop: CropWindow,
    /// `requested rotation * scale * orientation correction`
    pub matrix: Matrix,
}

impl TransformPlan {
    /// Source dimensions after the orientation correction.
    pub fn oriented_size(&self) -> (u32, u32) {
        oriented_size(self.source_width, self.source_height, self.exif_rotation)
    }

    /// Nothing to do: the source can be handed back untouched.
    pub fn is_identity(&self) -> bool {
        let (width, height) = self.oriented_size();
        self.matrix.is_identity() && self.crop.covers(width, height)
    }

    /// The crop window expressed in the coordinates of the stored source.
    pub fn source_crop(&self) -> CropWindow {
        let CropWindow {
            x,
            y,
            width,
            height,
        } = self.crop;
        let (w, h) = (self.source_width, self.source_height);

        match self.exif_rotation {
            90 => CropWindow {
                x: y,
                y: h - x - width,
                width: height,
                height: width,
            },
            180 => CropWindow {
                x: w - x - width,
                y: h - y - height,
                width,
                height,
            },
            270 => CropWindow {
                x: w - y - height,
                y: x,
                width: height,
                height: width,
            },
            _ => self.crop,
        }
    }
}

fn oriented_size(width: u32, height: u32, exif_rotation: u32) -> (u32, u32) {
    match exif_rotation {
        90 | 270 => (height, width),
        _ => (width, height),
    }
}

/// Compute the crop window and matrix for `request` applied to a
/// `width` x `height` source carrying an `exif_rotation` hint.
pub fn plan_transform(width: u32, height: u32, request: &Request, exif_rotation: u32) -> TransformPlan {
    let exif_rotation = exif_rotation % 360;
    let (in_w, in_h) = oriented_size(width, height, exif_rotation);
    let mut crop = CropWindow::full(in_w, in_h);
    let mut matrix = Matrix::identity();

    if request.needs_matrix_transform() && in_w > 0 && in_h > 0 {
        let degrees = request.rotation_degrees();
        if degrees != 0.0 {
            matrix.set_rotate(degrees, request.rotation_pivot());
        }

        if request.has_size() {
            let target_w = request.target_width() as f32;
            let target_h = request.target_height() as f32;
            let width_ratio = target_w / in_w as f32;
            let height_ratio = target_h / in_h as f32;

            match request.scale_mode() {
                Some(ScaleMode::CenterCrop) => {
                    let scale = width_ratio.max(height_ratio);
                    let crop_w = ((target_w / scale).round() as u32).clamp(1, in_w);
                    let crop_h = ((target_h / scale).round() as u32).clamp(1, in_h);
                    crop = CropWindow {
                        x: (in_w - crop_w) / 2,
                        y: (in_h - crop_h) / 2,
                        width: crop_w,
                        height: crop_h,
                    };
                    matrix.pre_scale(scale, scale);
                }
                Some(ScaleMode::CenterInside) => {
                    let scale = width_ratio.min(height_ratio);
                    matrix.pre_scale(scale, scale);
                }
                Some(ScaleMode::ResizeByMaxSide) => {
                    let scale = if in_w >= in_h {
                        width_ratio
                    } else {
                        height_ratio
                    };
                    matrix.pre_scale(scale, scale);
                }
                None => {
                    let fits = request.target_width() >= in_w && request.target_height() >= in_h;
                    let same = request.target_width() == in_w && request.target_height() == in_h;
                    if !same && !(request.resize_only_if_bigger() && fits) {
                        matrix.pre_scale(width_ratio, height_ratio);
                    }
                }
            }
        }
    }

    if exif_rotation != 0 {
        matrix.pre_rotate(exif_rotation as f32);
    }

    TransformPlan {
        source_width: width,
        source_height: height,
        exif_rotation,
        crop,
        matrix,
    }
}
