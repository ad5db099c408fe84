//! Resampling a source through a plan into a freshly allocated image

use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};

use super::TransformError;
use super::plan::TransformPlan;

const CHANNELS: usize = 4;

/// Render `source` through `plan` with bilinear filtering.
///
/// The output covers the bounding box of the source crop window mapped
/// through the plan's matrix; pixels outside the mapped window are
/// transparent. The output buffer may not exceed `max_alloc` bytes.
pub(crate) fn render(
    source: &DynamicImage,
    plan: &TransformPlan,
    max_alloc: Option<u64>,
) -> Result<DynamicImage, TransformError> {
    let crop = plan.source_crop();
    if crop.width == 0 || crop.height == 0 {
        return Err(TransformError::Degenerate);
    }
    let affine = plan.matrix.affine();
    let inverse = affine.invert().ok_or(TransformError::Degenerate)?;

    let x0 = f64::from(crop.x);
    let y0 = f64::from(crop.y);
    let x1 = x0 + f64::from(crop.width);
    let y1 = y0 + f64::from(crop.height);

    let corners = [(x0, y0), (x1, y0), (x0, y1), (x1, y1)].map(|(x, y)| affine.apply(x, y));
    let min_x = corners.iter().map(|c| c.0).fold(f64::INFINITY, f64::min);
    let max_x = corners.iter().map(|c| c.0).fold(f64::NEG_INFINITY, f64::max);
    let min_y = corners.iter().map(|c| c.1).fold(f64::INFINITY, f64::min);
    let max_y = corners.iter().map(|c| c.1).fold(f64::NEG_INFINITY, f64::max);

    let width = ((max_x - min_x).round() as u32).max(1);
    let height = ((max_y - min_y).round() as u32).max(1);
    let mut output = allocate(width, height, max_alloc)?;

    let window = Window {
        x0: crop.x,
        y0: crop.y,
        x1: crop.x + crop.width - 1,
        y1: crop.y + crop.height - 1,
    };

    for (u, v, pixel) in output.enumerate_pixels_mut() {
        let (sx, sy) = inverse.apply(
            f64::from(u) + 0.5 + min_x,
            f64::from(v) + 0.5 + min_y,
        );
        if sx < x0 || sx >= x1 || sy < y0 || sy >= y1 {
            continue;
        }
        *pixel = sample(source, &window, sx - 0.5, sy - 0.5);
    }

    Ok(match_color(output, source))
}

/// Zeroed RGBA buffer, reporting allocation failure instead of aborting.
fn allocate(width: u32, height: u32, max_alloc: Option<u64>) -> Result<RgbaImage, TransformError> {
    let oom = || TransformError::OutOfMemory { width, height };

    let len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(CHANNELS))
        .ok_or_else(oom)?;
    if max_alloc.is_some_and(|max| len as u64 > max) {
        return Err(oom());
    }

    let mut buffer: Vec<u8> = Vec::new();
    buffer.try_reserve_exact(len).map_err(|_| oom())?;
    buffer.resize(len, 0);

    RgbaImage::from_raw(width, height, buffer).ok_or_else(oom)
}

/// Inclusive pixel bounds sampling is clamped to.
struct Window {
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
}

fn sample(source: &DynamicImage, window: &Window, x: f64, y: f64) -> Rgba<u8> {
    let fx = x.floor();
    let fy = y.floor();
    let wx = x - fx;
    let wy = y - fy;

    let clamp_x = |v: f64| (v.max(f64::from(window.x0)) as u32).min(window.x1);
    let clamp_y = |v: f64| (v.max(f64::from(window.y0)) as u32).min(window.y1);
    let (left, right) = (clamp_x(fx), clamp_x(fx + 1.0));
    let (top, bottom) = (clamp_y(fy), clamp_y(fy + 1.0));

    let tl = source.get_pixel(left, top).0;
    let tr = source.get_pixel(right, top).0;
    let bl = source.get_pixel(left, bottom).0;
    let br = source.get_pixel(right, bottom).0;

    let mut out = [0u8; CHANNELS];
    for (i, channel) in out.iter_mut().enumerate() {
        let upper = f64::from(tl[i]) * (1.0 - wx) + f64::from(tr[i]) * wx;
        let lower = f64::from(bl[i]) * (1.0 - wx) + f64::from(br[i]) * wx;
        *channel = (upper * (1.0 - wy) + lower * wy).round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}

/// Keep the source's 8-bit colour layout; wider formats come back as RGBA8.
fn match_color(output: RgbaImage, like: &DynamicImage) -> DynamicImage {
    let output = DynamicImage::ImageRgba8(output);
    match like {
        DynamicImage::ImageRgb8(_) => DynamicImage::ImageRgb8(output.into_rgb8()),
        DynamicImage::ImageLuma8(_) => DynamicImage::ImageLuma8(output.into_luma8()),
        DynamicImage::ImageLumaA8(_) => DynamicImage::ImageLumaA8(output.into_luma_alpha8()),
        _ => output,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestBuilder;
    use crate::transform::plan_transform;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    /// Blue image with a red top-left pixel
    fn marked(width: u32, height: u32) -> DynamicImage {
        let mut image = RgbaImage::from_pixel(width, height, BLUE);
        image.put_pixel(0, 0, RED);
        DynamicImage::ImageRgba8(image)
    }

    fn base() -> RequestBuilder {
        RequestBuilder::parse_uri("http://example.com/1.png").unwrap()
    }

    #[test]
    fn test_quarter_turn_moves_corner() {
        let source = marked(6, 4);
        let request = base().build().unwrap();
        let plan = plan_transform(6, 4, &request, 90);

        let output = render(&source, &plan, None).unwrap().into_rgba8();
        assert_eq!(output.dimensions(), (4, 6));
        assert_eq!(*output.get_pixel(3, 0), RED);
        assert_eq!(*output.get_pixel(0, 0), BLUE);
    }

    #[test]
    fn test_half_turn() {
        let source = marked(5, 3);
        let request = base().rotate(180.0).build().unwrap();
        let plan = plan_transform(5, 3, &request, 0);

        let output = render(&source, &plan, None).unwrap().into_rgba8();
        assert_eq!(output.dimensions(), (5, 3));
        assert_eq!(*output.get_pixel(4, 2), RED);
    }

    #[test]
    fn test_center_crop_output_size() {
        let source = marked(10, 20);
        let request = base().resize(40, 40).unwrap().center_crop().unwrap().build().unwrap();
        let plan = plan_transform(10, 20, &request, 0);

        let output = render(&source, &plan, None).unwrap();
        assert_eq!((output.width(), output.height()), (40, 40));
        // The marked corner lies outside the crop window
        assert_eq!(output.into_rgba8().get_pixel(0, 0), &BLUE);
    }

    #[test]
    fn test_plain_resize_output_size() {
        let source = marked(10, 10);
        let request = base().resize(20, 15).unwrap().build().unwrap();
        let output = render(&source, &plan_transform(10, 10, &request, 0), None).unwrap();
        assert_eq!((output.width(), output.height()), (20, 15));
    }

    #[test]
    fn test_keeps_rgb_layout() {
        let source = DynamicImage::ImageRgb8(marked(4, 4).into_rgb8());
        let request = base().resize(2, 2).unwrap().build().unwrap();
        let output = render(&source, &plan_transform(4, 4, &request, 0), None).unwrap();
        assert!(matches!(output, DynamicImage::ImageRgb8(_)));
    }

    #[test]
    fn test_oversized_allocation_fails_cleanly() {
        let err = allocate(u32::MAX, u32::MAX, None).unwrap_err();
        assert!(err.is_resource_exhaustion());
    }

    #[test]
    fn test_allocation_over_budget_fails() {
        assert!(allocate(16, 16, Some(16 * 16 * 4)).is_ok());
        let err = allocate(16, 17, Some(16 * 16 * 4)).unwrap_err();
        assert_eq!(err, TransformError::OutOfMemory { width: 16, height: 17 });
    }

    #[test]
    fn test_empty_source_is_degenerate() {
        let source = DynamicImage::new_rgba8(5, 0);
        let request = base().build().unwrap();
        let plan = plan_transform(5, 0, &request, 90);
        assert_eq!(render(&source, &plan, None).unwrap_err(), TransformError::Degenerate);
    }
}
