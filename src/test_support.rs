//! Fixtures shared by unit tests

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::Arc;

use crate::bitmap::SharedImage;

pub(crate) fn solid(width: u32, height: u32) -> SharedImage {
    Arc::new(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
        width,
        height,
        Rgba([200, 10, 10, 255]),
    )))
}

pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut out = Vec::new();
    solid(width, height)
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .unwrap();
    out
}
