//! Synthetic image fixtures for unit tests.
//!
//! Everything is generated in memory so tests never depend on checked-in
//! binaries.
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let png = gradient_png(400, 300);
//! let file = UploadFile::new("photo.png", "image/png", png);
//! ```

use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::io::Cursor;

/// Encode `img` in `format` and return the bytes.
pub fn encode(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

/// Smooth RGB gradient, compresses like a soft photo.
pub fn gradient_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    }))
}

pub fn gradient_png(width: u32, height: u32) -> Vec<u8> {
    encode(&gradient_image(width, height), ImageFormat::Png)
}

/// Half-transparent gradient.
pub fn rgba_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 64, 128])
    });
    encode(&DynamicImage::ImageRgba8(img), ImageFormat::Png)
}

/// Deterministic RGB noise (xorshift), the worst case for any encoder.
pub fn noise_image(width: u32, height: u32, seed: u32) -> DynamicImage {
    let mut state = seed.max(1);
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        state
    };
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |_, _| {
        let v = next();
        Rgb([v as u8, (v >> 8) as u8, (v >> 16) as u8])
    }))
}

/// Splice a minimal EXIF APP1 segment carrying `orientation` after the SOI
/// marker of a baseline JPEG.
pub fn with_exif_orientation(jpeg: &[u8], orientation: u16) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(b"Exif\0\0");
    // Big-endian TIFF header, first IFD at offset 8
    payload.extend_from_slice(b"MM\0\x2A\0\0\0\x08");
    payload.extend_from_slice(&1u16.to_be_bytes());
    // Tag 0x0112 Orientation, SHORT, count 1, value left-aligned
    payload.extend_from_slice(&[0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01]);
    payload.extend_from_slice(&orientation.to_be_bytes());
    payload.extend_from_slice(&[0, 0]);
    // No next IFD
    payload.extend_from_slice(&[0, 0, 0, 0]);

    let mut out = Vec::with_capacity(jpeg.len() + payload.len() + 4);
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(&payload);
    out.extend_from_slice(&jpeg[2..]);
    out
}
