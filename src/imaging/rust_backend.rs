//! Pure Rust render surface.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP, BMP, GIF) | `image` crate, format sniffed from bytes |
//! | Resample | `image::DynamicImage::resize_exact` with `Triangle` (bilinear) filter |
//! | Encode → WebP (lossy) | `webp::Encoder` (libwebp) |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |
//!
//! HEIC/HEIF is not decoded here; the [normalizer](super::normalize) converts
//! it to JPEG first.

use super::backend::{BackendError, Dimensions, RenderSurface};
use super::params::{EncodeParams, OutputFormat};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader};
use std::cell::RefCell;
use std::io::Cursor;
use std::sync::LazyLock;

/// Extensions with decoders compiled in, paired with their format.
const PHOTO_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
    ("bmp", ImageFormat::Bmp),
    ("gif", ImageFormat::Gif),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    let mut exts: Vec<&'static str> = PHOTO_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect();
    // Converted to JPEG by the normalizer before decoding
    exts.extend(["heic", "heif"]);
    exts
});

/// Returns the file extensions the compressor accepts as input.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// A decoded source image plus the last surface rendered from it.
///
/// Quality trials at one size reuse the rendered surface instead of
/// resampling again. Everything is freed when the handle is dropped.
pub struct SourceImage {
    pixels: DynamicImage,
    rendered: RefCell<Option<(Dimensions, DynamicImage)>>,
}

impl SourceImage {
    fn new(decoded: DynamicImage) -> Self {
        // libwebp only takes 8-bit RGB/RGBA; convert once up front.
        let pixels = if decoded.color().has_alpha() {
            DynamicImage::ImageRgba8(decoded.to_rgba8())
        } else {
            DynamicImage::ImageRgb8(decoded.to_rgb8())
        };
        Self {
            pixels,
            rendered: RefCell::new(None),
        }
    }

    fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.pixels.width(),
            height: self.pixels.height(),
        }
    }

    /// Resample to `size`, reusing the previous surface when the size repeats.
    fn render(&self, size: Dimensions) -> DynamicImage {
        if size == self.dimensions() {
            return self.pixels.clone();
        }
        let mut slot = self.rendered.borrow_mut();
        match slot.as_ref() {
            Some((cached, surface)) if *cached == size => surface.clone(),
            _ => {
                let surface = self
                    .pixels
                    .resize_exact(size.width, size.height, FilterType::Triangle);
                *slot = Some((size, surface.clone()));
                surface
            }
        }
    }
}

/// Render surface backed by the `image` and `webp` crates.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustSurface;

impl RustSurface {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustSurface {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode bytes, sniffing the format and falling back to the declared type.
///
/// EXIF orientation is applied, so pixels and natural size are upright.
fn decode(bytes: &[u8], media_type: &str) -> Result<DynamicImage, BackendError> {
    let mut reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    if reader.format().is_none() {
        if let Some(format) = ImageFormat::from_mime_type(media_type) {
            reader.set_format(format);
        }
    }
    let decode_err = |e: image::ImageError| BackendError::Decode(format!("{media_type}: {e}"));
    let mut decoder = reader.into_decoder().map_err(decode_err)?;
    // Unreadable EXIF is not worth rejecting the photo over
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let mut image = DynamicImage::from_decoder(decoder).map_err(decode_err)?;
    image.apply_orientation(orientation);
    Ok(image)
}

fn encode_webp(img: &DynamicImage, quality: u32) -> Result<Vec<u8>, BackendError> {
    let encoder = webp::Encoder::from_image(img)
        .map_err(|e| BackendError::Encode(format!("WebP encoder rejected image: {e}")))?;
    Ok(encoder.encode(quality as f32).to_vec())
}

fn encode_jpeg(img: &DynamicImage, quality: u32) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality as u8);
    // JPEG has no alpha channel
    DynamicImage::ImageRgb8(img.to_rgb8())
        .write_with_encoder(encoder)
        .map_err(|e| BackendError::Encode(format!("JPEG encode failed: {e}")))?;
    Ok(buf)
}

impl RenderSurface for RustSurface {
    type Image = SourceImage;

    fn load(&self, bytes: &[u8], media_type: &str) -> Result<SourceImage, BackendError> {
        decode(bytes, media_type).map(SourceImage::new)
    }

    fn natural_dimensions(&self, image: &SourceImage) -> Dimensions {
        image.dimensions()
    }

    fn render_and_encode(
        &self,
        image: &SourceImage,
        params: &EncodeParams,
    ) -> Result<Vec<u8>, BackendError> {
        let surface = image.render(Dimensions {
            width: params.width,
            height: params.height,
        });
        match params.format {
            OutputFormat::WebP => encode_webp(&surface, params.quality.value()),
            OutputFormat::Jpeg => encode_jpeg(&surface, params.quality.value()),
        }
    }
}
