//! End-to-end scenarios through the public API with the real render surface.

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use lostfound_compress::compress::{CompressOptions, CompressionSettings};
use lostfound_compress::imaging::{
    BackendError, Dimensions, EncodeParams, HeicConverter, NoHeicSupport, OutputFormat, Quality,
    RenderSurface, RustSurface, SourceImage, target_dimensions,
};
use lostfound_compress::types::UploadFile;
use lostfound_compress::{CompressError, compress_image, compress_with};
use proptest::prelude::*;
use std::io::Cursor;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

const BUDGET: u64 = 943_718;

fn encode(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, 96])
    }))
}

fn noise(width: u32, height: u32) -> DynamicImage {
    let mut state = 0x9E37_79B9u32;
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |_, _| {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        Rgb([state as u8, (state >> 8) as u8, (state >> 16) as u8])
    }))
}

/// Insert an EXIF APP1 segment with only an Orientation tag after SOI.
fn with_exif_orientation(jpeg: &[u8], orientation: u16) -> Vec<u8> {
    let mut payload = b"Exif\0\0MM\0\x2A\0\0\0\x08".to_vec();
    payload.extend_from_slice(&[0x00, 0x01, 0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01]);
    payload.extend_from_slice(&orientation.to_be_bytes());
    payload.extend_from_slice(&[0, 0, 0, 0, 0, 0]);

    let mut out = jpeg[..2].to_vec();
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(&payload);
    out.extend_from_slice(&jpeg[2..]);
    out
}

/// Real surface that counts encodes.
#[derive(Default)]
struct CountingSurface {
    inner: RustSurface,
    encodes: AtomicUsize,
}

impl RenderSurface for CountingSurface {
    type Image = SourceImage;

    fn load(&self, bytes: &[u8], media_type: &str) -> Result<SourceImage, BackendError> {
        self.inner.load(bytes, media_type)
    }

    fn natural_dimensions(&self, image: &SourceImage) -> Dimensions {
        self.inner.natural_dimensions(image)
    }

    fn render_and_encode(
        &self,
        image: &SourceImage,
        params: &EncodeParams,
    ) -> Result<Vec<u8>, BackendError> {
        self.encodes.fetch_add(1, Ordering::SeqCst);
        self.inner.render_and_encode(image, params)
    }
}

/// Stands in for ImageMagick: hands back a prepared JPEG.
struct StubConverter {
    jpeg: Vec<u8>,
    calls: Mutex<Vec<u32>>,
}

impl HeicConverter for StubConverter {
    fn is_available(&self) -> bool {
        true
    }

    fn convert_to_jpeg(&self, _bytes: &[u8], quality: Quality) -> Result<Vec<u8>, BackendError> {
        self.calls.lock().unwrap().push(quality.value());
        Ok(self.jpeg.clone())
    }
}

#[test]
fn large_solid_photo_fits_as_webp() {
    let solid = DynamicImage::ImageRgb8(RgbImage::from_pixel(4000, 3000, Rgb([40, 90, 160])));
    let file = UploadFile::new("solid.bmp", "image/bmp", encode(&solid, ImageFormat::Bmp));

    let result = compress_with(
        &RustSurface::new(),
        &NoHeicSupport,
        file,
        &CompressOptions::default(),
    )
    .unwrap();

    assert_eq!(result.file.media_type, "image/webp");
    assert_eq!(result.file.name, "solid.webp");
    assert!(result.size() <= BUDGET);
    assert_eq!(result.dimensions.as_tuple(), (1024, 768));
    assert_eq!(result.attempts, 1);

    let decoded = image::load_from_memory(&result.file.bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (1024, 768));
}

#[test]
fn small_image_takes_one_encode() {
    let surface = CountingSurface::default();
    let file = UploadFile::new(
        "keys.png",
        "image/png",
        encode(&gradient(100, 100), ImageFormat::Png),
    );

    let result = compress_with(&surface, &NoHeicSupport, file, &CompressOptions::default())
        .unwrap();

    assert_eq!(surface.encodes.load(Ordering::SeqCst), 1);
    assert_eq!(result.trial.max_dimension, 1024);
    assert_eq!(result.trial.quality.value(), 80);
    assert_eq!(result.dimensions.as_tuple(), (100, 100));
}

#[test]
fn heic_upload_is_converted_then_compressed() {
    let converter = StubConverter {
        jpeg: encode(&gradient(1600, 1200), ImageFormat::Jpeg),
        calls: Mutex::new(Vec::new()),
    };
    let file = UploadFile::new("photo.heic", "image/heic", b"\0\0\0\x18ftypheic".to_vec());

    let result = compress_with(
        &RustSurface::new(),
        &converter,
        file,
        &CompressOptions::default(),
    )
    .unwrap();

    assert_eq!(*converter.calls.lock().unwrap(), vec![90]);
    assert_eq!(result.file.name, "photo.webp");
    assert_eq!(result.file.media_type, "image/webp");
    assert!(result.converted_from_heic);
    assert_eq!(result.dimensions.as_tuple(), (1024, 768));
}

#[test]
fn heic_detected_by_brand_without_suffix() {
    let converter = StubConverter {
        jpeg: encode(&gradient(64, 48), ImageFormat::Jpeg),
        calls: Mutex::new(Vec::new()),
    };
    let file = UploadFile::new(
        "upload",
        "application/octet-stream",
        b"\0\0\0\x18ftypheix\0\0\0\0".to_vec(),
    );

    let result = compress_with(
        &RustSurface::new(),
        &converter,
        file,
        &CompressOptions::default(),
    )
    .unwrap();

    assert_eq!(converter.calls.lock().unwrap().len(), 1);
    assert_eq!(result.file.name, "upload.webp");
}

#[test]
fn noise_that_cannot_fit_exhausts_search() {
    let file = UploadFile::new(
        "static.png",
        "image/png",
        encode(&noise(1200, 900), ImageFormat::Png),
    );
    let options = CompressOptions {
        settings: CompressionSettings {
            max_bytes: 5_000,
            ..CompressionSettings::default()
        },
        ..CompressOptions::default()
    };

    let err = compress_with(&RustSurface::new(), &NoHeicSupport, file, &options).unwrap_err();

    match err {
        CompressError::CompressionBudgetExceeded {
            name,
            max_bytes,
            trials,
            smallest,
        } => {
            assert_eq!(name, "static.png");
            assert_eq!(max_bytes, 5_000);
            assert_eq!(trials, 20);
            assert!(smallest > 5_000);
        }
        other => panic!("expected CompressionBudgetExceeded, got {other:?}"),
    }
}

fn encoded_size(surface: &RustSurface, image: &SourceImage, max: u32, quality: u32) -> usize {
    let natural = surface.natural_dimensions(image).as_tuple();
    let (width, height) = target_dimensions(natural, max);
    surface
        .render_and_encode(
            image,
            &EncodeParams {
                width,
                height,
                format: OutputFormat::WebP,
                quality: Quality::new(quality),
            },
        )
        .unwrap()
        .len()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    /// At a fixed quality, a smaller max-dimension never yields more bytes.
    #[test]
    fn size_shrinks_with_dimension_at_fixed_quality(
        width in 1100u32..2400,
        height in 800u32..2400,
        quality in 40u32..=80,
    ) {
        let surface = RustSurface::new();
        let image = surface
            .load(&encode(&gradient(width, height), ImageFormat::Png), "image/png")
            .unwrap();

        let sizes: Vec<usize> = [1024u32, 896, 768, 640]
            .iter()
            .map(|&max| encoded_size(&surface, &image, max, quality))
            .collect();

        for pair in sizes.windows(2) {
            prop_assert!(pair[1] <= pair[0], "sizes not monotonic: {:?}", sizes);
        }
    }
}

#[test]
fn rotated_phone_jpeg_comes_out_upright() {
    let jpeg = encode(&gradient(200, 100), ImageFormat::Jpeg);
    let file = UploadFile::new("portrait.jpg", "image/jpeg", with_exif_orientation(&jpeg, 6));

    let result = compress_with(
        &RustSurface::new(),
        &NoHeicSupport,
        file,
        &CompressOptions::default(),
    )
    .unwrap();

    assert_eq!(result.dimensions.as_tuple(), (100, 200));
    let decoded = image::load_from_memory(&result.file.bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (100, 200));
}

#[test]
fn default_entry_point_compresses_png() {
    let file = UploadFile::new(
        "umbrella.png",
        "image/png",
        encode(&gradient(1500, 2000), ImageFormat::Png),
    );
    let result = compress_image(file).unwrap();
    assert_eq!(result.file.name, "umbrella.webp");
    assert_eq!(result.dimensions.as_tuple(), (768, 1024));
    assert!(result.size() <= BUDGET);
}

#[test]
fn corrupt_upload_is_invalid_image() {
    let file = UploadFile::new("wallet.jpg", "image/jpeg", vec![0xFF, 0xD8, 0x00, 0x01]);
    let err = compress_image(file).unwrap_err();
    assert!(matches!(err, CompressError::InvalidImage(_)));
}
