//! Format normalization: HEIC/HEIF → JPEG before the search.
//!
//! Browsers and the `image` crate cannot decode HEIC, which is what iPhones
//! upload by default. A file is treated as HEIC when any of these hold:
//!
//! - declared media type is `image/heic` or `image/heif`
//! - the name ends in `.heic` / `.heif` (any case)
//! - the ISO-BMFF `ftyp` box names a HEIF major brand
//!
//! Such files go through a [`HeicConverter`]; everything else passes through
//! untouched. Conversion is never attempted without an available converter.

use super::backend::BackendError;
use super::params::{OutputFormat, Quality};
use crate::naming;
use crate::types::UploadFile;

/// Major brands that mark a HEIF-family container.
const HEIF_BRANDS: &[&[u8; 4]] = &[
    b"heic", b"heix", b"hevc", b"hevx", b"heim", b"heis", b"heif",
];

/// Capability that turns HEIC/HEIF bytes into JPEG bytes.
pub trait HeicConverter: Sync {
    /// Whether conversion can run in this environment.
    fn is_available(&self) -> bool;

    /// Convert to JPEG at `quality`.
    fn convert_to_jpeg(&self, bytes: &[u8], quality: Quality) -> Result<Vec<u8>, BackendError>;
}

/// Converter for environments with no HEIC support at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHeicSupport;

impl HeicConverter for NoHeicSupport {
    fn is_available(&self) -> bool {
        false
    }

    fn convert_to_jpeg(&self, _bytes: &[u8], _quality: Quality) -> Result<Vec<u8>, BackendError> {
        Err(BackendError::Unavailable(
            "HEIC conversion is not supported in this environment".to_string(),
        ))
    }
}

/// Check the `ftyp` box at offset 4 for a HEIF major brand.
pub fn sniff_heif_brand(bytes: &[u8]) -> bool {
    if bytes.len() < 12 || &bytes[4..8] != b"ftyp" {
        return false;
    }
    let brand = &bytes[8..12];
    HEIF_BRANDS.iter().any(|b| brand == &b[..])
}

/// Whether `file` needs HEIC conversion.
pub fn is_heic(file: &UploadFile) -> bool {
    naming::is_heic_media_type(&file.media_type)
        || naming::has_heic_suffix(&file.name)
        || sniff_heif_brand(&file.bytes)
}

/// Output of [`normalize`].
#[derive(Debug, Clone)]
pub struct Normalized {
    pub file: UploadFile,
    pub converted: bool,
}

/// Convert HEIC/HEIF uploads to JPEG; pass everything else through.
pub fn normalize(
    file: UploadFile,
    converter: &impl HeicConverter,
    quality: Quality,
) -> Result<Normalized, BackendError> {
    if !is_heic(&file) {
        return Ok(Normalized {
            file,
            converted: false,
        });
    }

    if !converter.is_available() {
        return Err(BackendError::Unavailable(format!(
            "HEIC conversion for {} needs an image converter, none is available",
            file.name
        )));
    }

    tracing::debug!(name = %file.name, bytes = file.bytes.len(), "converting HEIC to JPEG");
    let jpeg = converter.convert_to_jpeg(&file.bytes, quality)?;

    Ok(Normalized {
        file: UploadFile {
            name: naming::heic_to_jpeg_name(&file.name),
            media_type: OutputFormat::Jpeg.media_type().to_string(),
            bytes: jpeg,
        },
        converted: true,
    })
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Converter that returns fixed JPEG bytes and records each call.
    pub struct FakeConverter {
        pub available: bool,
        pub output: Vec<u8>,
        pub calls: Mutex<Vec<(usize, u32)>>,
    }

    impl FakeConverter {
        pub fn returning(output: Vec<u8>) -> Self {
            Self {
                available: true,
                output,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn unavailable() -> Self {
            Self {
                available: false,
                ..Self::returning(Vec::new())
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl HeicConverter for FakeConverter {
        fn is_available(&self) -> bool {
            self.available
        }

        fn convert_to_jpeg(&self, bytes: &[u8], quality: Quality) -> Result<Vec<u8>, BackendError> {
            self.calls
                .lock()
                .unwrap()
                .push((bytes.len(), quality.value()));
            Ok(self.output.clone())
        }
    }

    fn heif_header(brand: &[u8; 4]) -> Vec<u8> {
        let mut bytes = vec![0, 0, 0, 24];
        bytes.extend_from_slice(b"ftyp");
        bytes.extend_from_slice(brand);
        bytes.extend_from_slice(&[0; 12]);
        bytes
    }

    #[test]
    fn detects_by_media_type_suffix_or_brand() {
        assert!(is_heic(&UploadFile::new("a.bin", "image/heic", vec![])));
        assert!(is_heic(&UploadFile::new("a.HEIF", "", vec![])));
        assert!(is_heic(&UploadFile::new(
            "upload",
            "application/octet-stream",
            heif_header(b"heic")
        )));
        assert!(!is_heic(&UploadFile::new("a.jpg", "image/jpeg", vec![0xFF, 0xD8])));
    }

    #[test]
    fn avif_brand_is_not_heic() {
        assert!(!sniff_heif_brand(&heif_header(b"avif")));
        assert!(!sniff_heif_brand(b"short"));
    }

    #[test]
    fn non_heic_passes_through_without_converter_call() {
        let converter = FakeConverter::returning(vec![1, 2, 3]);
        let file = UploadFile::new("a.png", "image/png", vec![9; 4]);

        let out = normalize(file.clone(), &converter, Quality::new(90)).unwrap();
        assert!(!out.converted);
        assert_eq!(out.file, file);
        assert_eq!(converter.call_count(), 0);
    }

    #[test]
    fn heic_is_converted_and_renamed() {
        let converter = FakeConverter::returning(vec![0xFF, 0xD8, 0xFF]);
        let file = UploadFile::new("photo.heic", "image/heic", vec![7; 10]);

        let out = normalize(file, &converter, Quality::new(90)).unwrap();
        assert!(out.converted);
        assert_eq!(out.file.name, "photo.jpg");
        assert_eq!(out.file.media_type, "image/jpeg");
        assert_eq!(out.file.bytes, vec![0xFF, 0xD8, 0xFF]);
        assert_eq!(*converter.calls.lock().unwrap(), vec![(10, 90)]);
    }

    #[test]
    fn heic_without_converter_is_unavailable() {
        let file = UploadFile::new("photo.heic", "image/heic", vec![7; 10]);
        let result = normalize(file.clone(), &FakeConverter::unavailable(), Quality::new(90));
        assert!(matches!(result, Err(BackendError::Unavailable(_))));

        let result = normalize(file, &NoHeicSupport, Quality::new(90));
        assert!(matches!(result, Err(BackendError::Unavailable(_))));
    }
}
