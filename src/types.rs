//! Shared types passed between the normalizer, the search and the CLI.

use crate::imaging::{Dimensions, Trial};
use crate::naming;
use serde::Serialize;
use std::path::Path;

/// An in-memory file as handed over by an upload form: name, declared media
/// type and raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, deriving the media type from its extension.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let media_type = naming::media_type_for_name(&name).to_string();
        Ok(Self {
            name,
            media_type,
            bytes,
        })
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// The first encoding that met the byte budget.
#[derive(Debug, Clone)]
pub struct CompressedFile {
    pub file: UploadFile,
    /// Pixel size of the encoded output.
    pub dimensions: Dimensions,
    /// The trial that produced it.
    pub trial: Trial,
    /// Render + encode calls made, including the successful one.
    pub attempts: usize,
    /// Size of the file handed to the compressor.
    pub original_size: u64,
    /// Whether the input went through HEIC/HEIF conversion.
    pub converted_from_heic: bool,
}

impl CompressedFile {
    pub fn size(&self) -> u64 {
        self.file.size()
    }

    pub fn summary(&self) -> CompressionSummary {
        CompressionSummary {
            name: self.file.name.clone(),
            media_type: self.file.media_type.clone(),
            original_bytes: self.original_size,
            bytes: self.size(),
            width: self.dimensions.width,
            height: self.dimensions.height,
            max_dimension: self.trial.max_dimension,
            quality: self.trial.quality.value(),
            attempts: self.attempts,
            converted_from_heic: self.converted_from_heic,
        }
    }
}

/// Serializable report line for one compressed file.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CompressionSummary {
    pub name: String,
    pub media_type: String,
    pub original_bytes: u64,
    pub bytes: u64,
    pub width: u32,
    pub height: u32,
    pub max_dimension: u32,
    pub quality: u32,
    pub attempts: usize,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub converted_from_heic: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::Quality;

    #[test]
    fn from_path_reads_bytes_and_guesses_type() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("IMG_0042.HEIC");
        std::fs::write(&path, b"abc").unwrap();

        let file = UploadFile::from_path(&path).unwrap();
        assert_eq!(file.name, "IMG_0042.HEIC");
        assert_eq!(file.media_type, "image/heic");
        assert_eq!(file.size(), 3);
    }

    #[test]
    fn from_path_missing_file_errors() {
        assert!(UploadFile::from_path(Path::new("/nonexistent/a.jpg")).is_err());
    }

    #[test]
    fn summary_serializes_without_heic_flag_when_false() {
        let compressed = CompressedFile {
            file: UploadFile::new("a.webp", "image/webp", vec![0; 10]),
            dimensions: Dimensions {
                width: 100,
                height: 50,
            },
            trial: Trial {
                max_dimension: 1024,
                quality: Quality::new(80),
            },
            attempts: 1,
            original_size: 1000,
            converted_from_heic: false,
        };
        let json = serde_json::to_value(compressed.summary()).unwrap();
        assert_eq!(json["bytes"], 10);
        assert_eq!(json["quality"], 80);
        assert!(json.get("converted_from_heic").is_none());
    }
}
