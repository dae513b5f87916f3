//! Batch compression of files on disk.
//!
//! The CLI front end for moderators bulk-preparing photos. Each input is an
//! independent [`compress_with`] call; files run in parallel on the rayon pool
//! but every search stays sequential.
//!
//! ## Inputs
//!
//! Paths may be files or directories. Directories are walked recursively and
//! only files with a [supported extension](crate::imaging::supported_input_extensions)
//! are picked up; explicitly named files are always attempted.
//!
//! ## Output Structure
//!
//! ```text
//! compressed/
//! ├── IMG_0042.webp      # from IMG_0042.HEIC
//! ├── wallet.webp        # from found/wallet.png
//! └── wallet-2.webp      # from lost/wallet.jpg (name collision)
//! ```

use crate::compress::{
    CancelToken, CompressEvent, CompressOptions, CompressionSettings, compress_with,
};
use crate::imaging::{HeicConverter, RenderSurface, supported_input_extensions};
use crate::naming;
use crate::types::{CompressionSummary, UploadFile};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::Duration;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Input not found: {0}")]
    NotFound(PathBuf),
}

/// Batch-wide settings.
#[derive(Debug, Clone, Default)]
pub struct BatchConfig {
    pub settings: CompressionSettings,
    /// Per-file deadline.
    pub timeout: Option<Duration>,
}

/// Result for one input file.
#[derive(Debug, Clone, Serialize)]
pub struct BatchEntry {
    pub source: String,
    #[serde(flatten)]
    pub status: EntryStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntryStatus {
    Compressed {
        output: String,
        #[serde(flatten)]
        summary: CompressionSummary,
    },
    Failed {
        error: String,
    },
}

/// Results in input order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub entries: Vec<BatchEntry>,
}

impl BatchReport {
    pub fn failures(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.status, EntryStatus::Failed { .. }))
            .count()
    }

    pub fn compressed(&self) -> usize {
        self.entries.len() - self.failures()
    }
}

fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            supported_input_extensions()
                .iter()
                .any(|s| ext.eq_ignore_ascii_case(s))
        })
}

/// Expand files and directories into a list of input files.
///
/// Directory contents are sorted by path; explicit files keep their position.
pub fn collect_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>, BatchError> {
    let mut inputs = Vec::new();
    for path in paths {
        if path.is_file() {
            inputs.push(path.clone());
        } else if path.is_dir() {
            let mut found = Vec::new();
            for entry in WalkDir::new(path).follow_links(true) {
                let entry = entry?;
                if entry.file_type().is_file() && has_supported_extension(entry.path()) {
                    found.push(entry.into_path());
                }
            }
            found.sort();
            inputs.extend(found);
        } else {
            return Err(BatchError::NotFound(path.clone()));
        }
    }
    Ok(inputs)
}

/// Output file names for `inputs`, with `ext` and collisions suffixed `-2`, `-3`, ...
pub fn plan_output_names(inputs: &[PathBuf], ext: &str) -> Vec<String> {
    let mut taken = HashSet::new();
    inputs
        .iter()
        .map(|path| {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "image".to_string());
            let base = naming::replace_extension(&file_name, ext);
            let mut candidate = base.clone();
            let mut n = 2;
            while !taken.insert(candidate.to_ascii_lowercase()) {
                candidate = naming::replace_extension(
                    &format!("{}-{n}", base.trim_end_matches(&format!(".{ext}"))),
                    ext,
                );
                n += 1;
            }
            candidate
        })
        .collect()
}

/// Compress every input into `output_dir`.
///
/// Failures are recorded per file and never stop the batch.
pub fn compress_files<S: RenderSurface>(
    surface: &S,
    converter: &impl HeicConverter,
    inputs: &[PathBuf],
    output_dir: &Path,
    config: &BatchConfig,
    events: Option<Sender<CompressEvent>>,
) -> Result<BatchReport, BatchError> {
    std::fs::create_dir_all(output_dir)?;
    let names = plan_output_names(inputs, config.settings.format.extension());

    let entries = inputs
        .par_iter()
        .zip(names.par_iter())
        .map(|(source, name)| {
            let options = CompressOptions {
                settings: config.settings,
                cancel: config
                    .timeout
                    .map(CancelToken::with_timeout)
                    .unwrap_or_default(),
                events: events.clone(),
            };
            let status = compress_one(surface, converter, source, &output_dir.join(name), &options);
            if let EntryStatus::Failed { error } = &status {
                tracing::warn!(source = %source.display(), %error, "compression failed");
            }
            BatchEntry {
                source: source.display().to_string(),
                status,
            }
        })
        .collect();

    Ok(BatchReport { entries })
}

fn compress_one<S: RenderSurface>(
    surface: &S,
    converter: &impl HeicConverter,
    source: &Path,
    output: &Path,
    options: &CompressOptions,
) -> EntryStatus {
    let result = UploadFile::from_path(source)
        .map_err(|e| e.to_string())
        .and_then(|file| {
            compress_with(surface, converter, file, options).map_err(|e| e.to_string())
        })
        .and_then(|compressed| {
            std::fs::write(output, &compressed.file.bytes)
                .map(|_| compressed)
                .map_err(|e| format!("writing {}: {e}", output.display()))
        });

    match result {
        Ok(compressed) => EntryStatus::Compressed {
            output: output.display().to_string(),
            summary: compressed.summary(),
        },
        Err(error) => EntryStatus::Failed { error },
    }
}
