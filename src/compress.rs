//! Adaptive upload compression.
//!
//! Takes one uploaded file and returns an encoding that fits the byte budget,
//! or fails. Three steps:
//!
//! 1. **Normalize**: HEIC/HEIF is converted to JPEG
//!    ([`normalize`](crate::imaging::normalize)); everything else passes through.
//! 2. **Decode** through the injected [`RenderSurface`].
//! 3. **Search**: walk the [`SearchPlan`] trials, largest dimension and highest
//!    quality first, rendering and encoding each one. The first encoding at or
//!    under the budget is returned. Later trials are never run, even if a
//!    higher quality at a smaller size would also fit.
//!
//! ```text
//! 1024px: q80 → q70 → q60 → q50 → q40
//!  896px: q80 → q70 → ...
//!  ...
//!  640px: ... → q40  → CompressionBudgetExceeded
//! ```
//!
//! ## Failure modes
//!
//! Each maps to one [`CompressError`] variant and is returned once; nothing is
//! retried beyond the search itself. An encode failure aborts the search,
//! since a lower quality won't fix a broken encoder.
//!
//! ## Cancellation
//!
//! A [`CancelToken`] is checked before every trial. Callers running the
//! compressor on a worker thread can trip it (or give it a deadline) to
//! abandon a search the user no longer cares about.

use crate::config::CompressorConfig;
use crate::imaging::{
    BackendError, Dimensions, EncodeParams, HeicConverter, MagickConverter, Normalized,
    OutputFormat, Quality, RenderSurface, RustSurface, SearchPlan, Trial, normalize,
    target_dimensions,
};
use crate::naming;
use crate::types::{CompressedFile, UploadFile};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompressError {
    #[error("Environment unsupported: {0}")]
    EnvironmentUnsupported(String),
    #[error("Invalid image: {0}")]
    InvalidImage(String),
    #[error("Encode failed: {0}")]
    EncodeFailure(String),
    #[error(
        "Unable to compress {name} under {max_bytes} bytes: {trials} trials, smallest was {smallest} bytes"
    )]
    CompressionBudgetExceeded {
        name: String,
        max_bytes: u64,
        trials: usize,
        smallest: u64,
    },
    #[error("Compression of {0} was cancelled")]
    Cancelled(String),
    #[error("Invalid compression settings: {0}")]
    InvalidSettings(String),
}

impl CompressError {
    /// Map a failure while decoding or converting the input.
    fn from_input(err: BackendError) -> Self {
        match err {
            BackendError::Unavailable(msg) => CompressError::EnvironmentUnsupported(msg),
            BackendError::Encode(msg) => CompressError::EncodeFailure(msg),
            BackendError::Decode(msg) => CompressError::InvalidImage(msg),
            BackendError::Io(e) => CompressError::InvalidImage(e.to_string()),
        }
    }
}

/// Everything the search needs besides the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionSettings {
    /// Inclusive byte ceiling.
    pub max_bytes: u64,
    pub plan: SearchPlan,
    pub format: OutputFormat,
    /// JPEG quality for the HEIC intermediate.
    pub heic_quality: Quality,
}

impl CompressionSettings {
    pub fn from_config(config: &CompressorConfig) -> Self {
        Self {
            max_bytes: config.budget.max_bytes,
            plan: config.search_plan(),
            format: config.output.format,
            heic_quality: Quality::new(config.heic.quality),
        }
    }
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self::from_config(&CompressorConfig::default())
    }
}

/// Shared cancellation flag with an optional deadline.
///
/// Clones share the flag, so one clone can be handed to the worker and the
/// other kept by whoever may abandon the result.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that also trips once `timeout` has elapsed from now.
    ///
    /// A timeout too large to represent as an instant means no deadline.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            flag: Arc::default(),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Progress notifications, sent when a listener is attached.
#[derive(Debug, Clone, PartialEq)]
pub enum CompressEvent {
    /// A HEIC/HEIF input was converted before decoding.
    Converted { from: String, to: String },
    /// One render + encode finished.
    TrialFinished {
        name: String,
        trial: Trial,
        dimensions: Dimensions,
        bytes: u64,
        fits: bool,
    },
}

/// Per-call options for [`compress_with`].
#[derive(Debug, Clone, Default)]
pub struct CompressOptions {
    pub settings: CompressionSettings,
    pub cancel: CancelToken,
    pub events: Option<Sender<CompressEvent>>,
}

impl CompressOptions {
    fn emit(&self, event: CompressEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver only means nobody is listening any more.
            let _ = tx.send(event);
        }
    }
}

/// One encoded trial output.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub trial: Trial,
    pub dimensions: Dimensions,
    pub bytes: Vec<u8>,
}

impl Candidate {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Compress with stock settings, the pure-Rust surface and ImageMagick for
/// HEIC.
pub fn compress_image(file: UploadFile) -> Result<CompressedFile, CompressError> {
    let config = CompressorConfig::default();
    let converter = MagickConverter::new(config.heic.converter.clone());
    let options = CompressOptions {
        settings: CompressionSettings::from_config(&config),
        ..CompressOptions::default()
    };
    compress_with(&RustSurface::new(), &converter, file, &options)
}

/// Compress `file` with injected rendering and conversion capabilities.
pub fn compress_with<S: RenderSurface>(
    surface: &S,
    converter: &impl HeicConverter,
    file: UploadFile,
    options: &CompressOptions,
) -> Result<CompressedFile, CompressError> {
    let settings = &options.settings;
    if settings.plan.is_empty() {
        return Err(CompressError::InvalidSettings(format!(
            "search plan is empty: {:?}",
            settings.plan
        )));
    }
    if settings.max_bytes == 0 {
        return Err(CompressError::InvalidSettings(
            "max_bytes must be greater than 0".to_string(),
        ));
    }

    let span = tracing::info_span!("compress", name = %file.name);
    let _guard = span.enter();

    if options.cancel.is_cancelled() {
        return Err(CompressError::Cancelled(file.name));
    }

    let original_size = file.size();
    let original_name = file.name.clone();
    let Normalized { file, converted } =
        normalize(file, converter, settings.heic_quality).map_err(CompressError::from_input)?;
    if converted {
        options.emit(CompressEvent::Converted {
            from: original_name,
            to: file.name.clone(),
        });
    }

    let image = surface
        .load(&file.bytes, &file.media_type)
        .map_err(CompressError::from_input)?;
    let natural = surface.natural_dimensions(&image);
    if natural.width == 0 || natural.height == 0 {
        return Err(CompressError::InvalidImage(format!(
            "{} has zero size ({}x{})",
            file.name, natural.width, natural.height
        )));
    }
    tracing::debug!(
        width = natural.width,
        height = natural.height,
        bytes = original_size,
        "decoded source"
    );

    let (candidate, attempts) = search(surface, &image, natural, &file.name, options)?;

    tracing::info!(
        width = candidate.dimensions.width,
        height = candidate.dimensions.height,
        quality = candidate.trial.quality.value(),
        bytes = candidate.size(),
        attempts,
        "compressed under budget"
    );

    Ok(CompressedFile {
        file: UploadFile {
            name: naming::replace_extension(&file.name, settings.format.extension()),
            media_type: settings.format.media_type().to_string(),
            bytes: candidate.bytes,
        },
        dimensions: candidate.dimensions,
        trial: candidate.trial,
        attempts,
        original_size,
        converted_from_heic: converted,
    })
}

/// Run the trials in order and return the first candidate within budget,
/// with the number of encodes it took.
fn search<S: RenderSurface>(
    surface: &S,
    image: &S::Image,
    natural: Dimensions,
    name: &str,
    options: &CompressOptions,
) -> Result<(Candidate, usize), CompressError> {
    let settings = &options.settings;
    let mut attempts = 0;
    let mut smallest = u64::MAX;

    for trial in settings.plan.trials() {
        if options.cancel.is_cancelled() {
            tracing::debug!(attempts, "search cancelled");
            return Err(CompressError::Cancelled(name.to_string()));
        }

        let dimensions = Dimensions::from(target_dimensions(
            natural.as_tuple(),
            trial.max_dimension,
        ));
        let params = EncodeParams {
            width: dimensions.width,
            height: dimensions.height,
            format: settings.format,
            quality: trial.quality,
        };
        let bytes = surface.render_and_encode(image, &params).map_err(|e| {
            CompressError::EncodeFailure(format!(
                "{name} at {}x{} q{}: {e}",
                params.width,
                params.height,
                trial.quality.value()
            ))
        })?;
        attempts += 1;

        let candidate = Candidate {
            trial,
            dimensions,
            bytes,
        };
        let size = candidate.size();
        let fits = size <= settings.max_bytes;
        smallest = smallest.min(size);

        tracing::debug!(
            max_dimension = trial.max_dimension,
            quality = trial.quality.value(),
            width = dimensions.width,
            height = dimensions.height,
            bytes = size,
            fits,
            "trial"
        );
        options.emit(CompressEvent::TrialFinished {
            name: name.to_string(),
            trial,
            dimensions,
            bytes: size,
            fits,
        });

        if fits {
            return Ok((candidate, attempts));
        }
    }

    Err(CompressError::CompressionBudgetExceeded {
        name: name.to_string(),
        max_bytes: settings.max_bytes,
        trials: attempts,
        smallest,
    })
}
