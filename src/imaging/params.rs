//! Parameter types for the compression search.
//!
//! These structs describe *what* to try, not *how* to render it. They are the
//! interface between the search in [`compress`](crate::compress) (which decides
//! which trial comes next) and the [`backend`](super::backend) (which does the
//! actual pixel work). This separation allows swapping the render surface
//! (e.g. for testing with a fake encoder) without changing the search order.
//!
//! ## Types
//!
//! - [`Quality`] — Lossy encoding quality (1–100, default 80). Clamped on construction.
//! - [`OutputFormat`] — Encoded output format, with its media type and extension.
//! - [`EncodeParams`] — Full specification for one render + encode: size, format, quality.
//! - [`SearchPlan`] — Bounds and steps of the (max-dimension, quality) search.
//! - [`Trial`] — One (max-dimension, quality) combination from a plan.

use serde::{Deserialize, Serialize};

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(80)
    }
}

/// Output encodings a render surface can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    WebP,
    #[serde(alias = "jpg")]
    Jpeg,
}

impl OutputFormat {
    pub fn media_type(self) -> &'static str {
        match self {
            OutputFormat::WebP => "image/webp",
            OutputFormat::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::WebP => "webp",
            OutputFormat::Jpeg => "jpg",
        }
    }
}

/// Parameters for a single render + encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeParams {
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
    pub quality: Quality,
}

/// One attempted (max-dimension, quality) combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Trial {
    pub max_dimension: u32,
    pub quality: Quality,
}

/// Bounds of the descending (max-dimension, quality) search.
///
/// Both ranges are inclusive: the floor itself is tried when the initial
/// value minus a whole number of steps lands on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchPlan {
    pub initial_max_dimension: u32,
    pub min_max_dimension: u32,
    pub dimension_step: u32,
    pub initial_quality: Quality,
    pub min_quality: Quality,
    pub quality_step: u32,
}

impl SearchPlan {
    /// A plan is empty when a floor sits above its start or a step is zero
    /// (a zero step would never terminate).
    pub fn is_empty(&self) -> bool {
        self.dimension_step == 0
            || self.quality_step == 0
            || self.min_max_dimension > self.initial_max_dimension
            || self.min_quality > self.initial_quality
            || self.min_max_dimension == 0
    }

    /// Number of quality values tried per dimension.
    pub fn qualities_per_dimension(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        ((self.initial_quality.value() - self.min_quality.value()) / self.quality_step + 1) as usize
    }

    /// Number of max-dimension values tried.
    pub fn dimension_count(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        ((self.initial_max_dimension - self.min_max_dimension) / self.dimension_step + 1) as usize
    }

    /// Upper bound on render + encode calls for one image.
    pub fn worst_case_trials(&self) -> usize {
        self.qualities_per_dimension() * self.dimension_count()
    }
}

impl Default for SearchPlan {
    fn default() -> Self {
        Self {
            initial_max_dimension: 1024,
            min_max_dimension: 640,
            dimension_step: 128,
            initial_quality: Quality::new(80),
            min_quality: Quality::new(40),
            quality_step: 10,
        }
    }
}
