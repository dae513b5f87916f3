//! Image handling for the upload compressor.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image` crate (format sniffed from bytes) |
//! | **HEIC → JPEG** | ImageMagick CLI via [`MagickConverter`] |
//! | **Resample** | `image` `Triangle` filter |
//! | **Encode → WebP** | `webp` (libwebp, lossy) |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for scale math and trial ordering (unit testable)
//! - **Parameters**: Data structures describing the search and each encode
//! - **Backend**: [`RenderSurface`] trait + [`RustSurface`]
//! - **Normalize**: HEIC detection + [`HeicConverter`] trait + [`MagickConverter`]

pub mod backend;
mod calculations;
pub mod magick;
pub mod normalize;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, RenderSurface};
pub use calculations::{Trials, scale_factor, target_dimensions};
pub use magick::MagickConverter;
pub use normalize::{HeicConverter, NoHeicSupport, Normalized, is_heic, normalize};
pub use params::{EncodeParams, OutputFormat, Quality, SearchPlan, Trial};
pub use rust_backend::{RustSurface, SourceImage, supported_input_extensions};
