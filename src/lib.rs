//! # lostfound-compress
//!
//! Adaptive compression for campus lost-and-found photo uploads. Phone photos
//! are several megabytes; the upload limit is 1 MB. Every image is re-encoded
//! to WebP, stepping down size and quality until it fits a 0.9 MB budget.
//!
//! ```no_run
//! use lostfound_compress::compress_image;
//! use lostfound_compress::types::UploadFile;
//!
//! let file = UploadFile::from_path("IMG_0042.HEIC".as_ref())?;
//! let compressed = compress_image(file)?;
//! assert!(compressed.size() <= 943_718);
//! std::fs::write(&compressed.file.name, &compressed.file.bytes)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Pipeline
//!
//! ```text
//! UploadFile ─→ normalize (HEIC → JPEG) ─→ decode ─→ search ─→ CompressedFile
//!                                                       │
//!                                    1024px q80, q70 … 640px q40
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`compress`] | The search: [`compress_image`], [`compress_with`], errors, cancellation |
//! | [`imaging`] | Render surface, HEIC conversion, scale math, trial ordering |
//! | [`batch`] | Parallel compression of files and directories on disk |
//! | [`config`] | `lostfound-compress.toml` loading, merging onto defaults, validation |
//! | [`types`] | `UploadFile`, `CompressedFile` and the serializable summary |
//! | [`naming`] | File-name rewriting and media-type helpers |
//! | [`output`] | CLI report formatting |
//! | [`logging`] | `tracing` subscriber setup |
//!
//! # Design Decisions
//!
//! ## First Fit Wins
//!
//! The search returns the first trial that fits. Dimension is the outer loop,
//! so the compressor keeps as many pixels as it can and only then gives up
//! quality at a smaller size. An image that already fits at 1024px q80 costs a
//! single encode.
//!
//! ## Injected Capabilities
//!
//! Decoding, resampling and encoding go through [`imaging::RenderSurface`];
//! HEIC conversion through [`imaging::HeicConverter`]. The library ships
//! pure-Rust decoding with libwebp encoding and an ImageMagick converter, and
//! tests substitute recording fakes. The search itself is pure control flow.
//!
//! ## Integer Quality
//!
//! Quality is an integer 1–100 stepped by whole units, so the trial sequence
//! is exact (80, 70, 60, 50, 40) with no float drift at the floor.

pub mod batch;
pub mod compress;
pub mod config;
pub mod imaging;
pub mod logging;
pub mod naming;
pub mod output;
pub mod types;

pub use compress::{CompressError, compress_image, compress_with};

#[cfg(test)]
pub(crate) mod test_helpers;
