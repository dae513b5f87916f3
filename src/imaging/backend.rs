//! Render surface trait and shared types.
//!
//! The [`RenderSurface`] trait defines the three primitives the compression
//! search needs: decode a file, report its natural size, and render + encode
//! it at a given size and quality.
//!
//! The production implementation is
//! [`RustSurface`](super::rust_backend::RustSurface) — `image` for decoding
//! and resampling, `webp` for lossy encoding. Tests use a fake surface whose
//! output size is a pure function of the requested size and quality.

use super::params::EncodeParams;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Encode failed: {0}")]
    Encode(String),
    #[error("Capability unavailable: {0}")]
    Unavailable(String),
}

/// Pixel dimensions of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn as_tuple(self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl From<(u32, u32)> for Dimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

/// Off-screen rendering + encoding capability.
///
/// `Image` is the decoded handle for one invocation. It is owned by the
/// caller and dropped when the invocation ends, which releases any bitmap or
/// scratch surface the implementation attached to it.
pub trait RenderSurface: Sync {
    type Image;

    /// Decode raw file bytes.
    fn load(&self, bytes: &[u8], media_type: &str) -> Result<Self::Image, BackendError>;

    /// Natural (unscaled) size of a decoded image.
    fn natural_dimensions(&self, image: &Self::Image) -> Dimensions;

    /// Draw the image at `params.width` × `params.height` and encode it.
    fn render_and_encode(
        &self,
        image: &Self::Image,
        params: &EncodeParams,
    ) -> Result<Vec<u8>, BackendError>;
}
