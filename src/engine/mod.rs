//! Conversion engine trait and discovery.
//!
//! The [`ConversionEngine`] trait is the seam between orchestration and the
//! actual HEIC decoding, which this crate deliberately does not implement
//! itself. Everything above the trait is engine-agnostic; a session is handed
//! an `Option<Arc<dyn ConversionEngine>>` at construction, and `None` is a
//! perfectly valid state that surfaces as a per-unit error rather than a
//! crash.
//!
//! Production implementations:
//! - [`MagickEngine`](magick::MagickEngine): shells out to ImageMagick,
//!   always compiled, detected at startup.
//! - [`LibheifEngine`](libheif::LibheifEngine): in-process via libheif,
//!   behind the `libheif` cargo feature.

use std::sync::Arc;
use thiserror::Error;

pub mod magick;

#[cfg(feature = "libheif")]
pub mod libheif;

pub use magick::MagickEngine;

#[cfg(feature = "libheif")]
pub use libheif::LibheifEngine;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Failed(String),
}

/// JPEG encoding quality, clamped to 1-100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u8);

impl Quality {
    pub fn new(value: u8) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(92)
    }
}

/// A capability that turns HEIC/HEIF bytes into JPEG bytes.
///
/// Implementations must be `Send + Sync`: one engine instance is shared by
/// all rayon workers. A multi-image HEIC container may yield several buffers;
/// callers take the first.
pub trait ConversionEngine: Send + Sync {
    /// Short name for logs and reports.
    fn name(&self) -> &'static str;

    /// Decode the input and encode one JPEG per contained image.
    fn convert_to_jpeg(&self, bytes: &[u8], quality: Quality) -> Result<Vec<Vec<u8>>, EngineError>;
}

/// Which engine to use, usually from config or the `--engine` flag.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Prefer libheif when compiled in, then ImageMagick, then none.
    #[default]
    Auto,
    Magick,
    Libheif,
    /// Run without an engine; image-bearing units will error.
    None,
}

/// Resolve an engine kind to a usable engine, if one is available.
pub fn discover(kind: EngineKind) -> Option<Arc<dyn ConversionEngine>> {
    let engine = match kind {
        EngineKind::None => None,
        EngineKind::Magick => magick_engine(),
        EngineKind::Libheif => libheif_engine(),
        EngineKind::Auto => libheif_engine().or_else(magick_engine),
    };
    match &engine {
        Some(engine) => tracing::debug!("using conversion engine: {}", engine.name()),
        None => tracing::warn!("no conversion engine available"),
    }
    engine
}

fn magick_engine() -> Option<Arc<dyn ConversionEngine>> {
    magick::MagickEngine::detect().map(|e| Arc::new(e) as Arc<dyn ConversionEngine>)
}

#[cfg(feature = "libheif")]
fn libheif_engine() -> Option<Arc<dyn ConversionEngine>> {
    Some(Arc::new(libheif::LibheifEngine::new()))
}

#[cfg(not(feature = "libheif"))]
fn libheif_engine() -> Option<Arc<dyn ConversionEngine>> {
    None
}
