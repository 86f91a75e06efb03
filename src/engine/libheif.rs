//! In-process engine via libheif.
//!
//! Compiled only with the `libheif` cargo feature, which links the native
//! libheif library. Decodes the primary image to interleaved RGB and encodes
//! JPEG with the `image` crate.

use super::{ConversionEngine, EngineError, Quality};
use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

#[derive(Default)]
pub struct LibheifEngine;

impl LibheifEngine {
    pub fn new() -> Self {
        Self
    }
}

impl ConversionEngine for LibheifEngine {
    fn name(&self) -> &'static str {
        "libheif"
    }

    fn convert_to_jpeg(&self, bytes: &[u8], quality: Quality) -> Result<Vec<Vec<u8>>, EngineError> {
        let lib_heif = LibHeif::new();
        let ctx = HeifContext::read_from_bytes(bytes)
            .map_err(|e| EngineError::Failed(format!("Failed to read HEIC: {e}")))?;
        let handle = ctx
            .primary_image_handle()
            .map_err(|e| EngineError::Failed(format!("Failed to get primary image: {e}")))?;

        let width = handle.width();
        let height = handle.height();

        let decoded = lib_heif
            .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
            .map_err(|e| EngineError::Failed(format!("Failed to decode HEIC: {e}")))?;

        let planes = decoded.planes();
        let plane = planes
            .interleaved
            .ok_or_else(|| EngineError::Failed("No RGB plane found".to_string()))?;

        // Rows may be padded; copy stride-aware into a tight RGB buffer.
        let row_bytes = width as usize * 3;
        let mut rgb = Vec::with_capacity(row_bytes * height as usize);
        for row in 0..height as usize {
            let start = row * plane.stride;
            rgb.extend_from_slice(&plane.data[start..start + row_bytes]);
        }

        let img = image::RgbImage::from_raw(width, height, rgb)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| EngineError::Failed("Failed to create RGB image".to_string()))?;

        let mut out = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut out, quality.value());
        img.write_with_encoder(encoder)
            .map_err(|e| EngineError::Failed(format!("JPEG encode failed: {e}")))?;

        Ok(vec![out])
    }
}
