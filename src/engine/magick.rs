//! Subprocess engine backed by ImageMagick.
//!
//! The default engine on plain builds: no native libraries to link, just an
//! ImageMagick binary on PATH (`magick`, or the legacy `convert`). Each call
//! round-trips through a scratch directory: write the input, run the binary,
//! read the JPEG(s) back.

use super::{ConversionEngine, EngineError, Quality};
use std::path::PathBuf;
use std::process::Command;

pub struct MagickEngine {
    binary: PathBuf,
}

impl MagickEngine {
    /// Look for an ImageMagick binary on PATH.
    ///
    /// `None` is the absence state the session is constructed with, not an
    /// error: detection happens once at startup, never mid-conversion.
    pub fn detect() -> Option<Self> {
        let binary = which::which("magick")
            .or_else(|_| which::which("convert"))
            .ok()?;
        tracing::debug!("found ImageMagick at {}", binary.display());
        Some(Self { binary })
    }

    /// Use a specific binary instead of searching PATH.
    pub fn with_binary(binary: PathBuf) -> Self {
        Self { binary }
    }
}

impl ConversionEngine for MagickEngine {
    fn name(&self) -> &'static str {
        "imagemagick"
    }

    fn convert_to_jpeg(&self, bytes: &[u8], quality: Quality) -> Result<Vec<Vec<u8>>, EngineError> {
        let dir = tempfile::tempdir()?;
        // No extension on the input: ImageMagick identifies the format from
        // magic bytes.
        let input = dir.path().join("input");
        let output = dir.path().join("output.jpg");
        std::fs::write(&input, bytes)?;

        let run = Command::new(&self.binary)
            .arg(&input)
            .arg("-quality")
            .arg(quality.value().to_string())
            .arg(&output)
            .output()?;

        if !run.status.success() {
            let stderr = String::from_utf8_lossy(&run.stderr);
            let detail = stderr.lines().next().unwrap_or("").trim().to_string();
            return Err(EngineError::Failed(if detail.is_empty() {
                format!("ImageMagick exited with {}", run.status)
            } else {
                detail
            }));
        }

        // Multi-image containers make ImageMagick write output-0.jpg,
        // output-1.jpg, ... instead of output.jpg.
        let mut buffers = Vec::new();
        if output.exists() {
            buffers.push(std::fs::read(&output)?);
        } else {
            let mut numbered: Vec<PathBuf> = std::fs::read_dir(dir.path())?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with("output-") && n.ends_with(".jpg"))
                })
                .collect();
            numbered.sort();
            for path in numbered {
                buffers.push(std::fs::read(&path)?);
            }
        }

        Ok(buffers)
    }
}
