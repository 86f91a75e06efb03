//! CLI output formatting and artifact export.
//!
//! # Output Format
//!
//! ## Convert
//!
//! One line per finished unit as events arrive, then a summary:
//!
//! ```text
//! IMG_0001.HEIC → IMG_0001.jpg (2.1 MB) + IMG_0001.MOV
//! beach.png → beach.png (480 KB)
//! portrait.heic failed: Format not supported. This usually happens with
//! certain 10-bit or ProRAW HEIC files.
//!
//! 3 units: 2 completed, 1 failed
//! ```
//!
//! ## Pair
//!
//! A preview of the grouping, no conversion:
//!
//! ```text
//! 001 IMG_0001.HEIC (live pair, 3.4 MB)
//! 002 beach.png (image, 480 KB)
//! 003 clip.mov (video, 12.8 MB)
//! ```
//!
//! # Architecture
//!
//! Each piece of output has a `format_*` function (pure, returns strings)
//! and a `print_*` wrapper that writes to stdout. [`write_artifacts`] is the
//! only function here that touches the filesystem: it exports completed
//! units into an output directory, kept strictly inside that directory.

use crate::report::BatchReport;
use crate::session::ConvertEvent;
use crate::unit::{Artifact, FileUnit, UnitKind, UnitStatus};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

// ============================================================================
// Formatting helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Human-readable size: 1024-based, one decimal, trailing `.0` dropped.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let exp = ((bytes.ilog2() / 10) as usize).min(UNITS.len() - 1);
    let value = bytes as f64 / 1024f64.powi(exp as i32);
    let rounded = (value * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{} {}", rounded as u64, UNITS[exp])
    } else {
        format!("{:.1} {}", rounded, UNITS[exp])
    }
}

fn kind_label(kind: UnitKind) -> &'static str {
    match kind {
        UnitKind::Image => "image",
        UnitKind::Video => "video",
        UnitKind::Pair => "live pair",
    }
}

// ============================================================================
// Convert output
// ============================================================================

/// Format a conversion event as a display line.
///
/// Only terminal events produce a line; `Started` and `Progress` are
/// silent in line-oriented output.
pub fn format_convert_event(event: &ConvertEvent) -> Option<String> {
    match event {
        ConvertEvent::Started { .. } | ConvertEvent::Progress { .. } => None,
        ConvertEvent::Completed {
            name,
            result,
            video,
            ..
        } => {
            let mut line = format!(
                "{} \u{2192} {} ({})",
                name,
                result.name,
                format_size(result.size())
            );
            if let Some(video) = video {
                line.push_str(&format!(" + {}", video.name));
            }
            Some(line)
        }
        ConvertEvent::Failed { name, message, .. } => Some(format!("{} failed: {}", name, message)),
    }
}

/// Print a conversion event, if it has a line form.
pub fn print_convert_event(event: &ConvertEvent) {
    if let Some(line) = format_convert_event(event) {
        println!("{}", line);
    }
}

/// Format the end-of-run summary line.
pub fn format_batch_summary(report: &BatchReport) -> String {
    let totals = &report.totals;
    let mut line = format!(
        "{} units: {} completed, {} failed",
        totals.units, totals.completed, totals.failed
    );
    if totals.pending > 0 {
        line.push_str(&format!(", {} not started", totals.pending));
    }
    line
}

/// Print the summary line, preceded by a blank separator.
pub fn print_batch_summary(report: &BatchReport) {
    println!();
    println!("{}", format_batch_summary(report));
}

// ============================================================================
// Pair output
// ============================================================================

/// Format the pairing preview: one line per unit, in admission order.
pub fn format_pair_output(units: &[FileUnit]) -> Vec<String> {
    units
        .iter()
        .enumerate()
        .map(|(i, unit)| {
            format!(
                "{} {} ({}, {})",
                format_index(i + 1),
                unit.original_name,
                kind_label(unit.kind),
                format_size(unit.original_size)
            )
        })
        .collect()
}

/// Print the pairing preview to stdout.
pub fn print_pair_output(units: &[FileUnit]) {
    for line in format_pair_output(units) {
        println!("{}", line);
    }
}

// ============================================================================
// Artifact export
// ============================================================================

/// Write every completed unit's artifacts under `out_dir`.
///
/// Artifact names may contain `/` separators; intermediate directories are
/// created. An existing file is never overwritten: colliding names get a
/// ` (n)` suffix before the extension, browser-download style. Returns the
/// paths written, in unit order.
pub fn write_artifacts(units: &[FileUnit], out_dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for unit in units {
        if unit.status != UnitStatus::Completed {
            continue;
        }
        for artifact in [unit.result.as_ref(), unit.video.as_ref()]
            .into_iter()
            .flatten()
        {
            written.push(write_artifact(artifact, out_dir)?);
        }
    }
    Ok(written)
}

fn write_artifact(artifact: &Artifact, out_dir: &Path) -> io::Result<PathBuf> {
    let relative = checked_artifact_path(&artifact.name)?;
    let target = out_dir.join(relative);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    let target = unique_path(target);
    fs::write(&target, &artifact.bytes)?;
    Ok(target)
}

/// Writes must stay inside the output directory: reject empty names, rooted
/// names, and any `.`/`..` component.
fn checked_artifact_path(name: &str) -> io::Result<&Path> {
    let path = Path::new(name);
    let safe = !name.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if !safe {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("unsafe artifact name: {name:?}"),
        ));
    }
    Ok(path)
}

fn unique_path(path: PathBuf) -> PathBuf {
    if !path.exists() {
        return path;
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());
    for n in 1.. {
        let candidate = match &ext {
            Some(ext) => path.with_file_name(format!("{stem} ({n}).{ext}")),
            None => path.with_file_name(format!("{stem} ({n})")),
        };
        if !candidate.exists() {
            return candidate;
        }
    }
    unreachable!()
}

// ============================================================================
// Tests
// ============================================================================
