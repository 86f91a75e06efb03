//! # liveheic
//!
//! Batch conversion of HEIC/HEIF photos to JPEG, with Apple Live Photo
//! pairing. Inputs are opaque named byte buffers: an image and a video that
//! share a base name (`IMG_0001.HEIC` + `IMG_0001.MOV`) are treated as one
//! Live Photo unit, converted together, and exported together.
//!
//! # Architecture: Session Pipeline
//!
//! A batch moves through three steps, all owned by one
//! [`session::Session`] value:
//!
//! ```text
//! 1. Pair     inputs  →  units      (base-name grouping, duplicate policy)
//! 2. Convert  units   →  artifacts  (parallel decode, per-unit status machine)
//! 3. Export   units   →  out dir    (JPEG + companion video files)
//! ```
//!
//! Every unit is independent: any failure, up to and including a panic
//! inside a decoder, becomes that unit's error status with a short sanitized
//! message, and its siblings keep going.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`pairing`] | Groups raw inputs into prospective units by base name |
//! | [`unit`] | Unit records: identity, status machine, progress milestones, artifacts |
//! | [`session`] | Owned batch state and parallel conversion orchestration |
//! | [`engine`] | Conversion engine seam: ImageMagick CLI and optional libheif |
//! | [`sanitize`] | Maps raw engine failures to short user-facing messages |
//! | [`config`] | `liveheic.toml` loading and validation |
//! | [`report`] | Serializable batch snapshot behind `--json` and summaries |
//! | [`output`] | CLI line formatting and artifact export |
//!
//! # Design Decisions
//!
//! ## Events Over Shared State
//!
//! Workers never touch the unit list. Each conversion emits
//! [`session::ConvertEvent`]s over a channel and the session applies them on
//! the calling thread, so unit records have exactly one writer and a batch
//! is observable from outside without locks.
//!
//! ## Engines Are Injected and Optional
//!
//! HEIC decoding needs a native decoder one way or another. Rather than
//! bake one in, [`engine::ConversionEngine`] is a seam: the default build
//! shells out to ImageMagick when it is on `PATH`, the `libheif` cargo
//! feature links libheif directly, and an absent engine is a legal state
//! that turns every image-bearing unit into a per-unit error instead of a
//! process failure. Tests inject a mock and never decode anything.
//!
//! ## Raw Bytes Live in One Place
//!
//! Unit records carry derived data only. The session's retained-input table
//! is the sole owner of raw input bytes, so retrying a unit re-reads exactly
//! the bytes that failed, and `remove`/`clear` genuinely release memory.
//! Artifact buffers are shared `Arc<[u8]>`; a unit's thumbnail aliases its
//! result buffer rather than re-encoding a preview.

pub mod config;
pub mod engine;
pub mod output;
pub mod pairing;
pub mod report;
pub mod sanitize;
pub mod session;
pub mod unit;
