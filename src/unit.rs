//! File units and their status state machine.
//!
//! A [`FileUnit`] is the per-input record everything else revolves around: one
//! unit per grouped base name, carrying its kind (image, video, or Live Photo
//! pair), conversion status, progress, and, once conversion finishes, the
//! downloadable artifacts. Units hold only derived data; the raw input bytes
//! live in the session's retained-input table so a unit can be re-rendered or
//! retried without re-reading anything from the caller.
//!
//! ## Status lifecycle
//!
//! ```text
//! Pending ──> Processing ──> Completed
//!                 ^    └───> Error
//!                 └──────────┘  (retry)
//! ```
//!
//! Video-only units skip the pipeline entirely and are created `Completed`.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Progress value of a unit that has not started.
pub const PROGRESS_QUEUED: u8 = 0;
/// Progress once a unit enters `Processing`.
pub const PROGRESS_STARTED: u8 = 10;
/// Progress once format detection chose the decode path.
pub const PROGRESS_DECODING: u8 = 30;
/// Progress of a completed unit.
pub const PROGRESS_DONE: u8 = 100;

/// Opaque unit identifier, unique within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct UnitId(Uuid);

impl UnitId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UnitId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What a unit represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    /// A lone image file.
    Image,
    /// A lone video file.
    Video,
    /// A Live Photo pair: image plus companion video.
    Pair,
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnitKind::Image => "image",
            UnitKind::Video => "video",
            UnitKind::Pair => "pair",
        };
        f.write_str(s)
    }
}

/// Conversion status of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl UnitStatus {
    /// Whether moving from `self` to `next` is a legal lifecycle step.
    ///
    /// `Error -> Processing` is the retry re-entry; `Completed` is terminal.
    pub fn can_transition_to(self, next: UnitStatus) -> bool {
        use UnitStatus::*;
        matches!(
            (self, next),
            (Pending, Processing) | (Processing, Completed) | (Processing, Error) | (Error, Processing)
        )
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnitStatus::Pending => "pending",
            UnitStatus::Processing => "processing",
            UnitStatus::Completed => "completed",
            UnitStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// A downloadable result: a name plus shared bytes.
///
/// Cloning is cheap (the buffer is behind an `Arc`); dropping the last clone
/// releases the memory.
#[derive(Clone)]
pub struct Artifact {
    pub name: String,
    pub bytes: Arc<[u8]>,
}

impl Artifact {
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

// Hand-written so test failures print a byte count, not the whole buffer.
impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("name", &self.name)
            .field("bytes", &format_args!("{} bytes", self.bytes.len()))
            .finish()
    }
}

/// The record for one grouped input, driving presentation and conversion.
#[derive(Debug, Clone)]
pub struct FileUnit {
    pub id: UnitId,
    /// Input name as given, fixed at creation. For pairs, the image's name.
    pub original_name: String,
    /// Combined input size in bytes (image + video for pairs).
    pub original_size: u64,
    pub kind: UnitKind,
    pub status: UnitStatus,
    /// Advisory 0-100 milestone, monotone within one processing run.
    pub progress: u8,
    /// Sanitized failure message, present exactly when status is `Error`.
    pub error: Option<String>,
    /// Converted (or passed-through) image, present once completed.
    pub result: Option<Artifact>,
    /// Companion video for pairs and video-only units.
    pub video: Option<Artifact>,
    /// Preview bytes; shares the result's buffer rather than re-encoding.
    pub thumbnail: Option<Arc<[u8]>>,
}

impl FileUnit {
    /// A unit awaiting conversion (image or pair kinds).
    pub fn pending(name: impl Into<String>, size: u64, kind: UnitKind) -> Self {
        Self {
            id: UnitId::new(),
            original_name: name.into(),
            original_size: size,
            kind,
            status: UnitStatus::Pending,
            progress: PROGRESS_QUEUED,
            error: None,
            result: None,
            video: None,
            thumbnail: None,
        }
    }

    /// A video without a paired image: nothing to convert, so the unit is
    /// born `Completed` with the input itself as its sole artifact.
    pub fn completed_video(video: Artifact) -> Self {
        let size = video.size();
        Self {
            id: UnitId::new(),
            original_name: video.name.clone(),
            original_size: size,
            kind: UnitKind::Video,
            status: UnitStatus::Completed,
            progress: PROGRESS_DONE,
            error: None,
            result: None,
            video: Some(video),
            thumbnail: None,
        }
    }

    /// Enter `Processing`: progress rewinds to the started milestone and any
    /// prior error text is cleared (this is also the retry re-entry).
    pub fn begin_processing(&mut self) {
        debug_assert!(self.status.can_transition_to(UnitStatus::Processing));
        self.status = UnitStatus::Processing;
        self.progress = PROGRESS_STARTED;
        self.error = None;
    }

    /// Advance the progress milestone without changing status.
    pub fn set_progress(&mut self, progress: u8) {
        debug_assert_eq!(self.status, UnitStatus::Processing);
        self.progress = progress.min(PROGRESS_DONE);
    }

    /// Finish successfully. The thumbnail shares the result's buffer.
    pub fn complete(&mut self, result: Artifact, video: Option<Artifact>) {
        debug_assert!(self.status.can_transition_to(UnitStatus::Completed));
        self.thumbnail = Some(result.bytes.clone());
        self.result = Some(result);
        self.video = video;
        self.status = UnitStatus::Completed;
        self.progress = PROGRESS_DONE;
        self.error = None;
    }

    /// Finish with a failure. Progress keeps its last milestone so the record
    /// shows how far the unit got.
    pub fn fail(&mut self, message: impl Into<String>) {
        debug_assert!(self.status.can_transition_to(UnitStatus::Error));
        self.status = UnitStatus::Error;
        self.error = Some(message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_matrix() {
        use UnitStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Error));
        assert!(Error.can_transition_to(Processing));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Error));
        assert!(!Completed.can_transition_to(Processing));
        assert!(!Completed.can_transition_to(Error));
        assert!(!Error.can_transition_to(Completed));
        assert!(!Processing.can_transition_to(Pending));
    }

    #[test]
    fn pending_unit_starts_at_zero() {
        let unit = FileUnit::pending("IMG_0001.heic", 1024, UnitKind::Image);
        assert_eq!(unit.status, UnitStatus::Pending);
        assert_eq!(unit.progress, PROGRESS_QUEUED);
        assert!(unit.error.is_none());
        assert!(unit.result.is_none());
    }

    #[test]
    fn video_unit_is_born_completed() {
        let artifact = Artifact::new("clip.mov", vec![1u8, 2, 3]);
        let unit = FileUnit::completed_video(artifact);

        assert_eq!(unit.kind, UnitKind::Video);
        assert_eq!(unit.status, UnitStatus::Completed);
        assert_eq!(unit.progress, PROGRESS_DONE);
        assert_eq!(unit.original_size, 3);
        assert_eq!(unit.video.as_ref().unwrap().name, "clip.mov");
        assert!(unit.result.is_none());
    }

    #[test]
    fn begin_processing_clears_error_and_rewinds_progress() {
        let mut unit = FileUnit::pending("a.heic", 10, UnitKind::Image);
        unit.begin_processing();
        unit.set_progress(PROGRESS_DECODING);
        unit.fail("decode blew up");
        assert_eq!(unit.status, UnitStatus::Error);
        assert_eq!(unit.progress, PROGRESS_DECODING);
        assert!(unit.error.is_some());

        unit.begin_processing();
        assert_eq!(unit.status, UnitStatus::Processing);
        assert_eq!(unit.progress, PROGRESS_STARTED);
        assert!(unit.error.is_none());
    }

    #[test]
    fn complete_attaches_artifacts_and_shares_thumbnail_buffer() {
        let mut unit = FileUnit::pending("a.heic", 10, UnitKind::Pair);
        unit.begin_processing();

        let result = Artifact::new("a.jpg", vec![9u8; 16]);
        let video = Artifact::new("a.mov", vec![7u8; 8]);
        unit.complete(result, Some(video));

        assert_eq!(unit.status, UnitStatus::Completed);
        assert_eq!(unit.progress, PROGRESS_DONE);
        let result = unit.result.as_ref().unwrap();
        assert_eq!(result.name, "a.jpg");
        assert_eq!(unit.video.as_ref().unwrap().name, "a.mov");
        // Same allocation, not a copy.
        assert!(Arc::ptr_eq(&result.bytes, unit.thumbnail.as_ref().unwrap()));
    }

    #[test]
    fn fail_keeps_last_progress_milestone() {
        let mut unit = FileUnit::pending("a.heic", 10, UnitKind::Image);
        unit.begin_processing();
        unit.fail("boom");
        assert_eq!(unit.progress, PROGRESS_STARTED);
        assert_eq!(unit.error.as_deref(), Some("boom"));
    }

    #[test]
    fn artifact_size_matches_bytes() {
        let artifact = Artifact::new("x.jpg", vec![0u8; 42]);
        assert_eq!(artifact.size(), 42);
    }
}
