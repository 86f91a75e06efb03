//! Session state and conversion orchestration.
//!
//! A [`Session`] owns everything a batch needs: the visible unit list, the
//! retained-input side table (sole owner of raw bytes, keyed by unit id), and
//! the injected conversion engine. Callers admit files with
//! [`Session::add_files`], run [`Session::convert_all`], and read the unit
//! list back; there is no global state anywhere.
//!
//! ## Concurrency model
//!
//! Units convert in parallel on the rayon pool, but unit records are only
//! ever written by the thread that called `convert_all`: workers emit
//! [`ConvertEvent`]s over a channel, and the calling thread applies each
//! event to the list as it arrives (and forwards it to an optional observer).
//! One writer, no partial updates, no locks around the unit list.
//!
//! Any failure, a panic included, is caught at the unit boundary and becomes
//! that unit's `Error` status; sibling units are unaffected, and nothing is
//! retried automatically.

use crate::engine::{ConversionEngine, Quality};
use crate::pairing::{self, DuplicatePolicy, InputFile, PairedInput};
use crate::sanitize;
use crate::unit::{Artifact, FileUnit, PROGRESS_DECODING, UnitId, UnitKind, UnitStatus};
use rayon::prelude::*;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Pairing error: {0}")]
    Pairing(#[from] pairing::PairingError),
    #[error("no such unit: {0}")]
    UnknownUnit(UnitId),
    #[error("unit is not in the error state: {0}")]
    NotFailed(UnitId),
}

/// Knobs fixed at session construction.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub quality: Quality,
    pub duplicates: DuplicatePolicy,
}

/// Shared flag that stops further units from being scheduled.
///
/// A started conversion always runs to completion; cancellation only keeps
/// unstarted units in their current state. The CLI wires SIGINT to this.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Progress notifications emitted while a batch runs.
///
/// Events from one unit arrive in pipeline order; events from different
/// units interleave freely.
#[derive(Debug, Clone)]
pub enum ConvertEvent {
    /// The unit entered `Processing` (progress 10, prior error cleared).
    Started { id: UnitId, name: String },
    /// A milestone advanced (currently only the decode milestone, 30).
    Progress { id: UnitId, progress: u8 },
    /// The unit finished; artifacts are attached to the record.
    Completed {
        id: UnitId,
        name: String,
        result: Artifact,
        video: Option<Artifact>,
    },
    /// The unit failed with a sanitized message.
    Failed {
        id: UnitId,
        name: String,
        message: String,
    },
}

impl ConvertEvent {
    pub fn unit_id(&self) -> UnitId {
        match self {
            ConvertEvent::Started { id, .. }
            | ConvertEvent::Progress { id, .. }
            | ConvertEvent::Completed { id, .. }
            | ConvertEvent::Failed { id, .. } => *id,
        }
    }
}

/// Raw input bytes for one unit, kept so retry never re-prompts the caller.
#[derive(Debug, Clone)]
struct RetainedInput {
    image: InputFile,
    video: Option<InputFile>,
}

/// Snapshot handed to a worker; bytes are shared with the side table.
struct ConvertJob {
    id: UnitId,
    name: String,
    image: InputFile,
    video: Option<InputFile>,
}

/// Owned batch state: unit list, retained inputs, engine, options.
pub struct Session {
    units: Vec<FileUnit>,
    originals: HashMap<UnitId, RetainedInput>,
    engine: Option<Arc<dyn ConversionEngine>>,
    options: SessionOptions,
}

impl Session {
    /// `engine: None` is a valid degraded state: image-bearing units will
    /// fail with a fixed message instead of converting.
    pub fn new(engine: Option<Arc<dyn ConversionEngine>>, options: SessionOptions) -> Self {
        Self {
            units: Vec::new(),
            originals: HashMap::new(),
            engine,
            options,
        }
    }

    pub fn units(&self) -> &[FileUnit] {
        &self.units
    }

    pub fn unit(&self, id: UnitId) -> Option<&FileUnit> {
        self.units.iter().find(|u| u.id == id)
    }

    /// Number of entries in the retained-input side table.
    pub fn retained_count(&self) -> usize {
        self.originals.len()
    }

    /// Group inputs into units and admit them.
    ///
    /// Image-bearing units are admitted `Pending` with their raw bytes moved
    /// into the side table; video-only units are admitted already `Completed`
    /// with the video as their sole artifact (no decode ever runs for them,
    /// so nothing is retained either). Returns the new unit ids in order.
    pub fn add_files(&mut self, inputs: Vec<InputFile>) -> Result<Vec<UnitId>, SessionError> {
        let groups = pairing::pair_inputs(inputs, self.options.duplicates)?;
        Ok(groups.into_iter().map(|g| self.admit(g)).collect())
    }

    fn admit(&mut self, group: PairedInput) -> UnitId {
        match (group.image, group.video) {
            (Some(image), video) => {
                let kind = if video.is_some() {
                    UnitKind::Pair
                } else {
                    UnitKind::Image
                };
                let size = image.size() + video.as_ref().map_or(0, |v| v.size());
                let unit = FileUnit::pending(image.name.clone(), size, kind);
                let id = unit.id;
                self.originals.insert(id, RetainedInput { image, video });
                self.units.push(unit);
                id
            }
            (None, Some(video)) => {
                let InputFile { name, bytes } = video;
                let unit = FileUnit::completed_video(Artifact::new(name, bytes));
                let id = unit.id;
                self.units.push(unit);
                id
            }
            (None, None) => unreachable!("pairing emits no empty groups"),
        }
    }

    /// Convert every `Pending` unit, in parallel, blocking until done.
    ///
    /// Events are applied to the unit list as they arrive and forwarded to
    /// `observer` when given. A cancelled token stops scheduling further
    /// units; those stay `Pending`. Returns the number of units picked up.
    pub fn convert_all(
        &mut self,
        observer: Option<Sender<ConvertEvent>>,
        cancel: Option<&CancelToken>,
    ) -> usize {
        let jobs = self.collect_jobs(UnitStatus::Pending);
        self.run_jobs(jobs, observer, cancel)
    }

    /// Re-run every `Error` unit once, same mechanics as [`Self::convert_all`].
    pub fn retry_failed(
        &mut self,
        observer: Option<Sender<ConvertEvent>>,
        cancel: Option<&CancelToken>,
    ) -> usize {
        let jobs = self.collect_jobs(UnitStatus::Error);
        self.run_jobs(jobs, observer, cancel)
    }

    /// Retry a single failed unit on the calling thread, re-reading the
    /// retained bytes. Only `Error` units are retryable.
    pub fn retry(&mut self, id: UnitId) -> Result<(), SessionError> {
        let unit = self.unit(id).ok_or(SessionError::UnknownUnit(id))?;
        if unit.status != UnitStatus::Error {
            return Err(SessionError::NotFailed(id));
        }
        let retained = self.originals.get(&id).ok_or(SessionError::UnknownUnit(id))?;
        let job = ConvertJob {
            id,
            name: unit.original_name.clone(),
            image: retained.image.clone(),
            video: retained.video.clone(),
        };

        let engine = self.engine.clone();
        let quality = self.options.quality;
        let mut events = Vec::new();
        process_unit(engine.as_deref(), quality, &job, &mut |e| events.push(e));
        for event in events {
            self.apply(&event);
        }
        Ok(())
    }

    /// Drop a unit and its retained-input entry. Returns whether it existed.
    pub fn remove(&mut self, id: UnitId) -> bool {
        let before = self.units.len();
        self.units.retain(|u| u.id != id);
        self.originals.remove(&id);
        self.units.len() != before
    }

    /// Drop every unit and empty the side table.
    pub fn clear(&mut self) {
        self.units.clear();
        self.originals.clear();
    }

    fn collect_jobs(&self, status: UnitStatus) -> Vec<ConvertJob> {
        self.units
            .iter()
            .filter(|u| u.status == status)
            .filter_map(|u| {
                self.originals.get(&u.id).map(|retained| ConvertJob {
                    id: u.id,
                    name: u.original_name.clone(),
                    image: retained.image.clone(),
                    video: retained.video.clone(),
                })
            })
            .collect()
    }

    fn run_jobs(
        &mut self,
        jobs: Vec<ConvertJob>,
        observer: Option<Sender<ConvertEvent>>,
        cancel: Option<&CancelToken>,
    ) -> usize {
        if jobs.is_empty() {
            return 0;
        }
        let scheduled = jobs.len();
        let engine = self.engine.clone();
        let quality = self.options.quality;
        let cancel = cancel.cloned();

        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::scope(|scope| {
            scope.spawn(move || {
                jobs.into_par_iter().for_each_with(tx, |tx, job| {
                    if cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
                        return;
                    }
                    process_unit(engine.as_deref(), quality, &job, &mut |event| {
                        let _ = tx.send(event);
                    });
                });
            });

            // Single writer: the loop ends when the last worker sender drops.
            for event in rx {
                self.apply(&event);
                if let Some(observer) = &observer {
                    let _ = observer.send(event);
                }
            }
        });

        scheduled
    }

    fn apply(&mut self, event: &ConvertEvent) {
        let id = event.unit_id();
        let Some(unit) = self.units.iter_mut().find(|u| u.id == id) else {
            return;
        };
        match event {
            ConvertEvent::Started { .. } => unit.begin_processing(),
            ConvertEvent::Progress { progress, .. } => unit.set_progress(*progress),
            ConvertEvent::Completed { result, video, .. } => {
                unit.complete(result.clone(), video.clone())
            }
            ConvertEvent::Failed { message, .. } => unit.fail(message.clone()),
        }
    }
}

/// One unit, start to finish. Every failure, including a panic anywhere in
/// the pipeline or the engine, ends as a `Failed` event for this unit only.
fn process_unit(
    engine: Option<&dyn ConversionEngine>,
    quality: Quality,
    job: &ConvertJob,
    emit: &mut dyn FnMut(ConvertEvent),
) {
    emit(ConvertEvent::Started {
        id: job.id,
        name: job.name.clone(),
    });

    let outcome = catch_unwind(AssertUnwindSafe(|| convert_one(engine, quality, job, emit)));

    match outcome {
        Ok(Ok((result, video))) => emit(ConvertEvent::Completed {
            id: job.id,
            name: job.name.clone(),
            result,
            video,
        }),
        Ok(Err(message)) => emit(ConvertEvent::Failed {
            id: job.id,
            name: job.name.clone(),
            message,
        }),
        Err(payload) => emit(ConvertEvent::Failed {
            id: job.id,
            name: job.name.clone(),
            message: sanitize::panic_message(payload.as_ref()),
        }),
    }
}

/// The per-unit pipeline; returns artifacts or a user-facing message.
fn convert_one(
    engine: Option<&dyn ConversionEngine>,
    quality: Quality,
    job: &ConvertJob,
    emit: &mut dyn FnMut(ConvertEvent),
) -> Result<(Artifact, Option<Artifact>), String> {
    // The engine is required up front even when this unit would pass
    // through untouched; absence fails the unit before anything else.
    let Some(engine) = engine else {
        return Err(sanitize::ENGINE_MISSING_MESSAGE.to_string());
    };

    let video = job
        .video
        .as_ref()
        .map(|v| Artifact::new(v.name.clone(), v.bytes.clone()));

    let result = if pairing::is_heic(&job.image.name) {
        emit(ConvertEvent::Progress {
            id: job.id,
            progress: PROGRESS_DECODING,
        });
        let buffers = engine
            .convert_to_jpeg(&job.image.bytes, quality)
            .map_err(|e| sanitize::classify_decode_failure(&e.to_string()))?;
        let Some(first) = buffers.into_iter().next() else {
            return Err(sanitize::NO_OUTPUT_MESSAGE.to_string());
        };
        Artifact::new(pairing::jpeg_result_name(&job.image.name), first)
    } else {
        // Passthrough: same bytes, same name.
        Artifact::new(job.image.name.clone(), job.image.bytes.clone())
    };

    Ok((result, video))
}
