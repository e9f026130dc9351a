//! Sequence controller state.
//!
//! Owns everything one verification run mutates: the stage, the active pose,
//! the latest observation pair, the validation flags, the hold timer, and the
//! accumulated capture records. All methods are synchronous; the actor in
//! `engine` is the only caller, so every mutation is already serialized.
//! Methods return the side effects the actor must carry out (spawn a capture,
//! persist an image, emit an event) as plain values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use mirada_core::{
    standard_sequence, FaceGeometry, FaceQuality, HoldTimer, Observation, Pose, Rect,
    ValidationState, VerificationStage,
};
use serde::Serialize;
use uuid::Uuid;

use crate::capture::{CaptureError, CapturedImage};
use crate::store::StoreError;

/// One persisted capture, in sequence order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureRecord {
    /// Zero-based position in the run's sequence.
    pub step: usize,
    pub pose: Pose,
    pub location: PathBuf,
    pub captured_at: chrono::DateTime<chrono::Utc>,
}

/// Notifications pushed to the host as a run progresses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum VerificationEvent {
    /// A pose was held valid for the full duration; a capture is in flight.
    HoldCompleted { pose: Pose, step: usize },
    /// A capture was persisted and the run moved past this step.
    CaptureStored {
        pose: Pose,
        step: usize,
        location: PathBuf,
    },
    /// Every step captured and stored.
    Succeeded,
    /// Persistence failed; the run is over until an explicit reset.
    Failed { reason: String },
}

/// Read-only view of the verifier, published after every mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSnapshot {
    pub stage: VerificationStage,
    /// Target the user should be holding. `None` before the first start and
    /// after a reset, `Done` once the run succeeded.
    pub active_pose: Option<Pose>,
    pub sequence_index: usize,
    pub sequence_len: usize,
    pub run_id: Option<Uuid>,
    pub validation: ValidationState,
    pub has_valid_face: bool,
    /// Hold progress in `[0.0, 1.0]` for the active pose.
    pub hold_progress: f32,
    pub face_detected: bool,
    pub bounding_box: Option<Rect>,
    pub roll: Option<f64>,
    pub pitch: Option<f64>,
    pub yaw: Option<f64>,
    pub quality: Option<f32>,
    pub layout_guide: Rect,
    pub captured: Vec<CaptureRecord>,
    pub last_error: Option<String>,
}

impl StateSnapshot {
    /// Most recent stored location for a pose. `Center` appears twice in the
    /// standard sequence; this returns the later capture.
    pub fn location_for(&self, pose: Pose) -> Option<&Path> {
        self.captured
            .iter()
            .rev()
            .find(|r| r.pose == pose)
            .map(|r| r.location.as_path())
    }
}

/// Instruction to request one still from the frame source.
#[derive(Debug)]
pub(crate) struct HoldCompletion {
    pub run_id: Uuid,
    pub pose: Pose,
    pub step: usize,
}

/// Instruction to persist a received still.
#[derive(Debug)]
pub(crate) struct PersistRequest {
    pub run_id: Uuid,
    pub pose: Pose,
    pub step: usize,
    pub image: CapturedImage,
}

/// What a persist completion did to the run.
#[derive(Debug)]
pub(crate) enum StepOutcome {
    Stored {
        record: CaptureRecord,
        finished: bool,
    },
    RunFailed {
        reason: String,
    },
}

pub(crate) struct Controller {
    hold: HoldTimer,
    layout_guide: Rect,
    stage: VerificationStage,
    index: usize,
    active: Option<Pose>,
    run_id: Option<Uuid>,
    latest_geometry: Observation<FaceGeometry>,
    latest_quality: Observation<FaceQuality>,
    validation: ValidationState,
    hold_progress: f32,
    captured: Vec<CaptureRecord>,
    last_error: Option<String>,
    // Set by stop(), cleared by start(). While set, ticks are skipped and
    // in-flight completions are discarded on arrival.
    halted: bool,
    // One capture pipeline at a time: set when a hold completes, cleared when
    // the capture errors or its persist completion lands.
    capture_in_flight: bool,
}

impl Controller {
    pub(crate) fn new(hold_duration: Duration, layout_guide: Rect) -> Self {
        Self {
            hold: HoldTimer::new(hold_duration),
            layout_guide,
            stage: VerificationStage::NotStarted,
            index: 0,
            active: None,
            run_id: None,
            latest_geometry: Observation::NotFound,
            latest_quality: Observation::NotFound,
            validation: ValidationState::default(),
            hold_progress: 0.0,
            captured: Vec::new(),
            last_error: None,
            halted: false,
            capture_in_flight: false,
        }
    }

    /// Begin a fresh run. Safe to call at any time; an in-flight run is
    /// abandoned (its completions no longer match the new run id).
    pub(crate) fn start(&mut self) -> Uuid {
        let sequence = standard_sequence();
        let run_id = Uuid::new_v4();
        self.active = sequence.first().copied();
        self.stage = VerificationStage::InProgress { sequence };
        self.index = 0;
        self.run_id = Some(run_id);
        self.latest_geometry = Observation::NotFound;
        self.latest_quality = Observation::NotFound;
        self.validation = ValidationState::default();
        self.hold.reset();
        self.hold_progress = 0.0;
        self.captured.clear();
        self.last_error = None;
        self.halted = false;
        self.capture_in_flight = false;
        tracing::info!(run_id = %run_id, steps = self.sequence_len(), "verification run started");
        run_id
    }

    /// Suppress further captures. In-flight capture and persist completions
    /// are discarded when they arrive. Idempotent; state survives for
    /// inspection until `reset` or `start`.
    pub(crate) fn stop(&mut self) {
        if self.halted {
            return;
        }
        self.halted = true;
        self.hold.reset();
        self.hold_progress = 0.0;
        tracing::debug!("verifier stopped, further captures suppressed");
    }

    /// Drop all run state back to `NotStarted`. Idempotent. The halted flag
    /// is left alone; only `start` clears it.
    pub(crate) fn reset(&mut self) {
        self.stage = VerificationStage::NotStarted;
        self.index = 0;
        self.active = None;
        self.run_id = None;
        self.latest_geometry = Observation::NotFound;
        self.latest_quality = Observation::NotFound;
        self.validation = ValidationState::default();
        self.hold.reset();
        self.hold_progress = 0.0;
        self.captured.clear();
        self.last_error = None;
        self.capture_in_flight = false;
        tracing::debug!("verifier state reset");
    }

    /// Re-centre the layout guide within a changed viewport, preserving the
    /// guide's size.
    pub(crate) fn layout_changed(&mut self, viewport: Rect) {
        self.layout_guide = self.layout_guide.recentered_within(&viewport);
        tracing::debug!(guide = ?self.layout_guide, "layout guide recentred");
    }

    pub(crate) fn geometry_frame(&mut self, obs: Observation<FaceGeometry>) {
        match (&obs, self.active) {
            (Observation::Found(geometry), Some(pose)) => {
                self.validation
                    .apply_geometry(pose, geometry, &self.layout_guide);
            }
            (Observation::Found(_), None) => {}
            // No face or a detector error invalidates everything at once,
            // including the quality flag a stale frame may have set.
            _ => self.validation = ValidationState::default(),
        }
        self.latest_geometry = obs;
        self.reset_hold_if_invalid();
    }

    pub(crate) fn quality_frame(&mut self, obs: Observation<FaceQuality>) {
        match &obs {
            Observation::Found(quality) => self.validation.apply_quality(quality.score),
            // Quality outages only clear the quality flag; the geometry
            // channel owns full invalidation.
            _ => self.validation.quality_ok = false,
        }
        self.latest_quality = obs;
        self.reset_hold_if_invalid();
    }

    /// Advance the hold timer by one interval. Returns a capture instruction
    /// when the active pose's hold just completed.
    pub(crate) fn tick(&mut self, dt: Duration) -> Option<HoldCompletion> {
        if self.halted || self.capture_in_flight || !self.stage.is_in_progress() {
            return None;
        }
        let out = self.hold.tick(dt, self.validation.is_valid());
        self.hold_progress = out.progress;
        if !out.completed {
            return None;
        }
        let run_id = self.run_id?;
        let pose = self.active?;
        self.capture_in_flight = true;
        tracing::info!(pose = %pose, step = self.index, "hold completed, requesting capture");
        Some(HoldCompletion {
            run_id,
            pose,
            step: self.index,
        })
    }

    /// Handle a frame-source completion. Returns the persist instruction for
    /// a usable image; a failed capture keeps the user on the current pose.
    pub(crate) fn capture_result(
        &mut self,
        run_id: Uuid,
        result: Result<CapturedImage, CaptureError>,
    ) -> Option<PersistRequest> {
        if !self.accepts_completion(run_id) {
            tracing::warn!(run_id = %run_id, "discarding stale capture completion");
            return None;
        }
        match result {
            Ok(image) => {
                let Some(pose) = self.active else {
                    self.capture_in_flight = false;
                    return None;
                };
                Some(PersistRequest {
                    run_id,
                    pose,
                    step: self.index,
                    image,
                })
            }
            Err(e) => {
                self.capture_in_flight = false;
                tracing::warn!(error = %e, "capture failed, staying on pose");
                None
            }
        }
    }

    /// Handle a store completion: advance the sequence, finish the run, or
    /// fail it.
    pub(crate) fn persist_result(
        &mut self,
        run_id: Uuid,
        result: Result<PathBuf, StoreError>,
    ) -> Option<StepOutcome> {
        if !self.accepts_completion(run_id) {
            tracing::warn!(run_id = %run_id, "discarding stale persist completion");
            return None;
        }
        self.capture_in_flight = false;
        match result {
            Ok(location) => {
                let Some(pose) = self.active else {
                    return None;
                };
                let record = CaptureRecord {
                    step: self.index,
                    pose,
                    location,
                    captured_at: chrono::Utc::now(),
                };
                self.captured.push(record.clone());

                let finished = self.index + 1 >= self.sequence_len();
                if finished {
                    self.stage = VerificationStage::Success;
                    self.active = Some(Pose::Done);
                    self.hold.reset();
                    self.hold_progress = 0.0;
                    tracing::info!(
                        run_id = %run_id,
                        captures = self.captured.len(),
                        "verification succeeded"
                    );
                } else {
                    self.index += 1;
                    let next = self.stage.sequence().and_then(|s| s.get(self.index).copied());
                    self.active = next;
                    // Acceptance windows are pose-specific; nothing validated
                    // for the previous pose may carry over.
                    self.validation = ValidationState::default();
                    self.hold.reset();
                    self.hold_progress = 0.0;
                    if let Some(next) = next {
                        tracing::info!(pose = %next, step = self.index, "advanced to next pose");
                    }
                }
                Some(StepOutcome::Stored { record, finished })
            }
            Err(e) => {
                let reason = e.to_string();
                self.stage = VerificationStage::Failed;
                self.last_error = Some(reason.clone());
                self.hold.reset();
                self.hold_progress = 0.0;
                tracing::error!(error = %reason, step = self.index, "persistence failed, run failed");
                Some(StepOutcome::RunFailed { reason })
            }
        }
    }

    pub(crate) fn snapshot(&self) -> StateSnapshot {
        let geometry = self.latest_geometry.found();
        StateSnapshot {
            stage: self.stage.clone(),
            active_pose: self.active,
            sequence_index: self.index,
            sequence_len: self.sequence_len(),
            run_id: self.run_id,
            validation: self.validation,
            has_valid_face: self.validation.is_valid(),
            hold_progress: self.hold_progress,
            face_detected: self.latest_geometry.is_found(),
            bounding_box: geometry.map(|g| g.bounding_box),
            roll: geometry.map(|g| g.roll),
            pitch: geometry.map(|g| g.pitch),
            yaw: geometry.map(|g| g.yaw),
            quality: self.latest_quality.found().map(|q| q.score),
            layout_guide: self.layout_guide,
            captured: self.captured.clone(),
            last_error: self.last_error.clone(),
        }
    }

    fn sequence_len(&self) -> usize {
        self.stage.sequence().map_or(0, |s| s.len())
    }

    fn reset_hold_if_invalid(&mut self) {
        if !self.validation.is_valid() {
            self.hold.reset();
            self.hold_progress = 0.0;
        }
    }

    /// A completion only counts for the run that issued it, and only while
    /// that run is still live.
    fn accepts_completion(&self, run_id: Uuid) -> bool {
        !self.halted && self.stage.is_in_progress() && self.run_id == Some(run_id)
    }
}
