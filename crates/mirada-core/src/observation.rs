//! Per-frame observations delivered by the external detection pipeline.
//!
//! The frame source produces two independent streams at camera frame rate:
//! face geometry (bounding box + head angles) and capture quality. The two
//! streams are not paired — a quality observation may lag or lead the
//! geometry observation for the same frame by one or more frames — so each
//! is modelled as its own [`Observation`] value and the controller caches
//! the latest of each.

use serde::Serialize;
use thiserror::Error;

use crate::geometry::Rect;

/// Face geometry reported for a single frame.
///
/// Angles are in radians, exactly as reported by the detection backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceGeometry {
    pub bounding_box: Rect,
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

/// Capture-quality score reported for a single frame, higher is better.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FaceQuality {
    pub score: f32,
}

/// Failure reported by the detection backend in place of an observation.
///
/// Treated exactly like a no-face frame: transient, absorbed by the
/// validation layer, never fatal to a run.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("face detection failed: {reason}")]
pub struct DetectionError {
    pub reason: String,
}

impl DetectionError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// One frame's worth of output from a detection channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Observation<T> {
    /// No face was found in the frame.
    #[default]
    NotFound,
    /// The detector itself failed for this frame.
    Errored(DetectionError),
    /// A face was found and measured.
    Found(T),
}

impl<T> Observation<T> {
    /// The measurement, if a face was found.
    pub fn found(&self) -> Option<&T> {
        match self {
            Observation::Found(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Observation::Found(_))
    }
}
