//! Per-frame pose validation against geometric and quality windows.
//!
//! Every camera frame yields (up to) a face geometry observation and a
//! capture-quality observation. This module classifies the detected bounding
//! box relative to the on-screen layout guide and checks the head angles
//! against acceptance windows selected by the current target pose. The
//! functions here are pure: identical inputs always produce identical
//! results, and fusing the partial results into a validity verdict is the
//! caller's job (the engine feeds the verdict to the hold timer).
//!
//! # Acceptance windows
//!
//! The numeric windows are load-bearing compatibility constants, checked
//! bit-for-bit by the tests below. All comparisons are strict: a bounding box
//! exactly at a size boundary is acceptable, an angle exactly at a window
//! edge is not inside the window.
//!
//! The centre pose uses tighter size multipliers than the off-axis poses: a
//! turned or tilted head projects a smaller, rotated bounding box, so the
//! same face legitimately occupies less of the guide when looking away from
//! the camera.

use serde::Serialize;

use crate::geometry::Rect;
use crate::observation::FaceGeometry;
use crate::pose::Pose;

/// Centre pose: box wider than this fraction of the guide is too large.
pub const CENTER_LARGE_RATIO: f64 = 0.95;
/// Centre pose: box narrower than `guide.width / this` is too small.
pub const CENTER_SMALL_RATIO: f64 = 1.5;
/// Off-axis poses: relaxed large-side multiplier.
pub const OFF_AXIS_LARGE_RATIO: f64 = 1.4;
/// Off-axis poses: relaxed small-side multiplier.
pub const OFF_AXIS_SMALL_RATIO: f64 = 2.0;
/// Maximum distance between box centre and guide centre, per axis, in the
/// host's logical coordinate units.
pub const OFF_CENTRE_TOLERANCE: f64 = 75.0;
/// Minimum capture-quality score, pose-independent.
pub const MIN_CAPTURE_QUALITY: f32 = 0.2;

/// Classification of the detected face's bounding box against the guide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundsState {
    /// No usable geometry this frame (no face, or detector error).
    #[default]
    Unknown,
    TooSmall,
    TooLarge,
    OffCentre,
    /// Appropriate size and position.
    Appropriate,
}

/// Per-axis angle acceptability for one frame against one target pose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AngleChecks {
    pub roll_ok: bool,
    pub pitch_ok: bool,
    pub yaw_ok: bool,
}

/// Derived validation flags for the current frame, recomputed as
/// observations arrive and reset whenever the target pose changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ValidationState {
    pub bounds: BoundsState,
    pub roll_ok: bool,
    pub pitch_ok: bool,
    pub yaw_ok: bool,
    pub quality_ok: bool,
}

impl ValidationState {
    /// The frame is valid when the box is appropriate and every axis and the
    /// quality gate pass.
    pub fn is_valid(&self) -> bool {
        self.bounds == BoundsState::Appropriate
            && self.roll_ok
            && self.pitch_ok
            && self.yaw_ok
            && self.quality_ok
    }

    /// Apply a fresh geometry measurement, leaving the quality flag alone.
    /// The quality gate arrives on its own channel and is applied separately.
    pub fn apply_geometry(&mut self, pose: Pose, geometry: &FaceGeometry, guide: &Rect) {
        self.bounds = acceptable_bounds(pose, &geometry.bounding_box, guide);
        let angles = acceptable_angles(pose, geometry.roll, geometry.pitch, geometry.yaw);
        self.roll_ok = angles.roll_ok;
        self.pitch_ok = angles.pitch_ok;
        self.yaw_ok = angles.yaw_ok;
    }

    /// Apply a fresh quality measurement.
    pub fn apply_quality(&mut self, score: f32) {
        self.quality_ok = acceptable_quality(score);
    }
}

/// Classify the bounding box against the layout guide for the given pose.
pub fn acceptable_bounds(pose: Pose, bounding_box: &Rect, guide: &Rect) -> BoundsState {
    let (large, small) = if pose == Pose::Center {
        (CENTER_LARGE_RATIO, CENTER_SMALL_RATIO)
    } else {
        (OFF_AXIS_LARGE_RATIO, OFF_AXIS_SMALL_RATIO)
    };

    if bounding_box.width > large * guide.width {
        return BoundsState::TooLarge;
    }

    if bounding_box.width * small < guide.width {
        return BoundsState::TooSmall;
    }

    if (bounding_box.center_x() - guide.center_x()).abs() > OFF_CENTRE_TOLERANCE
        || (bounding_box.center_y() - guide.center_y()).abs() > OFF_CENTRE_TOLERANCE
    {
        return BoundsState::OffCentre;
    }

    BoundsState::Appropriate
}

/// Check head angles (radians) against the acceptance windows for the pose.
pub fn acceptable_angles(pose: Pose, roll: f64, pitch: f64, yaw: f64) -> AngleChecks {
    let roll_in_window = roll > 1.0 && roll < 3.0;
    match pose {
        Pose::Center => AngleChecks {
            roll_ok: roll_in_window,
            pitch_ok: pitch.abs() < 0.15,
            yaw_ok: yaw.abs() < 0.15,
        },
        Pose::Up => AngleChecks {
            roll_ok: roll_in_window,
            pitch_ok: pitch < -0.20 && pitch > -0.80,
            yaw_ok: true,
        },
        Pose::Down => AngleChecks {
            roll_ok: roll_in_window,
            pitch_ok: pitch > 0.10 && pitch < 0.80,
            yaw_ok: true,
        },
        Pose::Left => AngleChecks {
            roll_ok: roll_in_window,
            pitch_ok: true,
            yaw_ok: yaw < -0.10,
        },
        Pose::Right => AngleChecks {
            roll_ok: roll_in_window,
            pitch_ok: true,
            yaw_ok: yaw > 0.10,
        },
        Pose::Done => AngleChecks {
            roll_ok: true,
            pitch_ok: true,
            yaw_ok: true,
        },
    }
}

/// Pose-independent quality gate.
pub fn acceptable_quality(score: f32) -> bool {
    score >= MIN_CAPTURE_QUALITY
}
