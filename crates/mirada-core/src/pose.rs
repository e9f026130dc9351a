//! Target head poses and the run-level verification stage.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A target head orientation the user must hold, plus the terminal `Done`
/// marker shown after the last step completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pose {
    Center,
    Up,
    Down,
    Left,
    Right,
    Done,
}

impl Pose {
    /// Stable lowercase key, used for storage naming and log fields.
    pub fn key(&self) -> &'static str {
        match self {
            Pose::Center => "center",
            Pose::Up => "up",
            Pose::Down => "down",
            Pose::Left => "left",
            Pose::Right => "right",
            Pose::Done => "done",
        }
    }

    /// Inverse of [`Pose::key`]. Unknown keys return `None` so callers can
    /// skip foreign entries when scanning stored captures.
    pub fn from_key(key: &str) -> Option<Pose> {
        match key {
            "center" => Some(Pose::Center),
            "up" => Some(Pose::Up),
            "down" => Some(Pose::Down),
            "left" => Some(Pose::Left),
            "right" => Some(Pose::Right),
            "done" => Some(Pose::Done),
            _ => None,
        }
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// The fixed pose order for one verification run.
///
/// Centre anchors both ends so the run starts and finishes with a frontal
/// capture; the off-axis poses alternate vertical and horizontal turns.
pub const STANDARD_SEQUENCE: [Pose; 6] = [
    Pose::Center,
    Pose::Up,
    Pose::Left,
    Pose::Down,
    Pose::Right,
    Pose::Center,
];

/// The sequence for a fresh run. Built once per `start`; replaced wholesale
/// on reset, never mutated in place.
pub fn standard_sequence() -> Vec<Pose> {
    STANDARD_SEQUENCE.to_vec()
}

/// Run-level status of the verification sequence.
///
/// `InProgress` carries the exact sequence in effect for the run; the
/// controller's step index is only meaningful in that state and always
/// satisfies `index < sequence.len()`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum VerificationStage {
    NotStarted,
    InProgress { sequence: Vec<Pose> },
    Success,
    Failed,
}

impl VerificationStage {
    pub fn is_in_progress(&self) -> bool {
        matches!(self, VerificationStage::InProgress { .. })
    }

    /// The sequence in effect, when a run is in progress.
    pub fn sequence(&self) -> Option<&[Pose]> {
        match self {
            VerificationStage::InProgress { sequence } => Some(sequence),
            _ => None,
        }
    }
}

impl fmt::Display for VerificationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationStage::NotStarted => write!(f, "Not Started"),
            VerificationStage::InProgress { sequence } => {
                write!(f, "In Progress ({} steps)", sequence.len())
            }
            VerificationStage::Success => write!(f, "Success"),
            VerificationStage::Failed => write!(f, "Failed"),
        }
    }
}
