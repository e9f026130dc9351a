//! mirada-core — pure pose verification primitives.
//!
//! Everything in this crate is synchronous and side-effect free: frame
//! observations come in as plain values, validation windows and hold
//! progress come out as plain values. Camera access, timers, and capture
//! persistence live in `mirada-engine`, which drives these types from its
//! actor loop.
//!
//! The flow through the crate mirrors a verification run:
//!
//! 1. **geometry** – viewport rectangles and the face guide placement.
//! 2. **observation** – per-frame face geometry and quality channels.
//! 3. **pose** – the target poses, the fixed sequence, and run stages.
//! 4. **validate** – per-pose bounds, angle, and quality windows.
//! 5. **hold** – the steady-hold countdown that gates each capture.

pub mod geometry;
pub mod hold;
pub mod observation;
pub mod pose;
pub mod validate;

pub use geometry::Rect;
pub use hold::{HoldTick, HoldTimer};
pub use observation::{DetectionError, FaceGeometry, FaceQuality, Observation};
pub use pose::{standard_sequence, Pose, VerificationStage, STANDARD_SEQUENCE};
pub use validate::{BoundsState, ValidationState};
