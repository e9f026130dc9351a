//! mirada-engine — the verification run as a tokio actor.
//!
//! The host owns a [`VerifierHandle`] and feeds it per-frame geometry and
//! quality observations; the spawned task validates them against the active
//! pose, drives the hold timer from its own interval, requests a still from
//! the injected [`FrameSource`] when a hold completes, and hands the image to
//! the injected [`CaptureStore`]. Progress is observable two ways: a `watch`
//! channel with the latest [`StateSnapshot`], and a stream of
//! [`VerificationEvent`]s for the moments a UI reacts to.

pub mod capture;
pub mod config;
pub mod controller;
pub mod engine;
pub mod store;

pub use capture::{CaptureError, CapturedImage, FrameSource};
pub use config::{guide_for_viewport, VerifierConfig};
pub use controller::{CaptureRecord, StateSnapshot, VerificationEvent};
pub use engine::{spawn_verifier, VerifierError, VerifierHandle};
pub use store::{CaptureStore, FsCaptureStore, StoreError};
