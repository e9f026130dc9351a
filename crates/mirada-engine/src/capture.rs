//! Still-capture source boundary.
//!
//! The verifier never talks to a camera directly. When a hold completes it
//! asks a [`FrameSource`] for one encoded still, and everything behind that
//! call (sensor, encoder, platform SDK) stays out of the actor. Tests plug
//! in stub sources to script slow, failing, or instant captures.

use async_trait::async_trait;
use thiserror::Error;

/// One encoded still image as produced by the capture pipeline.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    /// Encoded image bytes (typically JPEG).
    pub data: Vec<u8>,
}

impl CapturedImage {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture source unavailable: {0}")]
    Unavailable(String),
    #[error("capture failed: {0}")]
    Failed(String),
}

/// Source of single still frames, requested once per completed hold.
///
/// `capture_still` may take arbitrarily long; the verifier keeps servicing
/// state reads while it is in flight and discards the result if the run was
/// stopped or reset in the meantime.
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn capture_still(&self) -> Result<CapturedImage, CaptureError>;
}
