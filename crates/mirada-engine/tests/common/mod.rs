//! Shared stubs and builders for verifier integration tests.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use mirada_core::{FaceGeometry, FaceQuality, Observation, Pose, Rect};
use mirada_engine::{
    CaptureError, CaptureStore, CapturedImage, FrameSource, StoreError, VerifierConfig,
    VerifierHandle,
};
use tokio::sync::Notify;

pub const TICK: std::time::Duration = std::time::Duration::from_millis(100);
pub const TICKS_PER_HOLD: usize = 30;

/// Route verifier logs through the test harness; `RUST_LOG` controls the
/// level. Safe to call from every test, only the first call installs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn guide() -> Rect {
    Rect::new(100.0, 500.0, 800.0, 1000.0)
}

pub fn config() -> VerifierConfig {
    VerifierConfig {
        layout_guide: guide(),
        ..VerifierConfig::default()
    }
}

pub fn jpeg_stub() -> Vec<u8> {
    vec![0xff, 0xd8, 0xff, 0xe0]
}

/// Geometry that validates for the given pose inside `guide()`.
pub fn valid_geometry(pose: Pose) -> Observation<FaceGeometry> {
    let (pitch, yaw) = match pose {
        Pose::Center | Pose::Done => (0.0, 0.0),
        Pose::Up => (-0.5, 0.0),
        Pose::Down => (0.5, 0.0),
        Pose::Left => (0.0, -0.5),
        Pose::Right => (0.0, 0.5),
    };
    Observation::Found(FaceGeometry {
        // 80% of the guide width, centred on the guide.
        bounding_box: Rect::new(180.0, 680.0, 640.0, 640.0),
        roll: 2.0,
        pitch,
        yaw,
    })
}

pub fn good_quality() -> Observation<FaceQuality> {
    Observation::Found(FaceQuality { score: 0.5 })
}

/// Feed one valid geometry/quality pair for the pose and wait until applied.
pub async fn feed_valid(handle: &VerifierHandle, pose: Pose) {
    handle.geometry_frame(valid_geometry(pose)).await.unwrap();
    handle.quality_frame(good_quality()).await.unwrap();
}

/// Advance virtual time one tick at a time, letting the actor observe each.
pub async fn advance_ticks(n: usize) {
    for _ in 0..n {
        tokio::time::advance(TICK).await;
        tokio::task::yield_now().await;
    }
}

/// Let spawned capture/persist tasks and the actor run without moving time.
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

// ── Frame source stubs ────────────────────────────────────────────────────────

/// Returns a stub image immediately on every request.
pub struct InstantFrames;

#[async_trait]
impl FrameSource for InstantFrames {
    async fn capture_still(&self) -> Result<CapturedImage, CaptureError> {
        Ok(CapturedImage::new(jpeg_stub()))
    }
}

/// Fails the first `failures` requests, then behaves like [`InstantFrames`].
pub struct FlakyFrames {
    failures: AtomicUsize,
}

impl FlakyFrames {
    pub fn failing_first(failures: usize) -> Self {
        Self {
            failures: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl FrameSource for FlakyFrames {
    async fn capture_still(&self) -> Result<CapturedImage, CaptureError> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(CaptureError::Failed("stub shutter jam".into()));
        }
        Ok(CapturedImage::new(jpeg_stub()))
    }
}

/// Blocks each request until the test calls [`GatedFrames::release`], so the
/// test controls exactly when a capture completion lands.
pub struct GatedFrames {
    gate: Notify,
}

impl GatedFrames {
    pub fn new() -> Self {
        Self {
            gate: Notify::new(),
        }
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl FrameSource for GatedFrames {
    async fn capture_still(&self) -> Result<CapturedImage, CaptureError> {
        self.gate.notified().await;
        Ok(CapturedImage::new(jpeg_stub()))
    }
}

// ── Capture store stubs ───────────────────────────────────────────────────────

/// Records saves in memory and hands out synthetic locations.
#[derive(Default)]
pub struct MemoryStore {
    saves: Mutex<Vec<(Pose, Vec<u8>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saved_poses(&self) -> Vec<Pose> {
        self.saves.lock().unwrap().iter().map(|(p, _)| *p).collect()
    }
}

#[async_trait]
impl CaptureStore for MemoryStore {
    async fn save(&self, image: &CapturedImage, pose: Pose) -> Result<PathBuf, StoreError> {
        let mut saves = self.saves.lock().unwrap();
        let location = PathBuf::from(format!("/captures/{}_{}.jpg", pose.key(), saves.len()));
        saves.push((pose, image.data.clone()));
        Ok(location)
    }

    async fn list(&self) -> Result<Vec<(Pose, PathBuf)>, StoreError> {
        Ok(self
            .saves
            .lock()
            .unwrap()
            .iter()
            .enumerate()
            .map(|(i, (pose, _))| (*pose, PathBuf::from(format!("/captures/{}_{i}.jpg", pose.key()))))
            .collect())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.saves.lock().unwrap().clear();
        Ok(())
    }
}

/// Succeeds until the save with index `fail_at` (zero-based), which errors.
pub struct FailingStore {
    fail_at: usize,
    calls: AtomicUsize,
}

impl FailingStore {
    pub fn failing_at(fail_at: usize) -> Self {
        Self {
            fail_at,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CaptureStore for FailingStore {
    async fn save(&self, _image: &CapturedImage, pose: Pose) -> Result<PathBuf, StoreError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call == self.fail_at {
            return Err(StoreError::Io(std::io::Error::other("stub disk full")));
        }
        Ok(PathBuf::from(format!("/captures/{}_{call}.jpg", pose.key())))
    }

    async fn list(&self) -> Result<Vec<(Pose, PathBuf)>, StoreError> {
        Ok(Vec::new())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
