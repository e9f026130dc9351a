use std::path::PathBuf;
use std::time::Duration;

use mirada_core::Rect;

/// Verifier configuration, loaded from environment variables.
pub struct VerifierConfig {
    /// How long a valid pose must be held before its capture fires.
    pub hold_duration: Duration,
    /// Interval between hold-timer ticks.
    pub tick_interval: Duration,
    /// Face guide rectangle, in the same coordinate space as incoming
    /// bounding boxes.
    pub layout_guide: Rect,
    /// Mailbox depth for the verifier actor.
    pub queue_depth: usize,
    /// Directory where captured stills are persisted.
    pub capture_dir: PathBuf,
}

impl VerifierConfig {
    /// Load configuration from `MIRADA_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let capture_dir = std::env::var("MIRADA_CAPTURE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_capture_dir());

        let viewport_w = env_f64("MIRADA_VIEWPORT_W", 1080.0);
        let viewport_h = env_f64("MIRADA_VIEWPORT_H", 1920.0);

        Self {
            hold_duration: Duration::from_millis(env_u64("MIRADA_HOLD_MS", 3000)),
            tick_interval: Duration::from_millis(env_u64("MIRADA_TICK_MS", 100)),
            layout_guide: guide_for_viewport(viewport_w, viewport_h),
            queue_depth: env_usize("MIRADA_QUEUE_DEPTH", 64),
            capture_dir,
        }
    }

    /// Configuration for a viewport of the given size, with defaults for
    /// everything else. The guide is re-derived from the viewport; callers
    /// that learn the real layout later update it via the verifier handle.
    pub fn for_viewport(width: f64, height: f64) -> Self {
        Self {
            layout_guide: guide_for_viewport(width, height),
            ..Self::default()
        }
    }
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            hold_duration: Duration::from_secs(3),
            tick_interval: Duration::from_millis(100),
            layout_guide: guide_for_viewport(1080.0, 1920.0),
            queue_depth: 64,
            capture_dir: default_capture_dir(),
        }
    }
}

/// Face guide placement within a viewport: centred 80% of the width,
/// middle half of the height starting a quarter of the way down.
pub fn guide_for_viewport(width: f64, height: f64) -> Rect {
    Rect::new(width * 0.1, height * 0.25, width * 0.8, height * 0.5)
}

fn default_capture_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("mirada/captures")
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
