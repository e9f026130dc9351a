use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use mirada_core::Pose;
use thiserror::Error;

use crate::capture::CapturedImage;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("capture store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("refusing to store empty capture")]
    EmptyImage,
}

/// Persistence boundary for captured stills.
///
/// The verifier hands each capture to the store exactly once, after the
/// pose's hold completed. A store failure fails the whole verification run,
/// so implementations should only return errors for genuinely lost data.
#[async_trait]
pub trait CaptureStore: Send + Sync {
    /// Persist one still for the given pose and return its location.
    async fn save(&self, image: &CapturedImage, pose: Pose) -> Result<PathBuf, StoreError>;

    /// All stored captures with the pose each was taken for, in name order.
    async fn list(&self) -> Result<Vec<(Pose, PathBuf)>, StoreError>;

    /// Delete every stored capture. Files not produced by this store are
    /// left alone.
    async fn clear(&self) -> Result<(), StoreError>;
}

// ── Filesystem store ──────────────────────────────────────────────────────────

/// Directory-backed capture store.
///
/// Files are named `{pose}_{unix_millis}_{seq}.jpg` and written via a
/// temporary `.part` file renamed into place, so a crash mid-write never
/// leaves a truncated capture behind.
pub struct FsCaptureStore {
    root: PathBuf,
    // Millisecond timestamps collide when captures land close together;
    // the sequence suffix keeps names unique within one store.
    seq: AtomicU64,
}

impl FsCaptureStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            seq: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn next_file_name(&self, pose: Pose) -> String {
        let millis = chrono::Utc::now().timestamp_millis();
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        format!("{}_{millis}_{seq:04}.jpg", pose.key())
    }
}

/// Parse the pose back out of a file name this store produced:
/// `{pose}_{...}.jpg`. `None` for foreign files.
fn capture_file_pose(path: &Path) -> Option<Pose> {
    if path.extension().and_then(|e| e.to_str()) != Some("jpg") {
        return None;
    }
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.split('_').next())
        .and_then(Pose::from_key)
}

#[async_trait]
impl CaptureStore for FsCaptureStore {
    async fn save(&self, image: &CapturedImage, pose: Pose) -> Result<PathBuf, StoreError> {
        if image.is_empty() {
            return Err(StoreError::EmptyImage);
        }

        tokio::fs::create_dir_all(&self.root).await?;

        let final_path = self.root.join(self.next_file_name(pose));
        let tmp_path = final_path.with_extension("jpg.part");

        tokio::fs::write(&tmp_path, &image.data).await?;
        tokio::fs::rename(&tmp_path, &final_path).await?;

        tracing::debug!(
            pose = %pose,
            path = %final_path.display(),
            bytes = image.data.len(),
            "stored capture"
        );
        Ok(final_path)
    }

    async fn list(&self) -> Result<Vec<(Pose, PathBuf)>, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if let Some(pose) = capture_file_pose(&path) {
                files.push((pose, path));
            }
        }
        files.sort_by(|a, b| a.1.cmp(&b.1));
        Ok(files)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        for (_, path) in self.list().await? {
            tokio::fs::remove_file(&path).await?;
        }
        tracing::debug!(path = %self.root.display(), "cleared captures");
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "mirada-store-test-{tag}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ))
    }

    fn jpeg_stub() -> CapturedImage {
        CapturedImage::new(vec![0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10])
    }

    #[tokio::test]
    async fn test_save_and_list() {
        let root = temp_root("save-list");
        let store = FsCaptureStore::new(&root);

        let center = store.save(&jpeg_stub(), Pose::Center).await.unwrap();
        let up = store.save(&jpeg_stub(), Pose::Up).await.unwrap();

        assert!(center.file_name().unwrap().to_str().unwrap().starts_with("center_"));
        assert!(up.file_name().unwrap().to_str().unwrap().starts_with("up_"));
        assert_eq!(tokio::fs::read(&center).await.unwrap(), jpeg_stub().data);

        let files = store.list().await.unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.contains(&(Pose::Center, center)));
        assert!(files.contains(&(Pose::Up, up)));

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn test_same_pose_saves_do_not_collide() {
        let root = temp_root("collide");
        let store = FsCaptureStore::new(&root);

        let first = store.save(&jpeg_stub(), Pose::Center).await.unwrap();
        let second = store.save(&jpeg_stub(), Pose::Center).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(store.list().await.unwrap().len(), 2);

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_empty_image() {
        let root = temp_root("empty");
        let store = FsCaptureStore::new(&root);

        let err = store
            .save(&CapturedImage::new(Vec::new()), Pose::Left)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::EmptyImage));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_skips_foreign_files() {
        let root = temp_root("foreign");
        let store = FsCaptureStore::new(&root);

        let saved = store.save(&jpeg_stub(), Pose::Right).await.unwrap();
        tokio::fs::write(root.join("notes.txt"), b"not a capture")
            .await
            .unwrap();
        tokio::fs::write(root.join("selfie_123.jpg"), b"wrong prefix")
            .await
            .unwrap();

        let files = store.list().await.unwrap();
        assert_eq!(files, vec![(Pose::Right, saved)]);

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn test_clear_keeps_foreign_files() {
        let root = temp_root("clear");
        let store = FsCaptureStore::new(&root);

        store.save(&jpeg_stub(), Pose::Down).await.unwrap();
        store.save(&jpeg_stub(), Pose::Center).await.unwrap();
        let foreign = root.join("notes.txt");
        tokio::fs::write(&foreign, b"keep me").await.unwrap();

        store.clear().await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
        assert!(tokio::fs::try_exists(&foreign).await.unwrap());

        // Idempotent on an already-clean store.
        store.clear().await.unwrap();

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_on_missing_dir_is_empty() {
        let store = FsCaptureStore::new(temp_root("missing"));
        assert!(store.list().await.unwrap().is_empty());
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_no_part_files_left_behind() {
        let root = temp_root("part");
        let store = FsCaptureStore::new(&root);
        store.save(&jpeg_stub(), Pose::Up).await.unwrap();

        let mut entries = tokio::fs::read_dir(&root).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            let name = entry.file_name();
            let name = name.to_str().unwrap();
            assert!(!name.ends_with(".part"), "leftover temp file {name}");
        }

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }
}
