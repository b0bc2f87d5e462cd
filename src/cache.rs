use anyhow::Result;
use std::path::PathBuf;
use tracing::{debug, info};

/// Filesystem-backed fingerprint cache for the scan working directory.
///
/// An entry is implicit: the existence of a fingerprint artifact for a clip
/// identifier *is* the entry. Presence means "fingerprinting was already
/// attempted for this clip", independent of whether identification later
/// succeeded. The core never expires or deletes artifacts, so the cache
/// doubles as the only resumability the scanner has across runs.
#[derive(Debug, Clone)]
pub struct FingerprintCache {
    work_dir: PathBuf,
}

impl FingerprintCache {
    pub fn new(work_dir: PathBuf) -> Self {
        Self { work_dir }
    }

    /// Create the scan working directory if it does not exist yet.
    pub async fn initialize(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.work_dir).await?;
        info!("📁 Scan working directory ready: {}", self.work_dir.display());
        Ok(())
    }

    /// Destination for the downloaded media of a clip.
    pub fn media_path(&self, clip_id: &str) -> PathBuf {
        self.work_dir.join(format!("{clip_id}.mp4"))
    }

    /// Deterministic location of the fingerprint artifact for a clip. The
    /// extractor tool writes its output next to the media file with a
    /// `.cli.lo` suffix.
    pub fn artifact_path(&self, clip_id: &str) -> PathBuf {
        self.work_dir.join(format!("{clip_id}.mp4.cli.lo"))
    }

    /// Whether a fingerprint artifact exists for the clip.
    pub async fn has(&self, clip_id: &str) -> bool {
        let hit = tokio::fs::try_exists(self.artifact_path(clip_id))
            .await
            .unwrap_or(false);
        if hit {
            debug!("Fingerprint already exists for {clip_id}");
        }
        hit
    }

    /// Number of fingerprint artifacts currently cached.
    pub async fn artifact_count(&self) -> Result<usize> {
        let mut count = 0;
        let mut entries = tokio::fs::read_dir(&self.work_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.path().extension().map_or(false, |ext| ext == "lo") {
                count += 1;
            }
        }
        Ok(count)
    }
}
