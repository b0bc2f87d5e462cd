use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::clip::{Clip, ScanOutcome, Song};
use crate::error::ScanError;

/// Persistent record of a processed clip, keyed by slug.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipRecord {
    pub slug: String,
    pub creation_stamp: i64,
    pub views: u64,
    pub channel: String,
    pub identified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint_failed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub song: Option<Song>,
}

/// Build the persistent record for a processed clip.
pub fn make_record(clip: &Clip, channel: &str) -> ClipRecord {
    let identified = matches!(clip.outcome, Some(ScanOutcome::Matched));
    ClipRecord {
        slug: clip.id.clone(),
        creation_stamp: clip.created_at.timestamp_millis(),
        views: clip.views,
        channel: channel.to_string(),
        identified,
        fingerprint_failed: matches!(clip.outcome, Some(ScanOutcome::FingerprintFailed))
            .then_some(true),
        song: clip.song.clone(),
    }
}

/// Keyed lookup/insert/delete of clip records. Used to detect
/// already-processed clips and to drop records whose media has vanished
/// upstream.
#[async_trait]
pub trait ClipStore: Send + Sync {
    async fn get(&self, slug: &str) -> Result<Option<ClipRecord>, ScanError>;
    async fn insert(&self, record: ClipRecord) -> Result<(), ScanError>;
    async fn delete(&self, slug: &str) -> Result<bool, ScanError>;
}

/// Clip store backed by one JSON file per slug, with a thread-safe in-memory
/// cache loaded at startup.
#[derive(Debug, Clone)]
pub struct JsonClipStore {
    store_dir: PathBuf,
    records: Arc<RwLock<HashMap<String, ClipRecord>>>,
}

impl JsonClipStore {
    pub async fn new(store_dir: PathBuf) -> Result<Self, ScanError> {
        fs::create_dir_all(&store_dir)
            .await
            .map_err(|e| ScanError::Store(e.to_string()))?;

        let store = Self {
            store_dir,
            records: Arc::new(RwLock::new(HashMap::new())),
        };
        store.load_existing().await?;

        let count = store.records.read().await.len();
        info!("📊 Clip store initialized with {} records", count);
        Ok(store)
    }

    async fn load_existing(&self) -> Result<(), ScanError> {
        let mut entries = fs::read_dir(&self.store_dir)
            .await
            .map_err(|e| ScanError::Store(e.to_string()))?;
        let mut loaded = 0;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ScanError::Store(e.to_string()))?
        {
            let path = entry.path();
            if !path.extension().map_or(false, |ext| ext == "json") {
                continue;
            }
            match fs::read_to_string(&path).await {
                Ok(content) => match serde_json::from_str::<ClipRecord>(&content) {
                    Ok(record) => {
                        self.records
                            .write()
                            .await
                            .insert(record.slug.clone(), record);
                        loaded += 1;
                    }
                    Err(e) => warn!("Failed to parse record file {}: {}", path.display(), e),
                },
                Err(e) => warn!("Failed to read record file {}: {}", path.display(), e),
            }
        }

        debug!("📁 Loaded {} clip records from disk", loaded);
        Ok(())
    }

    fn record_path(&self, slug: &str) -> PathBuf {
        self.store_dir.join(format!("{slug}.json"))
    }
}

#[async_trait]
impl ClipStore for JsonClipStore {
    async fn get(&self, slug: &str) -> Result<Option<ClipRecord>, ScanError> {
        Ok(self.records.read().await.get(slug).cloned())
    }

    async fn insert(&self, record: ClipRecord) -> Result<(), ScanError> {
        let path = self.record_path(&record.slug);
        let json = serde_json::to_string_pretty(&record)
            .map_err(|e| ScanError::Store(e.to_string()))?;
        fs::write(&path, json)
            .await
            .map_err(|e| ScanError::Store(e.to_string()))?;

        self.records
            .write()
            .await
            .insert(record.slug.clone(), record);
        Ok(())
    }

    async fn delete(&self, slug: &str) -> Result<bool, ScanError> {
        let existed = self.records.write().await.remove(slug).is_some();

        let path = self.record_path(slug);
        if fs::try_exists(&path).await.unwrap_or(false) {
            fs::remove_file(&path)
                .await
                .map_err(|e| ScanError::Store(e.to_string()))?;
            debug!("🗑️ Dropped record for vanished clip {slug}");
            return Ok(true);
        }
        Ok(existed)
    }
}
