use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cache::FingerprintCache;
use crate::clip::{Clip, ClipReport, ScanOutcome};
use crate::config::Config;
use crate::download::Downloader;
use crate::error::ScanError;
use crate::fingerprint::Fingerprinter;
use crate::ratelimit::RateLimitGuard;
use crate::recognition::{RecognitionVerdict, Recognizer};
use crate::store::{make_record, ClipStore};
use crate::twitch::{select_rendition, MediaSource};

/// Seam between the executor and the per-clip state machine.
#[async_trait]
pub trait ProcessClip: Send + Sync {
    async fn process(&self, clip: Clip, ordinal: usize) -> Result<ClipReport, ScanError>;
}

/// Per-clip state machine: cache check, media fetch, download, fingerprint,
/// identify, classify. Terminal states always run a cleanup step that
/// removes the downloaded media file and never the fingerprint artifact.
pub struct ClipProcessor {
    media: Arc<dyn MediaSource>,
    downloader: Arc<dyn Downloader>,
    fingerprinter: Arc<dyn Fingerprinter>,
    recognizer: Arc<dyn Recognizer>,
    store: Arc<dyn ClipStore>,
    cache: FingerprintCache,
    guard: RateLimitGuard,
    quality_floor: u32,
    cooldown: Duration,
    channel: String,
}

impl ClipProcessor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        media: Arc<dyn MediaSource>,
        downloader: Arc<dyn Downloader>,
        fingerprinter: Arc<dyn Fingerprinter>,
        recognizer: Arc<dyn Recognizer>,
        store: Arc<dyn ClipStore>,
        cache: FingerprintCache,
        guard: RateLimitGuard,
        config: &Config,
    ) -> Self {
        Self {
            media,
            downloader,
            fingerprinter,
            recognizer,
            store,
            cache,
            guard,
            quality_floor: config.scan.quality_floor,
            cooldown: config.scan.cooldown(),
            channel: config.report.channel.clone(),
        }
    }

    /// Fetch, download, fingerprint, and identify one cache-miss clip.
    async fn run_pipeline(&self, clip: &mut Clip) -> Result<ScanOutcome, ScanError> {
        // FetchMedia
        let renditions = self.media.fetch_renditions(&clip.id).await?;
        let Some(rendition) = select_rendition(&renditions, self.quality_floor) else {
            warn!(">>> No media renditions for {}", clip.id);
            // The clip was probably deleted upstream; drop its record too.
            self.store.delete(&clip.id).await?;
            return Ok(ScanOutcome::Failed("no media renditions available".to_string()));
        };
        clip.media_url = Some(rendition.source_url.clone());

        // Download
        let media_path = self.cache.media_path(&clip.id);
        match self.downloader.download(&rendition.source_url, &media_path).await {
            Ok(()) => {}
            Err(ScanError::MediaExists(path)) => {
                debug!("Reusing media already on disk at {}", path.display());
            }
            Err(e) => return Err(e),
        }
        clip.media_path = Some(media_path.clone());

        // Fingerprint. The artifact write happens whether or not
        // identification later succeeds.
        let artifact = match self.fingerprinter.fingerprint(&media_path).await {
            Ok(artifact) => artifact,
            Err(ScanError::FingerprintTool(msg)) => {
                warn!("### {} fingerprint failed: {}", clip.id, msg);
                return Ok(ScanOutcome::FingerprintFailed);
            }
            Err(e) => return Err(e),
        };
        clip.fingerprint_path = Some(artifact.clone());

        // Identify checkpoint: an armed cooldown short-circuits before any
        // network call is made.
        if self.guard.is_blocked().await {
            info!("[CANCELLING SCAN] {}", clip.id);
            return Ok(ScanOutcome::Cancelled);
        }

        let sample = tokio::fs::read(&artifact)
            .await
            .map_err(|e| ScanError::Transport(e.to_string()))?;

        match self.recognizer.identify(sample).await? {
            RecognitionVerdict::Matched(song) => {
                info!("🎶 {} matched \"{}\"", clip.id, song.title);
                clip.song = Some(song);
                Ok(ScanOutcome::Matched)
            }
            RecognitionVerdict::NoMatch => Ok(ScanOutcome::NoMatch),
            RecognitionVerdict::RateLimited => {
                self.guard.block(self.cooldown).await;
                Ok(ScanOutcome::RateLimited)
            }
            RecognitionVerdict::Other { code, message } => {
                warn!("### {} recognition error {}: {}", clip.id, code, message);
                Ok(ScanOutcome::Failed(format!("{code}: {message}")))
            }
        }
    }

    /// Remove the downloaded media file. The fingerprint artifact always
    /// stays. A removal failure is fatal to the run.
    async fn cleanup(&self, clip: &mut Clip) -> Result<(), ScanError> {
        let Some(path) = clip.media_path.take() else {
            return Ok(());
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ScanError::Cleanup { path, source: e }),
        }
    }

    /// Persist the record for outcomes worth remembering. Cancelled and
    /// rate-limited clips stay unrecorded so a later run revisits them.
    async fn persist(&self, clip: &Clip) -> Result<(), ScanError> {
        match clip.outcome {
            Some(ScanOutcome::Matched)
            | Some(ScanOutcome::NoMatch)
            | Some(ScanOutcome::FingerprintFailed) => {
                self.store.insert(make_record(clip, &self.channel)).await
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl ProcessClip for ClipProcessor {
    async fn process(&self, mut clip: Clip, ordinal: usize) -> Result<ClipReport, ScanError> {
        info!(
            "Clip {} || {} || {} || {} views",
            ordinal, clip.id, clip.title, clip.views
        );

        // CacheCheck: a hit short-circuits the rest of the pipeline and
        // reuses whatever disposition is already on record.
        if self.cache.has(&clip.id).await {
            if let Some(record) = self.store.get(&clip.id).await? {
                clip.song = record.song;
            }
            clip.outcome = Some(ScanOutcome::CacheHit);
            return Ok(ClipReport {
                clip,
                ordinal,
                full_pipeline: false,
            });
        }
        debug!("> No cached fingerprint for {}", clip.id);

        let outcome = self.run_pipeline(&mut clip).await;
        self.cleanup(&mut clip).await?;
        clip.outcome = Some(outcome?);
        self.persist(&clip).await?;

        Ok(ClipReport {
            clip,
            ordinal,
            full_pipeline: true,
        })
    }
}
