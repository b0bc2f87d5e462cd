use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use crate::clip::{ClipReport, ScanOutcome};
use crate::config::Config;
use crate::executor::ChunkedExecutor;
use crate::ratelimit::RateLimitGuard;
use crate::report::ResultReporter;
use crate::scheduler::{ScanStatistics, TimeWindowScheduler};
use crate::twitch::ClipSource;

/// What a whole run accomplished.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScanSummary {
    pub batches_run: usize,
    pub clips_processed: usize,
    pub matched: usize,
    pub cache_hits: usize,
}

/// Drives the archive scan: picks a time window, enumerates its clips page by
/// page, hands each page to the executor, and reports the outcomes. One
/// `run()` works through up to the configured number of batches, bisecting
/// explored windows as it goes.
pub struct MusicScanner {
    source: Arc<dyn ClipSource>,
    executor: ChunkedExecutor,
    reporter: ResultReporter,
    guard: RateLimitGuard,
    scheduler: TimeWindowScheduler,
    channel: String,
    batches: usize,
    pages: usize,
}

impl MusicScanner {
    pub fn new(
        source: Arc<dyn ClipSource>,
        executor: ChunkedExecutor,
        reporter: ResultReporter,
        guard: RateLimitGuard,
        config: &Config,
    ) -> Self {
        Self {
            source,
            executor,
            reporter,
            guard,
            scheduler: TimeWindowScheduler::new(config.scan.wealth_normalization),
            channel: config.report.channel.clone(),
            batches: config.scan.batches,
            pages: config.scan.pages,
        }
    }

    /// Scan the channel's clip archive.
    pub async fn run(&mut self) -> Result<ScanSummary> {
        let channel_id = self.source.resolve_channel(&self.channel).await?;
        info!("🔍 Resolved channel {} to id {}", self.channel, channel_id);

        self.reporter
            .announce(&format!("Scanning {}...", self.channel))
            .await?;

        let mut summary = ScanSummary::default();
        let mut ordinal = 0;

        for batch in 1..=self.batches {
            let Some(window_idx) = self.scheduler.select_next() else {
                info!("No unexplored windows remain");
                break;
            };
            let window = self.scheduler.window(window_idx).clone();

            self.reporter
                .announce(&format!("Starting batch {}/{}", batch, self.batches))
                .await?;

            let mut stats = ScanStatistics::new();
            let mut cursor: Option<String> = None;

            for _ in 0..self.pages {
                // An armed cooldown makes further enumeration pointless for
                // this batch; the window stays partially explored.
                if self.guard.is_blocked().await {
                    warn!("⏳ Recognition cooldown armed, stopping enumeration");
                    break;
                }

                let page = self
                    .source
                    .fetch_page(&channel_id, window.start, window.end, cursor.as_deref())
                    .await?;
                if page.clips.is_empty() {
                    break;
                }

                for clip in &page.clips {
                    stats.observe(clip.created_at);
                }
                let page_len = page.clips.len();

                let reports = self.executor.run(page.clips, ordinal).await?;
                ordinal += page_len;

                for report in &reports {
                    summary.clips_processed += 1;
                    match report.outcome() {
                        ScanOutcome::Matched => summary.matched += 1,
                        ScanOutcome::CacheHit => summary.cache_hits += 1,
                        _ => {}
                    }
                    self.reporter.report(report).await?;
                }

                cursor = page.cursor;
                if cursor.is_none() {
                    break;
                }
            }

            info!(
                "📦 Batch {}/{} explored {} clips",
                batch,
                self.batches,
                stats.count()
            );
            self.scheduler.complete(window_idx, &stats);
            summary.batches_run = batch;
        }

        self.reporter.announce("Checked all!").await?;
        Ok(summary)
    }

    /// Process a single clip by slug, outside any window bookkeeping.
    pub async fn lookup(&self, slug: &str) -> Result<Option<ClipReport>> {
        let Some(clip) = self.source.get_clip(slug).await? else {
            warn!("No clip named {slug}");
            return Ok(None);
        };

        let reports = self.executor.run(vec![clip], 0).await?;
        let Some(report) = reports.into_iter().next() else {
            return Ok(None);
        };
        self.reporter.report(&report).await?;
        Ok(Some(report))
    }
}
