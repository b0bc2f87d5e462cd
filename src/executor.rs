use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::clip::{Clip, ClipReport};
use crate::error::ScanError;
use crate::processor::ProcessClip;

/// Split a list into fixed-size groups, preserving order.
pub fn chunk_by<T>(items: Vec<T>, size: usize) -> Vec<Vec<T>> {
    let mut chunks: Vec<Vec<T>> = Vec::new();
    for item in items {
        match chunks.last_mut() {
            Some(chunk) if chunk.len() < size => chunk.push(item),
            _ => chunks.push(vec![item]),
        }
    }
    chunks
}

/// Runs clips in fixed-size concurrent groups. All clips within a chunk are
/// processed concurrently and joined before the next chunk starts; chunks
/// never overlap. A chunk that ran at least one full pipeline is followed by
/// the configured delay, which throttles the download and recognition
/// services while still overlapping I/O latency inside the chunk.
pub struct ChunkedExecutor {
    processor: Arc<dyn ProcessClip>,
    chunk_size: usize,
    chunk_delay: Duration,
}

impl ChunkedExecutor {
    pub fn new(processor: Arc<dyn ProcessClip>, chunk_size: usize, chunk_delay: Duration) -> Self {
        Self {
            processor,
            chunk_size,
            chunk_delay,
        }
    }

    /// Process `clips` and return their reports in completion order within
    /// each chunk. Ordinals continue from `start_ordinal`.
    pub async fn run(&self, clips: Vec<Clip>, start_ordinal: usize) -> Result<Vec<ClipReport>> {
        let mut reports = Vec::new();
        let mut ordinal = start_ordinal;

        for chunk in chunk_by(clips, self.chunk_size) {
            let mut handles = Vec::with_capacity(chunk.len());
            for clip in chunk {
                ordinal += 1;
                let processor = Arc::clone(&self.processor);
                handles.push(tokio::spawn(async move {
                    processor.process(clip, ordinal).await
                }));
            }

            let mut did_scan = false;
            for handle in handles {
                match handle.await? {
                    Ok(report) => {
                        did_scan |= report.full_pipeline;
                        reports.push(report);
                    }
                    Err(e @ ScanError::Cleanup { .. }) => {
                        error!("Fatal cleanup failure: {e}");
                        return Err(e.into());
                    }
                    Err(e) => {
                        // A transient failure aborts that clip only. The clip
                        // still reached the remote services, so it counts
                        // toward the delay.
                        error!("Clip aborted: {e}");
                        did_scan = true;
                    }
                }
            }

            if did_scan {
                debug!("Chunk touched the full pipeline, delaying {:.1}s", self.chunk_delay.as_secs_f64());
                tokio::time::sleep(self.chunk_delay).await;
            }
        }

        info!("✅ Processed {} clips", reports.len());
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::ScanOutcome;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    fn clips(n: usize) -> Vec<Clip> {
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| Clip::new(format!("Slug{i}"), created, i as u64, "t", "u"))
            .collect()
    }

    /// Processor stub: clips whose id is listed in `cached` short-circuit as
    /// cache hits; everything else counts as a full pipeline run.
    struct StubProcessor {
        cached: HashSet<String>,
        running: AtomicUsize,
        max_running: AtomicUsize,
        order: Mutex<Vec<usize>>,
    }

    impl StubProcessor {
        fn new(cached: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                cached: cached.iter().map(|s| s.to_string()).collect(),
                running: AtomicUsize::new(0),
                max_running: AtomicUsize::new(0),
                order: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ProcessClip for StubProcessor {
        async fn process(&self, mut clip: Clip, ordinal: usize) -> Result<ClipReport, ScanError> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            self.order.lock().await.push(ordinal);

            let cache_hit = self.cached.contains(&clip.id);
            clip.outcome = Some(if cache_hit {
                ScanOutcome::CacheHit
            } else {
                ScanOutcome::NoMatch
            });
            Ok(ClipReport {
                clip,
                ordinal,
                full_pipeline: !cache_hit,
            })
        }
    }

    #[test]
    fn test_chunk_by_preserves_order_and_sizes() {
        let chunks = chunk_by((0..7).collect::<Vec<_>>(), 3);
        assert_eq!(chunks, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6]]);
        assert!(chunk_by(Vec::<i32>::new(), 3).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_is_bounded_by_chunk_size() {
        let stub = StubProcessor::new(&[]);
        let executor = ChunkedExecutor::new(stub.clone(), 3, Duration::ZERO);

        let reports = executor.run(clips(8), 0).await.unwrap();
        assert_eq!(reports.len(), 8);
        assert!(stub.max_running.load(Ordering::SeqCst) <= 3);

        // Ordinals are assigned in list order, continuing across chunks.
        let mut ordinals: Vec<usize> = reports.iter().map(|r| r.ordinal).collect();
        ordinals.sort_unstable();
        assert_eq!(ordinals, (1..=8).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_pipeline_chunk_is_followed_by_delay() {
        let stub = StubProcessor::new(&[]);
        let executor = ChunkedExecutor::new(stub, 2, Duration::from_secs(3));

        let started = tokio::time::Instant::now();
        executor.run(clips(4), 0).await.unwrap();

        // Two chunks, each followed by the 3s delay.
        assert!(started.elapsed() >= Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_cache_hit_chunk_skips_delay() {
        let stub = StubProcessor::new(&["Slug0", "Slug1", "Slug2", "Slug3"]);
        let executor = ChunkedExecutor::new(stub, 2, Duration::from_secs(3));

        let started = tokio::time::Instant::now();
        let reports = executor.run(clips(4), 0).await.unwrap();

        assert!(reports.iter().all(|r| !r.full_pipeline));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    /// Fails the clips listed in `broken` with the given error constructor;
    /// everything else is a cache hit.
    struct FaultyProcessor {
        broken: HashSet<String>,
        cleanup: bool,
    }

    impl FaultyProcessor {
        fn new(broken: &[&str], cleanup: bool) -> Arc<Self> {
            Arc::new(Self {
                broken: broken.iter().map(|s| s.to_string()).collect(),
                cleanup,
            })
        }
    }

    #[async_trait]
    impl ProcessClip for FaultyProcessor {
        async fn process(&self, mut clip: Clip, ordinal: usize) -> Result<ClipReport, ScanError> {
            if self.broken.contains(&clip.id) {
                return Err(if self.cleanup {
                    ScanError::Cleanup {
                        path: std::path::PathBuf::from("/scan/stuck.mp4"),
                        source: std::io::Error::other("directory not empty"),
                    }
                } else {
                    ScanError::Transport("connection reset".to_string())
                });
            }
            clip.outcome = Some(ScanOutcome::CacheHit);
            Ok(ClipReport {
                clip,
                ordinal,
                full_pipeline: false,
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_failure_aborts_the_run() {
        let processor = FaultyProcessor::new(&["Slug1"], true);
        let executor = ChunkedExecutor::new(processor, 2, Duration::ZERO);
        assert!(executor.run(clips(4), 0).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_skips_the_clip_only() {
        let processor = FaultyProcessor::new(&["Slug1"], false);
        let executor = ChunkedExecutor::new(processor, 2, Duration::ZERO);
        let reports = executor.run(clips(4), 0).await.unwrap();
        assert_eq!(reports.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborted_clip_still_counts_toward_the_delay() {
        // Slug1 fails in flight; the rest are cache hits. The chunk touched
        // the download service, so the delay must still apply.
        let processor = FaultyProcessor::new(&["Slug1"], false);
        let executor = ChunkedExecutor::new(processor, 2, Duration::from_secs(3));

        let started = tokio::time::Instant::now();
        executor.run(clips(2), 0).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mixed_chunk_still_delays() {
        // Chunk 1 is all cache hits, chunk 2 has one full-pipeline clip.
        let stub = StubProcessor::new(&["Slug0", "Slug1", "Slug2"]);
        let executor = ChunkedExecutor::new(stub, 2, Duration::from_secs(3));

        let started = tokio::time::Instant::now();
        executor.run(clips(4), 0).await.unwrap();

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(3));
        assert!(elapsed < Duration::from_secs(6));
    }
}
