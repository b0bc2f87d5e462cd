use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::clip::ClipReport;
use crate::error::ScanError;

/// Delivery target for result lines. No delivery acknowledgment is required.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send(&self, line: &str) -> Result<(), ScanError>;
}

/// Sink that writes lines to the log, tagged with the channel name. Stands in
/// for a chat connection when none is wired up.
pub struct LogSink {
    channel: String,
}

impl LogSink {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
        }
    }
}

#[async_trait]
impl MessageSink for LogSink {
    async fn send(&self, line: &str) -> Result<(), ScanError> {
        info!("[#{}] {}", self.channel, line);
        Ok(())
    }
}

/// Formats per-clip outcomes and emits them to the messaging sink.
pub struct ResultReporter {
    sink: Arc<dyn MessageSink>,
    message_cap: usize,
}

impl ResultReporter {
    pub fn new(sink: Arc<dyn MessageSink>, message_cap: usize) -> Self {
        Self { sink, message_cap }
    }

    /// Emit a scan lifecycle announcement.
    pub async fn announce(&self, text: &str) -> Result<(), ScanError> {
        self.sink.send(&self.capped(text)).await
    }

    /// Emit one line for a completed clip. Clips without match metadata
    /// produce no line at all.
    pub async fn report(&self, report: &ClipReport) -> Result<(), ScanError> {
        let Some(line) = Self::format_line(report) else {
            return Ok(());
        };
        self.sink.send(&self.capped(&line)).await
    }

    /// `ordinal | truncated date | url | views ---> artists | title | label`,
    /// or `None` when the clip has no song metadata.
    pub fn format_line(report: &ClipReport) -> Option<String> {
        let clip = &report.clip;
        let song = clip.song.as_ref()?;

        let artists = song
            .artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        Some(format!(
            "{} | {} | {} | {} views ---> {} | {} | {}",
            report.ordinal,
            clip.created_at.format("%Y-%m-%d %H:%M"),
            clip.url,
            clip.views,
            artists,
            song.title,
            song.label,
        ))
    }

    /// Truncate to the sink's hard length cap with an ellipsis marker.
    fn capped(&self, line: &str) -> String {
        if line.chars().count() <= self.message_cap {
            return line.to_string();
        }
        let kept: String = line
            .chars()
            .take(self.message_cap.saturating_sub(3))
            .collect();
        format!("{kept}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::{Artist, Clip, ScanOutcome, Song};
    use chrono::{TimeZone, Utc};
    use tokio::sync::Mutex;

    struct CaptureSink {
        lines: Mutex<Vec<String>>,
    }

    impl CaptureSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                lines: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl MessageSink for CaptureSink {
        async fn send(&self, line: &str) -> Result<(), ScanError> {
            self.lines.lock().await.push(line.to_string());
            Ok(())
        }
    }

    fn matched_report() -> ClipReport {
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let mut clip = Clip::new("SlugA", created, 1200, "clutch", "https://clips.example/SlugA");
        clip.outcome = Some(ScanOutcome::Matched);
        clip.song = Some(Song {
            title: "X".to_string(),
            label: "SomeLabel".to_string(),
            artists: vec![
                Artist { name: "Y".to_string() },
                Artist { name: "Z".to_string() },
            ],
        });
        ClipReport {
            clip,
            ordinal: 7,
            full_pipeline: true,
        }
    }

    #[test]
    fn test_line_contains_match_metadata() {
        let line = ResultReporter::format_line(&matched_report()).unwrap();
        assert_eq!(
            line,
            "7 | 2024-03-01 12:30 | https://clips.example/SlugA | 1200 views ---> Y, Z | X | SomeLabel"
        );
    }

    #[test]
    fn test_no_song_means_no_line() {
        let mut report = matched_report();
        report.clip.song = None;
        report.clip.outcome = Some(ScanOutcome::NoMatch);
        assert!(ResultReporter::format_line(&report).is_none());
    }

    #[tokio::test]
    async fn test_long_lines_are_truncated_with_marker() {
        let sink = CaptureSink::new();
        let reporter = ResultReporter::new(sink.clone(), 499);

        let long = "a".repeat(600);
        reporter.announce(&long).await.unwrap();

        let lines = sink.lines.lock().await;
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].chars().count(), 499);
        assert!(lines[0].ends_with("..."));
    }

    #[tokio::test]
    async fn test_tiny_cap_degrades_to_the_marker() {
        let sink = CaptureSink::new();
        let reporter = ResultReporter::new(sink.clone(), 2);

        reporter.announce("hello").await.unwrap();

        let lines = sink.lines.lock().await;
        assert_eq!(lines[0], "...");
    }

    #[tokio::test]
    async fn test_unmatched_clip_emits_nothing() {
        let sink = CaptureSink::new();
        let reporter = ResultReporter::new(sink.clone(), 499);

        let mut report = matched_report();
        report.clip.song = None;
        reporter.report(&report).await.unwrap();

        assert!(sink.lines.lock().await.is_empty());
    }
}
