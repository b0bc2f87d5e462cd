use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A single artist credit on a matched track.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Artist {
    pub name: String,
}

/// A matched track as returned by the recognition service. Artists keep the
/// service's ordering; no re-ranking is performed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Song {
    pub title: String,
    #[serde(default)]
    pub label: String,
    pub artists: Vec<Artist>,
}

/// Terminal classification for one processed clip.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ScanOutcome {
    /// A fingerprint artifact already existed; nothing was fetched.
    CacheHit,
    /// The recognition service identified a track.
    Matched,
    /// The service found no result (benign).
    NoMatch,
    /// The extractor tool could not produce a fingerprint.
    FingerprintFailed,
    /// The service signalled a provider rate limit; the shared cooldown
    /// was armed.
    RateLimited,
    /// The cooldown was active when this clip reached the identify step.
    /// Distinct from `Failed`: nothing went wrong with the clip itself.
    Cancelled,
    /// Terminal error with the service's message text.
    Failed(String),
}

/// A short video clip from the archive, mutated in place as it moves through
/// the processing state machine and discarded after reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clip {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub views: u64,
    pub title: String,
    pub url: String,

    // Transient fields acquired during processing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ScanOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub song: Option<Song>,
}

impl Clip {
    pub fn new(
        id: impl Into<String>,
        created_at: DateTime<Utc>,
        views: u64,
        title: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            created_at,
            views,
            title: title.into(),
            url: url.into(),
            media_url: None,
            media_path: None,
            fingerprint_path: None,
            outcome: None,
            song: None,
        }
    }
}

/// Completed evaluation of one clip, ready for reporting.
#[derive(Debug, Clone)]
pub struct ClipReport {
    pub clip: Clip,
    /// 1-based position within the scan run.
    pub ordinal: usize,
    /// True when the clip went through download/fingerprint/identify rather
    /// than short-circuiting on a cache hit. Drives the inter-chunk delay.
    pub full_pipeline: bool,
}

impl ClipReport {
    pub fn outcome(&self) -> &ScanOutcome {
        self.clip.outcome.as_ref().unwrap_or(&ScanOutcome::CacheHit)
    }
}
