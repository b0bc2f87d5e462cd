/// TuneScout - Twitch clip music scanner
///
/// Walks a channel's clip archive with an adaptive time-window search,
/// fingerprints each clip's audio with the ACRCloud extractor tool, and
/// identifies the music playing in it.

pub mod cache;
pub mod clip;
pub mod config;
pub mod download;
pub mod error;
pub mod executor;
pub mod fingerprint;
pub mod processor;
pub mod ratelimit;
pub mod recognition;
pub mod report;
pub mod scanner;
pub mod scheduler;
pub mod store;
pub mod twitch;

// Re-export main types for easy access
pub use crate::cache::FingerprintCache;
pub use crate::clip::{Clip, ClipReport, ScanOutcome, Song};
pub use crate::config::{Config, ConfigBuilder};
pub use crate::download::{Downloader, HttpDownloader};
pub use crate::error::ScanError;
pub use crate::executor::ChunkedExecutor;
pub use crate::fingerprint::{ExtractorTool, Fingerprinter};
pub use crate::processor::{ClipProcessor, ProcessClip};
pub use crate::ratelimit::RateLimitGuard;
pub use crate::recognition::{RecognitionClient, RecognitionVerdict, Recognizer};
pub use crate::report::{LogSink, MessageSink, ResultReporter};
pub use crate::scanner::{MusicScanner, ScanSummary};
pub use crate::scheduler::{ScanStatistics, TimeWindow, TimeWindowScheduler};
pub use crate::store::{ClipRecord, ClipStore, JsonClipStore};
pub use crate::twitch::{ClipSource, GqlMediaSource, HelixClipSource, MediaSource};
