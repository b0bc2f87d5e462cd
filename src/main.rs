use anyhow::Result;
use clap::{Arg, Command};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use tunescout::{
    ChunkedExecutor, ClipProcessor, Config, ExtractorTool, FingerprintCache, GqlMediaSource,
    HelixClipSource, HttpDownloader, JsonClipStore, LogSink, MusicScanner, RateLimitGuard,
    RecognitionClient, ResultReporter,
};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("tunescout")
        .version("0.1.0")
        .about("Find the music playing in a Twitch channel's clip archive")
        .arg(
            Arg::new("channel")
                .value_name("CHANNEL")
                .help("Channel whose clip archive to scan")
                .required(false),
        )
        .arg(
            Arg::new("clip")
                .short('c')
                .long("clip")
                .value_name("SLUG")
                .help("Identify a single clip by slug instead of scanning"),
        )
        .arg(
            Arg::new("batches")
                .short('b')
                .long("batches")
                .value_name("NUM")
                .help("Number of time windows to explore"),
        )
        .arg(
            Arg::new("chunk-size")
                .long("chunk-size")
                .value_name("NUM")
                .help("Clips processed concurrently per chunk"),
        )
        .arg(
            Arg::new("work-dir")
                .short('d')
                .long("work-dir")
                .value_name("DIR")
                .help("Directory for downloaded media and fingerprints"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let filter = if matches.get_flag("verbose") {
        "tunescout=debug,info"
    } else {
        "tunescout=info,warn"
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Load configuration
    let mut config = Config::load().unwrap_or_else(|e| {
        warn!("Failed to load config, using defaults: {}", e);
        Config::from_env()
    });

    if let Some(channel) = matches.get_one::<String>("channel") {
        config.report.channel = channel.clone();
    }
    if let Some(batches) = matches.get_one::<String>("batches") {
        config.scan.batches = batches.parse()?;
    }
    if let Some(size) = matches.get_one::<String>("chunk-size") {
        config.scan.chunk_size = size.parse()?;
    }
    if let Some(dir) = matches.get_one::<String>("work-dir") {
        config.media.work_dir = PathBuf::from(dir);
    }
    config.validate()?;

    info!("🚀 TuneScout starting...");
    info!("{}", config.summary());

    // Wire up the collaborators
    let cache = FingerprintCache::new(config.media.work_dir.clone());
    cache.initialize().await?;

    let store = JsonClipStore::new(config.media.work_dir.join("records")).await?;
    let guard = RateLimitGuard::new();

    let source = Arc::new(HelixClipSource::new(config.twitch.clone())?);
    let media = Arc::new(GqlMediaSource::new(config.twitch.clone())?);
    let downloader = Arc::new(HttpDownloader::new(Duration::from_secs(
        config.twitch.timeout_secs,
    ))?);
    let fingerprinter = Arc::new(ExtractorTool::new(&config.media));
    let recognizer = Arc::new(RecognitionClient::new(config.recognition.clone())?);

    let processor = Arc::new(ClipProcessor::new(
        media,
        downloader,
        fingerprinter,
        recognizer,
        Arc::new(store),
        cache,
        guard.clone(),
        &config,
    ));
    let executor = ChunkedExecutor::new(processor, config.scan.chunk_size, config.scan.chunk_delay());

    let sink = Arc::new(LogSink::new(config.report.channel.clone()));
    let reporter = ResultReporter::new(sink, config.report.message_cap);

    let mut scanner = MusicScanner::new(source, executor, reporter, guard, &config);

    let start_time = std::time::Instant::now();

    if let Some(slug) = matches.get_one::<String>("clip") {
        match scanner.lookup(slug).await? {
            Some(report) => info!("✅ Processed clip {}", report.clip.id),
            None => warn!("Clip {slug} not found"),
        }
    } else {
        let summary = scanner.run().await?;
        let duration = start_time.elapsed();

        info!("🎉 Scan completed in {:.2}s", duration.as_secs_f64());
        info!("📦 Batches: {}", summary.batches_run);
        info!("🎬 Clips processed: {}", summary.clips_processed);
        info!("🎶 Matched: {}", summary.matched);
        info!("💾 Cache hits: {}", summary.cache_hits);
    }

    Ok(())
}
