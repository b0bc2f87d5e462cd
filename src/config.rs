use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the clip music scanner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Scheduler and executor settings
    pub scan: ScanConfig,

    /// Media download and fingerprinting settings
    pub media: MediaConfig,

    /// Recognition service settings
    pub recognition: RecognitionConfig,

    /// Clip source settings
    pub twitch: TwitchConfig,

    /// Result reporting settings
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Number of time windows explored per run (the scan budget)
    pub batches: usize,

    /// Pages of clips enumerated per window
    pub pages: usize,

    /// Clips processed concurrently within one chunk
    pub chunk_size: usize,

    /// Delay between chunks that touched the full pipeline (seconds)
    pub chunk_delay_secs: u64,

    /// Cooldown after a provider rate-limit signal (seconds)
    pub cooldown_secs: u64,

    /// Divisor applied to elapsed milliseconds when computing window wealth.
    /// A tunable normalization constant, not a unit conversion.
    pub wealth_normalization: f64,

    /// Lowest acceptable rendition quality; the scanner picks the cheapest
    /// rendition strictly above this line when one exists
    pub quality_floor: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Scan working directory holding media files and fingerprint artifacts
    pub work_dir: PathBuf,

    /// Path to the fingerprint extractor executable
    pub extractor_tool: PathBuf,

    /// Seconds of audio the extractor samples from each clip
    pub sample_seconds: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionConfig {
    /// Recognition service host
    pub host: String,

    /// Identify endpoint path
    pub endpoint: String,

    /// Access key for request signing
    pub access_key: String,

    /// Access secret for request signing
    pub access_secret: String,

    /// Payload type declared in the signed request
    pub data_type: String,

    /// Signature scheme version declared in the signed request
    pub signature_version: String,

    /// Request timeout (seconds)
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitchConfig {
    /// Helix API base URL
    pub helix_url: String,

    /// GQL endpoint used for media rendition lookups
    pub gql_url: String,

    /// Application client id for Helix requests
    pub client_id: String,

    /// Bearer token for Helix requests
    pub bearer_token: String,

    /// Web client id accepted by the GQL endpoint
    pub gql_client_id: String,

    /// Clips requested per enumeration page
    pub page_size: u32,

    /// Request timeout (seconds)
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Channel the result lines are delivered to
    pub channel: String,

    /// Hard cap on an outgoing message line
    pub message_cap: usize,
}

impl ScanConfig {
    pub fn chunk_delay(&self) -> Duration {
        Duration::from_secs(self.chunk_delay_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

impl Config {
    /// Load configuration from file, falling back to environment variables
    pub fn load() -> Result<Self> {
        let config_paths = [
            "tunescout.toml",
            "config/tunescout.toml",
            "~/.config/tunescout/config.toml",
            "/etc/tunescout/config.toml",
        ];

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str::<Config>(&config_str) {
                    Ok(mut config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        config.apply_env();
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        Ok(Self::from_env())
    }

    /// Build configuration from defaults plus environment overrides
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("TUNESCOUT_ACCESS_KEY") {
            self.recognition.access_key = key;
        }
        if let Ok(secret) = std::env::var("TUNESCOUT_ACCESS_SECRET") {
            self.recognition.access_secret = secret;
        }
        if let Ok(host) = std::env::var("TUNESCOUT_HOST") {
            self.recognition.host = host;
        }
        if let Ok(client_id) = std::env::var("TUNESCOUT_CLIENT_ID") {
            self.twitch.client_id = client_id;
        }
        if let Ok(token) = std::env::var("TUNESCOUT_BEARER_TOKEN") {
            self.twitch.bearer_token = token;
        }
        if let Ok(gql_id) = std::env::var("TUNESCOUT_GQL_CLIENT_ID") {
            self.twitch.gql_client_id = gql_id;
        }
        if let Ok(dir) = std::env::var("TUNESCOUT_WORK_DIR") {
            self.media.work_dir = PathBuf::from(dir);
        }
        if let Ok(batches) = std::env::var("TUNESCOUT_BATCHES") {
            self.scan.batches = batches.parse().unwrap_or(self.scan.batches);
        }
        if let Ok(size) = std::env::var("TUNESCOUT_CHUNK_SIZE") {
            self.scan.chunk_size = size.parse().unwrap_or(self.scan.chunk_size);
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &str) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path);
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.scan.batches == 0 {
            return Err(anyhow!("scan.batches must be greater than 0"));
        }
        if self.scan.pages == 0 {
            return Err(anyhow!("scan.pages must be greater than 0"));
        }
        if self.scan.chunk_size == 0 {
            return Err(anyhow!("scan.chunk_size must be greater than 0"));
        }
        if !self.scan.wealth_normalization.is_finite() || self.scan.wealth_normalization <= 0.0 {
            return Err(anyhow!(
                "scan.wealth_normalization must be a positive finite number"
            ));
        }
        if self.recognition.access_key.is_empty() || self.recognition.access_secret.is_empty() {
            return Err(anyhow!("recognition access key and secret are required"));
        }
        if self.report.message_cap < 4 {
            return Err(anyhow!(
                "report.message_cap is too small to hold a truncation marker"
            ));
        }
        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Tunescout Configuration:\n\
            - Batches: {}\n\
            - Pages per window: {}\n\
            - Chunk size: {}\n\
            - Chunk delay: {}s\n\
            - Cooldown: {}s\n\
            - Quality floor: {}p\n\
            - Work directory: {}\n\
            - Recognition host: {}",
            self.scan.batches,
            self.scan.pages,
            self.scan.chunk_size,
            self.scan.chunk_delay_secs,
            self.scan.cooldown_secs,
            self.scan.quality_floor,
            self.media.work_dir.display(),
            self.recognition.host,
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scan: ScanConfig {
                batches: 1,
                pages: 1,
                chunk_size: 3.min(num_cpus::get()),
                chunk_delay_secs: 3,
                cooldown_secs: 3,
                wealth_normalization: 1e9,
                quality_floor: 400,
            },
            media: MediaConfig {
                work_dir: PathBuf::from("./scan"),
                extractor_tool: default_extractor_tool(),
                sample_seconds: 61,
            },
            recognition: RecognitionConfig {
                host: "identify-eu-west-1.acrcloud.com".to_string(),
                endpoint: "/v1/identify".to_string(),
                access_key: String::new(),
                access_secret: String::new(),
                data_type: "fingerprint".to_string(),
                signature_version: "1".to_string(),
                timeout_secs: 30,
            },
            twitch: TwitchConfig {
                helix_url: "https://api.twitch.tv/helix".to_string(),
                gql_url: "https://gql.twitch.tv/gql".to_string(),
                client_id: String::new(),
                bearer_token: String::new(),
                gql_client_id: String::new(),
                page_size: 100,
                timeout_secs: 30,
            },
            report: ReportConfig {
                channel: String::new(),
                message_cap: 499,
            },
        }
    }
}

fn default_extractor_tool() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("acrcloud_extr_win.exe")
    } else {
        PathBuf::from("./acrcloud_extr_linux")
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_batches(mut self, batches: usize) -> Self {
        self.config.scan.batches = batches;
        self
    }

    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.config.scan.chunk_size = size;
        self
    }

    pub fn with_chunk_delay(mut self, secs: u64) -> Self {
        self.config.scan.chunk_delay_secs = secs;
        self
    }

    pub fn with_cooldown(mut self, secs: u64) -> Self {
        self.config.scan.cooldown_secs = secs;
        self
    }

    pub fn with_quality_floor(mut self, floor: u32) -> Self {
        self.config.scan.quality_floor = floor;
        self
    }

    pub fn with_work_dir(mut self, dir: PathBuf) -> Self {
        self.config.media.work_dir = dir;
        self
    }

    pub fn with_access_keys(mut self, key: impl Into<String>, secret: impl Into<String>) -> Self {
        self.config.recognition.access_key = key.into();
        self.config.recognition.access_secret = secret.into();
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.config.report.channel = channel.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
