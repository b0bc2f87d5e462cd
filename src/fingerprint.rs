use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::MediaConfig;
use crate::error::ScanError;

/// Produces a fingerprint artifact from a local media file. The artifact
/// lands at a deterministic path derived from the media path, which is what
/// makes the fingerprint cache purely existence-based.
#[async_trait]
pub trait Fingerprinter: Send + Sync {
    async fn fingerprint(&self, media_path: &Path) -> Result<PathBuf, ScanError>;
}

/// Artifact location for a media file: the extractor appends `.cli.lo`.
pub fn artifact_path_for(media_path: &Path) -> PathBuf {
    let mut name = media_path.as_os_str().to_os_string();
    name.push(".cli.lo");
    PathBuf::from(name)
}

const EXTRACTOR_ERROR_MARKER: &str = "create fingerprint error";

/// Drives the external fingerprint extractor executable.
pub struct ExtractorTool {
    tool_path: PathBuf,
    sample_seconds: u32,
}

impl ExtractorTool {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            tool_path: config.extractor_tool.clone(),
            sample_seconds: config.sample_seconds,
        }
    }
}

#[async_trait]
impl Fingerprinter for ExtractorTool {
    async fn fingerprint(&self, media_path: &Path) -> Result<PathBuf, ScanError> {
        debug!("Fingerprinting {}", media_path.display());

        let output = tokio::process::Command::new(&self.tool_path)
            .args([
                "-cli",
                "-l",
                &self.sample_seconds.to_string(),
                "-i",
                &media_path.to_string_lossy(),
                "--debug",
            ])
            .output()
            .await
            .map_err(|e| {
                ScanError::FingerprintTool(format!(
                    "failed to launch {}: {}",
                    self.tool_path.display(),
                    e
                ))
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains(EXTRACTOR_ERROR_MARKER) {
            warn!("Extractor diagnostic for {}: {}", media_path.display(), stderr.trim());
            return Err(ScanError::FingerprintTool(stderr.trim().to_string()));
        }

        if !output.status.success() {
            return Err(ScanError::FingerprintTool(format!(
                "extractor exited with {} for {}",
                output.status,
                media_path.display()
            )));
        }

        let artifact = artifact_path_for(media_path);
        if !tokio::fs::try_exists(&artifact).await.unwrap_or(false) {
            return Err(ScanError::FingerprintTool(format!(
                "extractor produced no artifact at {}",
                artifact.display()
            )));
        }

        Ok(artifact)
    }
}
