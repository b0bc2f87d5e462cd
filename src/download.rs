use async_trait::async_trait;
use futures::StreamExt;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::ScanError;

/// Retrieves bytes from a URL into local storage. An already-existing
/// destination is signalled distinctly from a transport failure.
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download(&self, url: &str, dest: &Path) -> Result<(), ScanError>;
}

/// Streaming HTTP downloader.
pub struct HttpDownloader {
    client: reqwest::Client,
}

impl HttpDownloader {
    pub fn new(timeout: Duration) -> Result<Self, ScanError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ScanError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, url: &str, dest: &Path) -> Result<(), ScanError> {
        if tokio::fs::try_exists(dest).await.unwrap_or(false) {
            return Err(ScanError::MediaExists(dest.to_path_buf()));
        }

        debug!("Downloading {} -> {}", url, dest.display());

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ScanError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ScanError::Transport(format!(
                "download of {} returned {}",
                url,
                response.status()
            )));
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| ScanError::Transport(e.to_string()))?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(bytes) => {
                    if let Err(e) = file.write_all(&bytes).await {
                        drop(file);
                        let _ = tokio::fs::remove_file(dest).await;
                        return Err(ScanError::Transport(e.to_string()));
                    }
                }
                Err(e) => {
                    // Drop the partial file so a later attempt starts clean.
                    drop(file);
                    let _ = tokio::fs::remove_file(dest).await;
                    return Err(ScanError::Transport(e.to_string()));
                }
            }
        }

        file.flush()
            .await
            .map_err(|e| ScanError::Transport(e.to_string()))?;

        Ok(())
    }
}
