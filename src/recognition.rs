use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha1::Sha1;
use std::time::Duration;
use tracing::debug;

use crate::clip::{Artist, Song};
use crate::config::RecognitionConfig;
use crate::error::ScanError;

type HmacSha1 = Hmac<Sha1>;

/// Status code the service uses for "no result found".
pub const STATUS_NO_RESULT: i64 = 1001;
/// Status code the service uses for a provider-side rate limit.
pub const STATUS_RATE_LIMITED: i64 = 3015;

/// Closed classification of a recognition response. Every status code maps to
/// exactly one variant; only `Matched` carries a track and only a rate limit
/// is allowed to arm the shared cooldown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionVerdict {
    Matched(Song),
    NoMatch,
    RateLimited,
    Other { code: i64, message: String },
}

/// Submits fingerprint bytes to the recognition service.
#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn identify(&self, sample: Vec<u8>) -> Result<RecognitionVerdict, ScanError>;
}

#[derive(Debug, Deserialize)]
pub struct IdentifyResponse {
    pub status: ServiceStatus,
    #[serde(default)]
    pub metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct ServiceStatus {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMetadata {
    #[serde(default)]
    pub music: Vec<TrackEntry>,
}

/// A candidate track in the service's pre-ranked result list.
#[derive(Debug, Deserialize)]
pub struct TrackEntry {
    pub title: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub artists: Vec<ArtistEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ArtistEntry {
    pub name: String,
}

impl From<TrackEntry> for Song {
    fn from(entry: TrackEntry) -> Self {
        Song {
            title: entry.title,
            label: entry.label,
            artists: entry
                .artists
                .into_iter()
                .map(|a| Artist { name: a.name })
                .collect(),
        }
    }
}

/// Total mapping from a service response to a verdict. The first element of
/// the match list is taken as the match; the list arrives pre-ranked.
pub fn classify(response: IdentifyResponse) -> RecognitionVerdict {
    match response.status.code {
        0 => {
            let top = response
                .metadata
                .and_then(|m| m.music.into_iter().next());
            match top {
                Some(track) => RecognitionVerdict::Matched(track.into()),
                None => RecognitionVerdict::Other {
                    code: 0,
                    message: "success status with empty match list".to_string(),
                },
            }
        }
        STATUS_NO_RESULT => RecognitionVerdict::NoMatch,
        STATUS_RATE_LIMITED => RecognitionVerdict::RateLimited,
        code => RecognitionVerdict::Other {
            code,
            message: response.status.msg,
        },
    }
}

/// HTTP client for the recognition service's signed identify endpoint.
pub struct RecognitionClient {
    config: RecognitionConfig,
    client: reqwest::Client,
}

impl RecognitionClient {
    pub fn new(config: RecognitionConfig) -> Result<Self, ScanError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ScanError::Transport(e.to_string()))?;
        Ok(Self { config, client })
    }

    /// Keyed hash over method, endpoint, access key, data type, signature
    /// version, and timestamp, newline-joined, base64-encoded.
    fn sign(&self, timestamp: i64) -> Result<String, ScanError> {
        let to_sign = [
            "POST",
            &self.config.endpoint,
            &self.config.access_key,
            &self.config.data_type,
            &self.config.signature_version,
            &timestamp.to_string(),
        ]
        .join("\n");

        let mut mac = HmacSha1::new_from_slice(self.config.access_secret.as_bytes())
            .map_err(|e| ScanError::Recognition {
                code: -1,
                message: format!("signing key rejected: {e}"),
            })?;
        mac.update(to_sign.as_bytes());
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }
}

#[async_trait]
impl Recognizer for RecognitionClient {
    async fn identify(&self, sample: Vec<u8>) -> Result<RecognitionVerdict, ScanError> {
        let timestamp = chrono::Utc::now().timestamp();
        let signature = self.sign(timestamp)?;
        let sample_bytes = sample.len();

        let form = reqwest::multipart::Form::new()
            .part(
                "sample",
                reqwest::multipart::Part::bytes(sample).file_name("sample"),
            )
            .text("access_key", self.config.access_key.clone())
            .text("data_type", self.config.data_type.clone())
            .text("signature_version", self.config.signature_version.clone())
            .text("signature", signature)
            .text("sample_bytes", sample_bytes.to_string())
            .text("timestamp", timestamp.to_string());

        let url = format!("http://{}{}", self.config.host, self.config.endpoint);
        debug!("Submitting {} fingerprint bytes to {}", sample_bytes, url);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ScanError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ScanError::Transport(format!(
                "identify returned HTTP {}",
                response.status()
            )));
        }

        let body: IdentifyResponse = response.json().await.map_err(|e| ScanError::Recognition {
            code: -1,
            message: format!("unreadable identify response: {e}"),
        })?;

        Ok(classify(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(code: i64, msg: &str) -> IdentifyResponse {
        IdentifyResponse {
            status: ServiceStatus {
                code,
                msg: msg.to_string(),
            },
            metadata: None,
        }
    }

    #[test]
    fn test_success_takes_the_top_ranked_track() {
        let payload = r#"{
            "status": { "code": 0, "msg": "Success" },
            "metadata": {
                "music": [
                    { "title": "First", "label": "L1", "artists": [{ "name": "A" }, { "name": "B" }] },
                    { "title": "Second", "label": "L2", "artists": [{ "name": "C" }] }
                ]
            }
        }"#;
        let parsed: IdentifyResponse = serde_json::from_str(payload).unwrap();
        let verdict = classify(parsed);
        match verdict {
            RecognitionVerdict::Matched(song) => {
                assert_eq!(song.title, "First");
                assert_eq!(song.label, "L1");
                assert_eq!(song.artists.len(), 2);
                assert_eq!(song.artists[0].name, "A");
            }
            other => panic!("expected Matched, got {other:?}"),
        }
    }

    #[test]
    fn test_no_result_is_benign() {
        assert_eq!(
            classify(response(STATUS_NO_RESULT, "No result")),
            RecognitionVerdict::NoMatch
        );
    }

    #[test]
    fn test_rate_limit_code_maps_to_rate_limited() {
        assert_eq!(
            classify(response(STATUS_RATE_LIMITED, "qps limit exceeded")),
            RecognitionVerdict::RateLimited
        );
    }

    #[test]
    fn test_classification_is_total_over_unknown_codes() {
        for code in [-5, 2000, 3000, 3001, 9999] {
            match classify(response(code, "some provider message")) {
                RecognitionVerdict::Other { code: got, message } => {
                    assert_eq!(got, code);
                    assert_eq!(message, "some provider message");
                }
                other => panic!("code {code} must classify as Other, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_success_without_tracks_is_not_a_match() {
        let verdict = classify(response(0, "Success"));
        assert!(matches!(verdict, RecognitionVerdict::Other { code: 0, .. }));
    }

    #[test]
    fn test_signature_is_deterministic_per_timestamp() {
        let config = RecognitionConfig {
            host: "identify.example".to_string(),
            endpoint: "/v1/identify".to_string(),
            access_key: "key".to_string(),
            access_secret: "secret".to_string(),
            data_type: "fingerprint".to_string(),
            signature_version: "1".to_string(),
            timeout_secs: 5,
        };
        let client = RecognitionClient::new(config).unwrap();
        let a = client.sign(1_700_000_000).unwrap();
        let b = client.sign(1_700_000_000).unwrap();
        let c = client.sign(1_700_000_001).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(BASE64.decode(&a).is_ok());
    }
}
