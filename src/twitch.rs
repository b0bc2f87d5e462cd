use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

use crate::clip::Clip;
use crate::config::TwitchConfig;
use crate::error::ScanError;

/// One available media rendition for a clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendition {
    /// Vertical resolution indicator (e.g. 360, 480, 720).
    pub quality: u32,
    pub source_url: String,
}

/// One page of enumerated clips plus the cursor for the next page.
#[derive(Debug, Clone)]
pub struct ClipPage {
    pub clips: Vec<Clip>,
    pub cursor: Option<String>,
}

/// Paginated clip enumeration for a channel, single-clip lookup, and
/// channel-name resolution.
#[async_trait]
pub trait ClipSource: Send + Sync {
    async fn resolve_channel(&self, name: &str) -> Result<String, ScanError>;

    async fn fetch_page(
        &self,
        channel_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        cursor: Option<&str>,
    ) -> Result<ClipPage, ScanError>;

    async fn get_clip(&self, slug: &str) -> Result<Option<Clip>, ScanError>;
}

/// Media rendition listing for a clip. An empty list means the media has
/// vanished upstream.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn fetch_renditions(&self, slug: &str) -> Result<Vec<Rendition>, ScanError>;
}

/// Pick the lowest-quality rendition strictly above the floor if one exists,
/// otherwise the single highest-quality rendition available. Minimizes
/// bandwidth while keeping enough audio fidelity for fingerprinting.
pub fn select_rendition(renditions: &[Rendition], quality_floor: u32) -> Option<&Rendition> {
    renditions
        .iter()
        .filter(|r| r.quality > quality_floor)
        .min_by_key(|r| r.quality)
        .or_else(|| renditions.iter().max_by_key(|r| r.quality))
}

/// Helix-backed clip source.
pub struct HelixClipSource {
    config: TwitchConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct HelixClipsResponse {
    data: Vec<HelixClip>,
    #[serde(default)]
    pagination: HelixPagination,
}

#[derive(Debug, Default, Deserialize)]
struct HelixPagination {
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HelixClip {
    id: String,
    url: String,
    title: String,
    view_count: u64,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct HelixUsersResponse {
    data: Vec<HelixUser>,
}

#[derive(Debug, Deserialize)]
struct HelixUser {
    id: String,
}

impl HelixClipSource {
    pub fn new(config: TwitchConfig) -> Result<Self, ScanError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ScanError::Enumeration(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("Client-Id", &self.config.client_id)
            .header(
                "Authorization",
                format!("Bearer {}", self.config.bearer_token),
            )
    }
}

impl From<HelixClip> for Clip {
    fn from(raw: HelixClip) -> Self {
        Clip::new(raw.id, raw.created_at, raw.view_count, raw.title, raw.url)
    }
}

#[async_trait]
impl ClipSource for HelixClipSource {
    async fn resolve_channel(&self, name: &str) -> Result<String, ScanError> {
        let url = format!("{}/users", self.config.helix_url);
        let response = self
            .authed(self.client.get(&url).query(&[("login", name)]))
            .send()
            .await
            .map_err(|e| ScanError::Enumeration(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ScanError::Enumeration(format!(
                "user lookup for {} returned {}",
                name,
                response.status()
            )));
        }

        let users: HelixUsersResponse = response
            .json()
            .await
            .map_err(|e| ScanError::Enumeration(e.to_string()))?;

        users
            .data
            .into_iter()
            .next()
            .map(|user| user.id)
            .ok_or_else(|| ScanError::Enumeration(format!("no channel named {name}")))
    }

    async fn fetch_page(
        &self,
        channel_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        cursor: Option<&str>,
    ) -> Result<ClipPage, ScanError> {
        let url = format!("{}/clips", self.config.helix_url);
        let mut query: Vec<(&str, String)> = vec![
            ("broadcaster_id", channel_id.to_string()),
            ("first", self.config.page_size.to_string()),
        ];
        if let Some(start) = start {
            query.push(("started_at", start.to_rfc3339()));
        }
        if let Some(end) = end {
            query.push(("ended_at", end.to_rfc3339()));
        }
        if let Some(cursor) = cursor {
            query.push(("after", cursor.to_string()));
        }

        debug!("Fetching clip page for channel {channel_id}");

        let response = self
            .authed(self.client.get(&url).query(&query))
            .send()
            .await
            .map_err(|e| ScanError::Enumeration(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ScanError::Enumeration(format!(
                "clip enumeration returned {}",
                response.status()
            )));
        }

        let page: HelixClipsResponse = response
            .json()
            .await
            .map_err(|e| ScanError::Enumeration(e.to_string()))?;

        info!("📼 Fetched {} clips", page.data.len());

        Ok(ClipPage {
            clips: page.data.into_iter().map(Clip::from).collect(),
            cursor: page.pagination.cursor,
        })
    }

    async fn get_clip(&self, slug: &str) -> Result<Option<Clip>, ScanError> {
        let url = format!("{}/clips", self.config.helix_url);
        let response = self
            .authed(self.client.get(&url).query(&[("id", slug)]))
            .send()
            .await
            .map_err(|e| ScanError::Enumeration(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ScanError::Enumeration(format!(
                "clip lookup for {} returned {}",
                slug,
                response.status()
            )));
        }

        let page: HelixClipsResponse = response
            .json()
            .await
            .map_err(|e| ScanError::Enumeration(e.to_string()))?;

        Ok(page.data.into_iter().next().map(Clip::from))
    }
}

/// GQL-backed media source using the persisted clip access-token query.
pub struct GqlMediaSource {
    config: TwitchConfig,
    client: reqwest::Client,
}

const CLIP_QUERY_HASH: &str = "9bfcc0177bffc730bd5a5a89005869d2773480cf1738c592143b5173634b7d15";

#[derive(Debug, Deserialize)]
struct GqlEnvelope {
    data: GqlData,
}

#[derive(Debug, Deserialize)]
struct GqlData {
    clip: Option<GqlClip>,
}

#[derive(Debug, Deserialize)]
struct GqlClip {
    #[serde(rename = "videoQualities", default)]
    video_qualities: Vec<GqlQuality>,
}

#[derive(Debug, Deserialize)]
struct GqlQuality {
    /// Quoted number on the wire, e.g. "720".
    quality: String,
    #[serde(rename = "sourceURL")]
    source_url: String,
}

impl GqlMediaSource {
    pub fn new(config: TwitchConfig) -> Result<Self, ScanError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ScanError::Transport(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn parse_renditions(envelopes: Vec<GqlEnvelope>) -> Vec<Rendition> {
        let Some(clip) = envelopes.into_iter().next().and_then(|e| e.data.clip) else {
            return Vec::new();
        };

        clip.video_qualities
            .into_iter()
            .filter_map(|q| {
                let quality = q.quality.parse().ok()?;
                Some(Rendition {
                    quality,
                    source_url: q.source_url,
                })
            })
            .collect()
    }
}

#[async_trait]
impl MediaSource for GqlMediaSource {
    async fn fetch_renditions(&self, slug: &str) -> Result<Vec<Rendition>, ScanError> {
        let body = json!([{
            "operationName": "VideoAccessToken_Clip",
            "variables": { "slug": slug },
            "extensions": {
                "persistedQuery": {
                    "version": 1,
                    "sha256Hash": CLIP_QUERY_HASH,
                }
            }
        }]);

        let response = self
            .client
            .post(&self.config.gql_url)
            .header("Client-Id", &self.config.gql_client_id)
            .header("Content-Type", "text/plain;charset=UTF-8")
            .json(&body)
            .send()
            .await
            .map_err(|e| ScanError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ScanError::Transport(format!(
                "rendition lookup for {} returned {}",
                slug,
                response.status()
            )));
        }

        let envelopes: Vec<GqlEnvelope> = response
            .json()
            .await
            .map_err(|e| ScanError::Transport(e.to_string()))?;

        Ok(Self::parse_renditions(envelopes))
    }
}
