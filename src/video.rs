use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::VideoConfig;
use crate::error::{CompanionError, Result};
use crate::models::{SearchListResponse, VideoResult};

#[cfg(test)]
use mockall::automock;

/// Secondary suggestion source. Lookups degrade to an empty list on any
/// failure, including a missing credential; they never surface an error.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait VideoSearch: Send + Sync {
    async fn lookup_videos(&self, query: &str) -> Vec<VideoResult>;
}

pub struct YouTubeSearch {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    max_results: u32,
    language: String,
    region: String,
}

impl YouTubeSearch {
    pub fn from_config(cfg: &VideoConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            api_key: cfg.api_key.clone().filter(|k| !k.trim().is_empty()),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            max_results: cfg.max_results,
            language: cfg.language.clone(),
            region: cfg.region.clone(),
        })
    }

    async fn search(&self, api_key: &str, query: &str) -> Result<Vec<VideoResult>> {
        let max_results = self.max_results.to_string();
        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[
                ("part", "snippet"),
                ("q", query),
                ("type", "video"),
                ("maxResults", max_results.as_str()),
                ("relevanceLanguage", self.language.as_str()),
                ("regionCode", self.region.as_str()),
                ("key", api_key),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CompanionError::Api {
                status: status.as_u16(),
                message: "video search request failed".to_string(),
            });
        }

        let body: SearchListResponse = response.json().await?;
        Ok(videos_from_response(body, self.max_results as usize))
    }
}

#[async_trait]
impl VideoSearch for YouTubeSearch {
    async fn lookup_videos(&self, query: &str) -> Vec<VideoResult> {
        let Some(api_key) = self.api_key.as_deref() else {
            debug!("No video search key configured, skipping lookup");
            return Vec::new();
        };

        match self.search(api_key, query).await {
            Ok(videos) => {
                debug!(count = videos.len(), "Video lookup finished");
                videos
            }
            Err(e) => {
                warn!("Video lookup failed, returning no suggestions: {}", e);
                Vec::new()
            }
        }
    }
}

/// Keep only items that are actual videos, capped at `max`
fn videos_from_response(body: SearchListResponse, max: usize) -> Vec<VideoResult> {
    body.items
        .into_iter()
        .filter_map(|item| {
            let id = item.id.video_id?;
            let title = item.snippet.map(|s| s.title).unwrap_or_default();
            Some(VideoResult {
                url: format!("https://www.youtube.com/watch?v={id}"),
                title,
                id,
            })
        })
        .take(max)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serde_json::json;

    #[tokio::test]
    async fn test_missing_key_returns_empty() {
        let cfg = Config::default();
        assert!(cfg.video.api_key.is_none());
        let search = YouTubeSearch::from_config(&cfg.video).expect("client should build");

        assert!(search.lookup_videos("gestire l'ansia").await.is_empty());
        assert!(search.lookup_videos("").await.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_returns_empty() {
        let mut cfg = Config::default();
        cfg.video.api_key = Some("test-key".to_string());
        // Port 9 (discard) on localhost is closed in test environments
        cfg.video.base_url = "http://127.0.0.1:9".to_string();
        cfg.video.timeout_seconds = 1;
        let search = YouTubeSearch::from_config(&cfg.video).expect("client should build");

        assert!(search.lookup_videos("meditazione").await.is_empty());
    }

    #[test]
    fn test_response_mapping_skips_channels_and_caps() {
        let body: SearchListResponse = serde_json::from_value(json!({
            "items": [
                {"id": {"kind": "youtube#channel", "channelId": "abc"}, "snippet": {"title": "Canale"}},
                {"id": {"kind": "youtube#video", "videoId": "v1"}, "snippet": {"title": "Respirazione"}},
                {"id": {"kind": "youtube#video", "videoId": "v2"}, "snippet": {"title": "Mindfulness"}},
                {"id": {"kind": "youtube#video", "videoId": "v3"}}
            ]
        }))
        .expect("search response should parse");

        let videos = videos_from_response(body, 2);

        assert_eq!(
            videos,
            vec![
                VideoResult {
                    title: "Respirazione".to_string(),
                    url: "https://www.youtube.com/watch?v=v1".to_string(),
                    id: "v1".to_string(),
                },
                VideoResult {
                    title: "Mindfulness".to_string(),
                    url: "https://www.youtube.com/watch?v=v2".to_string(),
                    id: "v2".to_string(),
                },
            ]
        );
    }
}
