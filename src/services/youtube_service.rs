use anyhow::{anyhow, Result};
use chrono::NaiveDateTime;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;
use url::Url;

use crate::config::YoutubeConfig;
use crate::models::VideoMetricsChanges;

fn video_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?:https?://)?(?:www\.)?(?:youtube\.com/(?:[^/\n\s]+/\S+/|(?:v|e(?:mbed)?|shorts)/|\S*?[?&]v=)|youtu\.be/)([a-zA-Z0-9_-]{11})",
        )
        .expect("valid video id regex")
    })
}

/// The 11-character video id from a watch, shorts, embed or `youtu.be` link.
pub fn parse_video_id(link: &str) -> Option<String> {
    video_id_regex()
        .captures(link.trim())
        .map(|caps| caps[1].to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoStats {
    pub video_id: String,
    pub title: String,
    pub views: i64,
    pub likes: i64,
    pub comments: i64,
    pub thumbnail_url: Option<String>,
}

impl VideoStats {
    pub fn into_changes(self, link: &str, fetched_at: NaiveDateTime) -> VideoMetricsChanges {
        VideoMetricsChanges {
            youtube_link: Some(link.to_string()),
            youtube_title: Some(self.title),
            youtube_views: Some(self.views),
            youtube_likes: Some(self.likes),
            youtube_comments: Some(self.comments),
            youtube_thumbnail_url: self.thumbnail_url,
            youtube_stats_last_updated: Some(fetched_at),
        }
    }
}

// Data API response shapes. Counts arrive as decimal strings.
#[derive(Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Deserialize)]
struct VideoItem {
    id: String,
    #[serde(default)]
    statistics: Statistics,
    snippet: Option<Snippet>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    view_count: Option<String>,
    like_count: Option<String>,
    comment_count: Option<String>,
}

#[derive(Deserialize)]
struct Snippet {
    title: String,
    #[serde(default)]
    thumbnails: HashMap<String, Thumbnail>,
}

#[derive(Deserialize)]
struct Thumbnail {
    url: String,
}

fn count(raw: &Option<String>) -> i64 {
    raw.as_deref().and_then(|s| s.parse().ok()).unwrap_or(0)
}

impl From<VideoItem> for VideoStats {
    fn from(item: VideoItem) -> Self {
        let (title, thumbnail_url) = match item.snippet {
            Some(snippet) => {
                let thumb = snippet
                    .thumbnails
                    .get("medium")
                    .or_else(|| snippet.thumbnails.get("default"))
                    .map(|t| t.url.clone());
                (snippet.title, thumb)
            }
            None => (String::new(), None),
        };
        Self {
            views: count(&item.statistics.view_count),
            likes: count(&item.statistics.like_count),
            comments: count(&item.statistics.comment_count),
            video_id: item.id,
            title,
            thumbnail_url,
        }
    }
}

fn parse_stats_response(body: &str) -> Result<Vec<VideoStats>> {
    let response: VideoListResponse = serde_json::from_str(body)
        .map_err(|e| anyhow!("Failed to parse YouTube response: {}", e))?;
    Ok(response.items.into_iter().map(VideoStats::from).collect())
}

/// Read-only client for video statistics.
pub struct YoutubeService {
    client: Client,
    endpoint: String,
    batch_size: usize,
}

impl YoutubeService {
    pub fn new(config: &YoutubeConfig) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            endpoint: config.api_endpoint.clone(),
            batch_size: config.batch_size.clamp(1, 50),
        })
    }

    fn request_url(&self, ids: &[&str], api_key: &str) -> Result<Url> {
        let joined = ids.join(",");
        Ok(Url::parse_with_params(
            &self.endpoint,
            &[
                ("part", "statistics,snippet"),
                ("id", joined.as_str()),
                ("key", api_key),
            ],
        )?)
    }

    async fn fetch(&self, ids: &[&str], api_key: &str) -> Result<Vec<VideoStats>> {
        let url = self.request_url(ids, api_key)?;
        let res = self.client.get(url).send().await?;

        let status = res.status();
        let body = res.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
                .unwrap_or(body);
            return Err(anyhow!("YouTube API error ({}): {}", status.as_u16(), message));
        }

        parse_stats_response(&body)
    }

    pub async fn fetch_stats(&self, video_id: &str, api_key: &str) -> Result<VideoStats> {
        self.fetch(&[video_id], api_key)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Video not found or is private"))
    }

    /// Stats for many videos, keyed by id. A chunk that fails is logged and
    /// skipped so one bad request does not sink the rest.
    pub async fn fetch_stats_in_batch(
        &self,
        video_ids: &[String],
        api_key: &str,
    ) -> HashMap<String, VideoStats> {
        let mut stats = HashMap::new();
        for chunk in video_ids.chunks(self.batch_size) {
            let ids: Vec<&str> = chunk.iter().map(String::as_str).collect();
            match self.fetch(&ids, api_key).await {
                Ok(items) => {
                    for item in items {
                        stats.insert(item.video_id.clone(), item);
                    }
                }
                Err(e) => tracing::error!("Failed to fetch stats for {} videos: {}", ids.len(), e),
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_video_id_accepts_common_link_shapes() {
        let id = Some("dQw4w9WgXcQ".to_string());
        assert_eq!(parse_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"), id);
        assert_eq!(parse_video_id("https://youtube.com/watch?feature=share&v=dQw4w9WgXcQ"), id);
        assert_eq!(parse_video_id("https://youtu.be/dQw4w9WgXcQ?t=42"), id);
        assert_eq!(parse_video_id("youtube.com/embed/dQw4w9WgXcQ"), id);
        assert_eq!(parse_video_id("  www.youtube.com/v/dQw4w9WgXcQ  "), id);
        assert_eq!(parse_video_id("https://www.youtube.com/shorts/dQw4w9WgXcQ"), id);
        assert_eq!(parse_video_id("https://youtube.com/shorts/dQw4w9WgXcQ?feature=share"), id);
        assert_eq!(parse_video_id("https://www.youtube.com/e/dQw4w9WgXcQ"), id);
    }

    #[test]
    fn test_parse_video_id_rejects_other_links() {
        assert_eq!(parse_video_id("https://vimeo.com/123456789"), None);
        assert_eq!(parse_video_id("https://youtu.be/short"), None);
        assert_eq!(parse_video_id(""), None);
    }

    #[test]
    fn test_request_url_encodes_ids_and_key() {
        let service = YoutubeService::new(&YoutubeConfig::default()).unwrap();
        let url = service.request_url(&["aaaaaaaaaaa", "bbbbbbbbbbb"], "k&y").unwrap();
        let pairs: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["part"], "statistics,snippet");
        assert_eq!(pairs["id"], "aaaaaaaaaaa,bbbbbbbbbbb");
        assert_eq!(pairs["key"], "k&y");
    }

    #[test]
    fn test_parse_stats_response_reads_counts_and_thumbnail_fallback() {
        let body = r#"{
            "items": [
                {
                    "id": "aaaaaaaaaaa",
                    "statistics": { "viewCount": "1200", "likeCount": "30", "commentCount": "4" },
                    "snippet": { "title": "First", "thumbnails": {
                        "default": { "url": "https://i.ytimg.com/a/default.jpg" },
                        "medium": { "url": "https://i.ytimg.com/a/mq.jpg" }
                    } }
                },
                {
                    "id": "bbbbbbbbbbb",
                    "statistics": { "viewCount": "7" },
                    "snippet": { "title": "Second", "thumbnails": {
                        "default": { "url": "https://i.ytimg.com/b/default.jpg" }
                    } }
                }
            ]
        }"#;

        let stats = parse_stats_response(body).unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].views, 1200);
        assert_eq!(stats[0].thumbnail_url.as_deref(), Some("https://i.ytimg.com/a/mq.jpg"));
        assert_eq!(stats[1].likes, 0);
        assert_eq!(stats[1].thumbnail_url.as_deref(), Some("https://i.ytimg.com/b/default.jpg"));

        assert!(parse_stats_response(r#"{"items": []}"#).unwrap().is_empty());
        assert!(parse_stats_response("nope").is_err());
    }

    #[test]
    fn test_into_changes_stamps_fetch_time() {
        let fetched_at = chrono::Utc::now().naive_utc();
        let changes = VideoStats {
            video_id: "aaaaaaaaaaa".into(),
            title: "First".into(),
            views: 10,
            likes: 2,
            comments: 1,
            thumbnail_url: None,
        }
        .into_changes("https://youtu.be/aaaaaaaaaaa", fetched_at);

        assert_eq!(changes.youtube_views, Some(10));
        assert_eq!(changes.youtube_stats_last_updated, Some(fetched_at));
        assert_eq!(changes.youtube_link.as_deref(), Some("https://youtu.be/aaaaaaaaaaa"));
    }
}
