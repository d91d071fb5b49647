use std::time::Duration;

use log::debug;
use serde::Deserialize;

use crate::error::FetchError;

use super::reference::youtube_video_id;

/// What the catalog knows about a piece of content before it is downloaded.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentInfo {
    pub title: String,
    pub duration: Duration,
}

/// Remote catalog that maps references to content ids and describes them.
pub trait Catalog: Send + Sync {
    /// Provider-specific content id for a canonical reference, if supported.
    fn content_id(&self, reference: &str) -> Option<String>;

    fn describe(&self, content_id: &str) -> Result<ContentInfo, FetchError>;
}

/// YouTube Data API v3 (`videos.list`).
pub struct YouTubeCatalog {
    agent: ureq::Agent,
    api_base: String,
    api_key: Option<String>,
}

impl YouTubeCatalog {
    pub fn new(api_base: impl Into<String>, api_key: Option<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(15))
            .build();
        Self {
            agent,
            api_base: api_base.into(),
            api_key,
        }
    }
}

impl Catalog for YouTubeCatalog {
    fn content_id(&self, reference: &str) -> Option<String> {
        youtube_video_id(reference)
    }

    fn describe(&self, content_id: &str) -> Result<ContentInfo, FetchError> {
        let Some(key) = self.api_key.as_deref() else {
            return Err(FetchError::Metadata("YouTube API key not set".to_string()));
        };

        let url = format!("{}/videos", self.api_base.trim_end_matches('/'));
        debug!("querying {url} for {content_id}");
        let body = self
            .agent
            .get(&url)
            .query("part", "snippet,contentDetails")
            .query("id", content_id)
            .query("key", key)
            .call()
            .map_err(|e| FetchError::Metadata(e.to_string()))?
            .into_string()
            .map_err(|e| FetchError::Metadata(e.to_string()))?;

        parse_video_list(content_id, &body)
    }
}

#[derive(Deserialize)]
struct VideoList {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Deserialize)]
struct VideoItem {
    snippet: Snippet,
    #[serde(rename = "contentDetails")]
    content_details: ContentDetails,
}

#[derive(Deserialize)]
struct Snippet {
    title: String,
}

#[derive(Deserialize)]
struct ContentDetails {
    duration: String,
}

pub(super) fn parse_video_list(content_id: &str, body: &str) -> Result<ContentInfo, FetchError> {
    let list: VideoList =
        serde_json::from_str(body).map_err(|e| FetchError::Metadata(e.to_string()))?;
    let item = list
        .items
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::InvalidReference(format!("no video with id {content_id}")))?;
    let duration = parse_iso8601_duration(&item.content_details.duration).ok_or_else(|| {
        FetchError::Metadata(format!(
            "unparseable duration {:?}",
            item.content_details.duration
        ))
    })?;
    Ok(ContentInfo {
        title: item.snippet.title,
        duration,
    })
}

/// `PT1H2M3S`, `P1DT2H`, `PT4M13.5S`, `P0D`. Years and months are rejected
/// since their length is ambiguous.
pub fn parse_iso8601_duration(s: &str) -> Option<Duration> {
    let rest = s.strip_prefix('P')?;
    let (date, time) = match rest.split_once('T') {
        Some((d, t)) => (d, Some(t)),
        None => (rest, None),
    };

    let mut secs = 0f64;
    let mut seen_any = false;

    for (value, unit) in components(date)? {
        secs += value
            * match unit {
                'W' => 604_800.0,
                'D' => 86_400.0,
                _ => return None,
            };
        seen_any = true;
    }
    if let Some(time) = time {
        let parts = components(time)?;
        if parts.is_empty() {
            return None;
        }
        for (value, unit) in parts {
            secs += value
                * match unit {
                    'H' => 3600.0,
                    'M' => 60.0,
                    'S' => 1.0,
                    _ => return None,
                };
            seen_any = true;
        }
    }

    seen_any.then(|| Duration::from_secs_f64(secs))
}

fn components(s: &str) -> Option<Vec<(f64, char)>> {
    let mut out = Vec::new();
    let mut number = String::new();
    for c in s.chars() {
        if c.is_ascii_digit() || c == '.' {
            number.push(c);
        } else {
            let value: f64 = number.parse().ok()?;
            out.push((value, c));
            number.clear();
        }
    }
    number.is_empty().then_some(out)
}
