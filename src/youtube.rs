use anyhow::{Context, Result, anyhow};
use futures::future::BoxFuture;
use image::DynamicImage;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

use crate::constants::constants;
use crate::format::{format_date, format_duration, format_views};

/// A single video card's worth of data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSummary {
  pub id: String,
  pub title: String,
  pub channel_name: String,
  pub thumbnail_url: String,
  pub upload_time_display: String,
  pub duration_display: Option<String>,
  pub views_display: Option<String>,
  pub channel_avatar_url: Option<String>,
  pub is_verified: Option<bool>,
}

impl VideoSummary {
  pub fn watch_url(&self) -> String {
    format!("https://www.youtube.com/watch?v={}", self.id)
  }
}

/// One page request against a search provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
  pub query: String,
  pub page_size: u32,
  /// Continuation token from the previous page; `None` requests page 1.
  pub page_token: Option<String>,
}

/// One page of results. `next_page_token == None` means end of results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPage {
  pub items: Vec<VideoSummary>,
  pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SearchError {
  #[error("request failed: {0}")]
  Transport(String),
  #[error("YouTube API returned {status}: {message}")]
  Api { status: u16, message: String },
  #[error("unexpected response: {0}")]
  Decode(String),
}

impl From<reqwest::Error> for SearchError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_decode() { SearchError::Decode(e.to_string()) } else { SearchError::Transport(e.to_string()) }
  }
}

/// Anything that can answer paged video searches.
///
/// Returns a boxed `'static` future so providers can be shared as
/// `Arc<dyn SearchProvider>` and the request moved into a spawned task.
pub trait SearchProvider: Send + Sync {
  fn search(&self, request: PageRequest) -> BoxFuture<'static, Result<SearchPage, SearchError>>;
}

// --- API response shapes ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchListResponse {
  next_page_token: Option<String>,
  #[serde(default)]
  items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
  id: SearchItemId,
  snippet: Option<Snippet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
  video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
  published_at: Option<String>,
  channel_id: Option<String>,
  #[serde(default)]
  title: String,
  #[serde(default)]
  channel_title: String,
  #[serde(default)]
  thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
  default: Option<Thumbnail>,
  medium: Option<Thumbnail>,
  high: Option<Thumbnail>,
}

impl Thumbnails {
  fn best(&self) -> Option<&str> {
    self.high.as_ref().or(self.medium.as_ref()).or(self.default.as_ref()).map(|t| t.url.as_str())
  }

  fn smallest(&self) -> Option<&str> {
    self.default.as_ref().or(self.medium.as_ref()).or(self.high.as_ref()).map(|t| t.url.as_str())
  }
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
  url: String,
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
  #[serde(default = "Vec::new")]
  items: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
  id: String,
  content_details: Option<ContentDetails>,
  statistics: Option<Statistics>,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
  duration: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Statistics {
  view_count: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChannelItem {
  id: String,
  snippet: Option<ChannelSnippet>,
}

#[derive(Debug, Deserialize)]
struct ChannelSnippet {
  #[serde(default)]
  thumbnails: Thumbnails,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
  error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
  message: String,
}

/// Per-video details merged in after the search call.
#[derive(Debug, Default, Clone)]
struct VideoExtras {
  duration: Option<String>,
  views: Option<String>,
}

/// A search hit before enrichment, carrying the channel id needed for avatars.
#[derive(Debug)]
struct SearchHit {
  summary: VideoSummary,
  channel_id: Option<String>,
}

fn parse_search_items(resp: SearchListResponse) -> (Vec<SearchHit>, Option<String>) {
  let hits = resp
    .items
    .into_iter()
    .filter_map(|item| {
      let id = item.id.video_id.filter(|id| !id.is_empty())?;
      let snippet = item.snippet?;
      let thumbnail_url = snippet
        .thumbnails
        .best()
        .map(str::to_string)
        .unwrap_or_else(|| format!("https://i.ytimg.com/vi/{}/hqdefault.jpg", id));
      let upload_time_display = snippet.published_at.as_deref().map(format_date).unwrap_or_default();
      Some(SearchHit {
        summary: VideoSummary {
          id,
          title: snippet.title,
          channel_name: snippet.channel_title,
          thumbnail_url,
          upload_time_display,
          duration_display: None,
          views_display: None,
          channel_avatar_url: None,
          is_verified: None,
        },
        channel_id: snippet.channel_id,
      })
    })
    .collect();
  let token = resp.next_page_token.filter(|t| !t.is_empty());
  (hits, token)
}

fn parse_video_extras(items: Vec<VideoItem>) -> HashMap<String, VideoExtras> {
  items
    .into_iter()
    .map(|v| {
      let duration = v.content_details.and_then(|c| c.duration).as_deref().and_then(format_duration);
      let views = v.statistics.and_then(|s| s.view_count).as_deref().and_then(format_views);
      (v.id, VideoExtras { duration, views })
    })
    .collect()
}

fn parse_channel_avatars(items: Vec<ChannelItem>) -> HashMap<String, String> {
  items
    .into_iter()
    .filter_map(|c| {
      let url = c.snippet?.thumbnails.smallest()?.to_string();
      Some((c.id, url))
    })
    .collect()
}

fn merge_enrichment(
  hits: Vec<SearchHit>,
  extras: &HashMap<String, VideoExtras>,
  avatars: &HashMap<String, String>,
) -> Vec<VideoSummary> {
  hits
    .into_iter()
    .map(|hit| {
      let mut summary = hit.summary;
      if let Some(x) = extras.get(&summary.id) {
        summary.duration_display = x.duration.clone();
        summary.views_display = x.views.clone();
      }
      summary.channel_avatar_url = hit.channel_id.as_ref().and_then(|c| avatars.get(c)).cloned();
      summary
    })
    .collect()
}

/// Join ids for a `*.list` call, dropping duplicates while keeping first-seen order.
fn join_ids<'a>(ids: impl Iterator<Item = &'a str>) -> String {
  let mut seen = Vec::new();
  for id in ids {
    if !seen.contains(&id) {
      seen.push(id);
    }
  }
  seen.join(",")
}

// --- Client ---

/// YouTube Data API v3 client.
#[derive(Clone)]
pub struct YouTubeClient {
  http: Client,
  api_key: String,
  base_url: String,
}

impl fmt::Debug for YouTubeClient {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("YouTubeClient").field("base_url", &self.base_url).finish_non_exhaustive()
  }
}

impl YouTubeClient {
  pub fn new(http: Client, api_key: impl Into<String>) -> Self {
    Self { http, api_key: api_key.into(), base_url: constants().api_base_url.clone() }
  }

  #[cfg(test)]
  fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
    self.base_url = base_url.into();
    self
  }

  async fn get_json<T: DeserializeOwned>(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<T, SearchError> {
    let mut url = Url::parse(&format!("{}/{}", self.base_url, endpoint))
      .map_err(|e| SearchError::Transport(format!("invalid API URL: {}", e)))?;
    url.query_pairs_mut().extend_pairs(params.iter().copied()).append_pair("key", &self.api_key);

    let response = self.http.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      let message = serde_json::from_str::<ApiErrorBody>(&body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| status.canonical_reason().unwrap_or("unknown error").to_string());
      return Err(SearchError::Api { status: status.as_u16(), message });
    }
    Ok(response.json::<T>().await?)
  }

  async fn video_extras(&self, ids: &str) -> Result<HashMap<String, VideoExtras>, SearchError> {
    if ids.is_empty() {
      return Ok(HashMap::new());
    }
    let query = [("part", "contentDetails,statistics"), ("id", ids)];
    let resp: ListResponse<VideoItem> = self.get_json("videos", &query).await?;
    Ok(parse_video_extras(resp.items))
  }

  async fn channel_avatars(&self, ids: &str) -> Result<HashMap<String, String>, SearchError> {
    if ids.is_empty() {
      return Ok(HashMap::new());
    }
    let resp: ListResponse<ChannelItem> = self.get_json("channels", &[("part", "snippet"), ("id", ids)]).await?;
    Ok(parse_channel_avatars(resp.items))
  }

  pub async fn search_page(&self, request: PageRequest) -> Result<SearchPage, SearchError> {
    let max_results = request.page_size.to_string();
    let mut params: Vec<(&str, &str)> =
      vec![("part", "snippet"), ("type", "video"), ("q", request.query.as_str()), ("maxResults", max_results.as_str())];
    if let Some(token) = request.page_token.as_deref() {
      params.push(("pageToken", token));
    }
    let resp: SearchListResponse = self.get_json("search", &params).await?;
    let (hits, next_page_token) = parse_search_items(resp);
    debug!(query = %request.query, count = hits.len(), has_more = next_page_token.is_some(), "youtube: search page");

    let video_ids = join_ids(hits.iter().map(|h| h.summary.id.as_str()));
    let channel_ids = join_ids(hits.iter().filter_map(|h| h.channel_id.as_deref()));

    // Enrichment is best-effort: a page without durations still renders.
    let (extras, avatars) =
      match futures::try_join!(self.video_extras(&video_ids), self.channel_avatars(&channel_ids)) {
        Ok(pair) => pair,
        Err(e) => {
          warn!(err = %e, "youtube: enrichment failed, showing bare results");
          (HashMap::new(), HashMap::new())
        }
      };

    Ok(SearchPage { items: merge_enrichment(hits, &extras, &avatars), next_page_token })
  }
}

impl SearchProvider for YouTubeClient {
  fn search(&self, request: PageRequest) -> BoxFuture<'static, Result<SearchPage, SearchError>> {
    let client = self.clone();
    Box::pin(async move { client.search_page(request).await })
  }
}

/// Download and decode a single image.
pub async fn fetch_image(client: &Client, url: &str) -> Result<DynamicImage> {
  let response = client
    .get(url)
    .send()
    .await
    .and_then(|r| r.error_for_status())
    .with_context(|| format!("Failed to fetch image {}", url))?;
  let image_bytes = response.bytes().await.with_context(|| format!("Failed to read image bytes from {}", url))?;
  image::load_from_memory(&image_bytes).with_context(|| format!("Failed to decode image from memory (URL: {})", url))
}

/// Fetch a preview thumbnail, falling back to the public image host when the
/// API-provided URL fails.
pub async fn fetch_thumbnail(client: &Client, summary: &VideoSummary) -> Result<DynamicImage> {
  let thumbnail_urls = [
    summary.thumbnail_url.clone(),
    format!("https://i.ytimg.com/vi/{}/hqdefault.jpg", summary.id),
    format!("https://i.ytimg.com/vi/{}/mqdefault.jpg", summary.id),
  ];

  for url in thumbnail_urls.iter().filter(|u| !u.is_empty()) {
    match fetch_image(client, url).await {
      Ok(image) => return Ok(image),
      Err(e) => debug!(video = %summary.id, err = %format!("{:#}", e), "thumbnail candidate failed"),
    }
  }
  Err(anyhow!("Failed to fetch any thumbnail for video ID: {}", summary.id))
}
