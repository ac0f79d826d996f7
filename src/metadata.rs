//! Music metadata service abstraction and implementations.
//!
//! Defines the [`MetadataService`] trait and concrete implementations:
//! - **[`DisabledService`]** — fails every call; with it the pipeline runs
//!   purely from the response cache.
//! - **[`SpotifyClient`]** — the Spotify Web API, authenticated with the
//!   client-credentials flow.
//!
//! Responses are returned raw so they can be cached verbatim. Search
//! responses follow the Spotify shape, which [`first_track`] knows how to
//! read:
//!
//! ```text
//! {"tracks": {"items": [{"id": "...", "name": "...",
//!                        "artists": [{"name": "..."}],
//!                        "album": {"name": "..."}}]}}
//! ```

use async_trait::async_trait;
use base64::Engine;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Url;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::MetadataConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::http;

const SERVICE: &str = "metadata";

/// Spotify accepts at most this many ids per audio-features request.
pub const MAX_IDS_PER_REQUEST: usize = 100;

/// Source of canonical track identities and audio features.
#[async_trait]
pub trait MetadataService: Send + Sync {
    /// Search for tracks matching a normalized query. Returns the raw response.
    async fn search(&self, query: &str) -> PipelineResult<Value>;

    /// Fetch raw audio-feature records, positionally aligned with `ids`.
    /// An id the service does not know yields `Value::Null` in its slot.
    async fn features_for(&self, ids: &[String]) -> PipelineResult<Vec<Value>>;
}

/// Identity fields taken from a search hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackIdentity {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
}

/// Read the first track of a raw search response. No ranking is applied
/// among multiple hits.
pub fn first_track(response: &Value) -> Option<TrackIdentity> {
    let item = response.pointer("/tracks/items/0")?;
    let text = |ptr: &str| item.pointer(ptr).and_then(|v| v.as_str()).map(str::to_string);
    Some(TrackIdentity {
        id: text("/id")?,
        title: text("/name")?,
        artist: text("/artists/0/name")?,
        album: text("/album/name").unwrap_or_default(),
    })
}

/// Build the configured metadata service.
pub fn create_service(config: &MetadataConfig) -> anyhow::Result<Box<dyn MetadataService>> {
    match config.provider.as_str() {
        "spotify" => Ok(Box::new(SpotifyClient::from_env(config)?)),
        "disabled" => Ok(Box::new(DisabledService)),
        other => anyhow::bail!("Unknown metadata provider: {}", other),
    }
}

// ============ Disabled Service ============

/// Service used when `metadata.provider = "disabled"`. Anything not already
/// in the cache fails to resolve.
pub struct DisabledService;

#[async_trait]
impl MetadataService for DisabledService {
    async fn search(&self, _query: &str) -> PipelineResult<Value> {
        Err(PipelineError::external(SERVICE, "metadata provider is disabled"))
    }

    async fn features_for(&self, _ids: &[String]) -> PipelineResult<Vec<Value>> {
        Err(PipelineError::external(SERVICE, "metadata provider is disabled"))
    }
}

// ============ Spotify ============

struct AccessToken {
    value: String,
    expires_at: Instant,
}

/// Spotify Web API client.
///
/// Requires `SPOTIFY_CLIENT_ID` and `SPOTIFY_CLIENT_SECRET` in the
/// environment. The access token is fetched lazily and renewed a minute
/// before it expires.
pub struct SpotifyClient {
    client: reqwest::Client,
    api_url: String,
    token_url: String,
    client_id: String,
    client_secret: String,
    max_retries: u32,
    token: Mutex<Option<AccessToken>>,
}

impl SpotifyClient {
    pub fn new(config: &MetadataConfig, client_id: String, client_secret: String) -> PipelineResult<Self> {
        Ok(Self {
            client: http::build_client(config.timeout_secs)?,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token_url: config.token_url.clone(),
            client_id,
            client_secret,
            max_retries: config.max_retries,
            token: Mutex::new(None),
        })
    }

    /// # Errors
    ///
    /// Returns an error if either credential variable is unset.
    pub fn from_env(config: &MetadataConfig) -> anyhow::Result<Self> {
        let client_id = std::env::var("SPOTIFY_CLIENT_ID")
            .map_err(|_| anyhow::anyhow!("SPOTIFY_CLIENT_ID environment variable not set"))?;
        let client_secret = std::env::var("SPOTIFY_CLIENT_SECRET")
            .map_err(|_| anyhow::anyhow!("SPOTIFY_CLIENT_SECRET environment variable not set"))?;
        Ok(Self::new(config, client_id, client_secret)?)
    }

    async fn access_token(&self) -> PipelineResult<String> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        debug!("requesting Spotify access token");
        let credentials = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", self.client_id, self.client_secret));
        let response = http::send_with_retry(SERVICE, self.max_retries, || {
            self.client
                .post(&self.token_url)
                .header(AUTHORIZATION, format!("Basic {}", credentials))
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body("grant_type=client_credentials")
        })
        .await?;
        let json = http::json_body(SERVICE, response).await?;
        let value = json
            .get("access_token")
            .and_then(|v| v.as_str())
            .ok_or_else(|| PipelineError::external(SERVICE, "token response missing access_token"))?
            .to_string();
        let lifetime = json.get("expires_in").and_then(|v| v.as_u64()).unwrap_or(3600);
        let expires_at = Instant::now() + Duration::from_secs(lifetime.saturating_sub(60));

        *guard = Some(AccessToken {
            value: value.clone(),
            expires_at,
        });
        Ok(value)
    }

    async fn get_json(&self, url: Url) -> PipelineResult<Value> {
        let token = self.access_token().await?;
        let response = http::send_with_retry(SERVICE, self.max_retries, || {
            self.client
                .get(url.clone())
                .header(AUTHORIZATION, format!("Bearer {}", token))
        })
        .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Value::Null);
        }
        http::json_body(SERVICE, response).await
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> PipelineResult<Url> {
        Url::parse_with_params(&format!("{}/{}", self.api_url, path), params)
            .map_err(|e| PipelineError::external(SERVICE, format!("bad API URL: {}", e)))
    }
}

#[async_trait]
impl MetadataService for SpotifyClient {
    async fn search(&self, query: &str) -> PipelineResult<Value> {
        info!(query, "searching metadata service");
        let url = self.endpoint("search", &[("q", query), ("type", "track"), ("limit", "1")])?;
        match self.get_json(url).await? {
            Value::Null => Err(PipelineError::external(SERVICE, "search endpoint not found")),
            response => Ok(response),
        }
    }

    async fn features_for(&self, ids: &[String]) -> PipelineResult<Vec<Value>> {
        let mut records = Vec::with_capacity(ids.len());
        for batch in ids.chunks(MAX_IDS_PER_REQUEST) {
            info!(count = batch.len(), "fetching audio features");
            let joined = batch.join(",");
            let url = self.endpoint("audio-features", &[("ids", joined.as_str())])?;
            let json = self.get_json(url).await?;
            records.extend(parse_features_response(&json, batch.len())?);
        }
        Ok(records)
    }
}

/// Pull the `audio_features` array out of a response, checking alignment.
fn parse_features_response(json: &Value, expected: usize) -> PipelineResult<Vec<Value>> {
    let list = json
        .get("audio_features")
        .and_then(|v| v.as_array())
        .ok_or_else(|| PipelineError::external(SERVICE, "response missing audio_features array"))?;
    if list.len() != expected {
        return Err(PipelineError::external(
            SERVICE,
            format!("expected {} feature records, got {}", expected, list.len()),
        ));
    }
    Ok(list.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_first_track_takes_first_item_only() {
        let response = json!({
            "tracks": {"items": [
                {"id": "1", "name": "Butter", "artists": [{"name": "BTS"}], "album": {"name": "Butter"}},
                {"id": "2", "name": "Butter (Remix)", "artists": [{"name": "BTS"}], "album": {"name": "Other"}}
            ]}
        });
        let hit = first_track(&response).unwrap();
        assert_eq!(hit.id, "1");
        assert_eq!(hit.title, "Butter");
        assert_eq!(hit.artist, "BTS");
        assert_eq!(hit.album, "Butter");
    }

    #[test]
    fn test_first_track_none_when_no_items() {
        assert!(first_track(&json!({"tracks": {"items": []}})).is_none());
        assert!(first_track(&Value::Null).is_none());
    }

    #[test]
    fn test_first_track_missing_album_is_empty() {
        let response = json!({
            "tracks": {"items": [{"id": "9", "name": "Solo", "artists": [{"name": "X"}]}]}
        });
        assert_eq!(first_track(&response).unwrap().album, "");
    }

    #[test]
    fn test_features_response_alignment() {
        let json = json!({"audio_features": [{"energy": 0.5}, null]});
        let records = parse_features_response(&json, 2).unwrap();
        assert!(records[1].is_null());
        assert!(parse_features_response(&json, 3).is_err());
        assert!(parse_features_response(&json!({}), 1).is_err());
    }

    #[tokio::test]
    async fn test_disabled_service_fails() {
        let err = DisabledService.search("butter bts").await.unwrap_err();
        assert!(matches!(err, PipelineError::ExternalService { .. }));
    }
}
