use super::Provider;
use crate::config::Config;
use crate::models::{StoredToken, Track};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use log::{debug, warn};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_LENGTH};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::json;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Spotify rejects playlist item writes of more than 100 URIs per request.
pub const MAX_BATCH: usize = 100;

pub fn auth_base() -> String {
    env::var("SPOTIFY_AUTH_BASE").unwrap_or_else(|_| "https://accounts.spotify.com".into())
}

pub fn api_base() -> String {
    // include v1 path by default
    env::var("SPOTIFY_API_BASE").unwrap_or_else(|_| "https://api.spotify.com/v1".into())
}

pub async fn read_token_cache(path: &Path) -> Result<Option<StoredToken>> {
    match tokio::fs::read_to_string(path).await {
        Ok(s) => {
            let st: StoredToken =
                serde_json::from_str(&s).map_err(|e| anyhow!("parse token json: {}", e))?;
            Ok(Some(st))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("reading token cache {}", path.display())),
    }
}

/// Persist `st` to `path`. On unix the file is readable by the owner only.
pub async fn write_token_cache(path: &Path, st: &StoredToken) -> Result<()> {
    let s = serde_json::to_string_pretty(st)?;
    write_private(path, s.as_bytes())
        .await
        .with_context(|| format!("writing token cache {}", path.display()))
}

#[cfg(unix)]
async fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    use tokio::io::AsyncWriteExt;

    let mut f = tokio::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .await?;
    // mode() only applies on creation; tighten a cache left by an older run
    f.set_permissions(std::fs::Permissions::from_mode(0o600)).await?;
    f.write_all(data).await?;
    f.flush().await
}

#[cfg(not(unix))]
async fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    tokio::fs::write(path, data).await
}

/// Authorized handle on a Spotify account.
///
/// Built once at startup and shared by reference. Owns the HTTP client, the
/// current access token and the refresh logic; refreshed tokens are written
/// back to the token cache when one is configured.
pub struct SpotifySession {
    client: Client,
    client_id: String,
    client_secret: String,
    token: tokio::sync::Mutex<StoredToken>,
    token_path: Option<PathBuf>,
    auth_base: String,
}

impl SpotifySession {
    pub fn new(client_id: String, client_secret: String, token: StoredToken) -> Self {
        Self {
            client: Client::new(),
            client_id,
            client_secret,
            token: tokio::sync::Mutex::new(token),
            token_path: None,
            auth_base: auth_base(),
        }
    }

    pub fn with_token_cache(mut self, path: PathBuf) -> Self {
        self.token_path = Some(path);
        self
    }

    pub fn with_auth_base(mut self, base: impl Into<String>) -> Self {
        self.auth_base = base.into();
        self
    }

    /// Bound every request made through this session.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = Client::builder()
            .timeout(timeout)
            .build()
            .context("building http client")?;
        Ok(self)
    }

    /// Open the session described by `cfg`. Fails when no token was cached yet.
    pub async fn load(cfg: &Config) -> Result<Self> {
        cfg.validate_spotify()?;
        let token = read_token_cache(&cfg.token_cache_path).await?.ok_or_else(|| {
            anyhow!(
                "no Spotify token cached at {}; run `auth spotify` first",
                cfg.token_cache_path.display()
            )
        })?;
        let mut session = Self::new(cfg.client_id.clone(), cfg.client_secret.clone(), token)
            .with_token_cache(cfg.token_cache_path.clone());
        if cfg.remote_timeout_secs > 0 {
            session = session.with_timeout(Duration::from_secs(cfg.remote_timeout_secs))?;
        }
        Ok(session)
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Current `Authorization` header value, refreshing first when the token is about to expire.
    pub async fn bearer(&self) -> Result<String> {
        let mut lock = self.token.lock().await;
        let now = Utc::now().timestamp();
        if now + 30 >= lock.expires_at {
            debug!("Spotify token is near expiry, refreshing");
            self.refresh_locked(&mut lock).await?;
        }
        Ok(format!("Bearer {}", lock.access_token))
    }

    /// Refresh unconditionally (used after a 401) and return the new header value.
    pub async fn force_refresh(&self) -> Result<String> {
        let mut lock = self.token.lock().await;
        self.refresh_locked(&mut lock).await?;
        Ok(format!("Bearer {}", lock.access_token))
    }

    async fn refresh_locked(&self, cur: &mut StoredToken) -> Result<()> {
        let refresh_token = cur
            .refresh_token
            .clone()
            .ok_or_else(|| anyhow!("no refresh token"))?;
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
        ];
        let auth_header = format!(
            "Basic {}",
            general_purpose::STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret))
        );
        let url = format!("{}/api/token", self.auth_base);
        let resp = self
            .client
            .post(&url)
            .header(AUTHORIZATION, auth_header)
            .form(&params)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Failed to refresh token: {} - {}", status, body));
        }
        let j: serde_json::Value = resp.json().await?;
        let access_token = j["access_token"]
            .as_str()
            .ok_or_else(|| anyhow!("no access_token"))?
            .to_string();
        let expires_in = j["expires_in"].as_i64().unwrap_or(3600);
        cur.access_token = access_token;
        cur.token_type = "Bearer".into();
        cur.expires_at = Utc::now().timestamp() + expires_in;
        // Spotify only sometimes rotates the refresh token
        if let Some(rt) = j["refresh_token"].as_str() {
            cur.refresh_token = Some(rt.to_string());
        }
        if let Some(s) = j["scope"].as_str() {
            cur.scope = Some(s.to_string());
        }
        if let Some(path) = &self.token_path {
            write_token_cache(path, cur).await?;
        }
        Ok(())
    }
}

/// Provider backed by the Spotify Web API.
/// The API base may be overridden by SPOTIFY_API_BASE (useful for tests) or `with_api_base`.
pub struct SpotifyProvider {
    session: Arc<SpotifySession>,
    api_base: String,
}

impl SpotifyProvider {
    pub fn new(session: Arc<SpotifySession>) -> Self {
        Self {
            session,
            api_base: api_base(),
        }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// Send an authorized request; on 401 refresh the token once and resend.
    async fn send<F>(&self, build: F) -> Result<Response>
    where
        F: Fn(&Client) -> RequestBuilder + Send + Sync,
    {
        let bearer = self.session.bearer().await?;
        let resp = build(self.session.client())
            .header(AUTHORIZATION, &bearer)
            .send()
            .await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }
        warn!("Got 401 from Spotify; attempting token refresh");
        let bearer2 = self.session.force_refresh().await?;
        let resp2 = build(self.session.client())
            .header(AUTHORIZATION, &bearer2)
            .send()
            .await?;
        Ok(resp2)
    }

    async fn check(resp: Response, what: &str) -> Result<Response> {
        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            return Err(anyhow!("{}: rate_limited: retry_after={:?}", what, retry_after));
        }
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            return Err(anyhow!("{} failed: {} => {}", what, status, txt));
        }
        Ok(resp)
    }

    async fn playback(&self, action: &str) -> Result<()> {
        let url = format!("{}/me/player/{}", self.api_base, action);
        let resp = self
            .send(|c| c.put(&url).header(CONTENT_LENGTH, "0"))
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            let txt = resp.text().await.unwrap_or_default();
            return Err(anyhow!("{} failed: no active playback device => {}", action, txt));
        }
        Self::check(resp, action).await?;
        Ok(())
    }
}

fn track_from_json(v: &serde_json::Value) -> Option<Track> {
    let uri = v["uri"].as_str()?;
    let name = v["name"].as_str().unwrap_or("");
    Some(Track::new(uri, name))
}

#[async_trait]
impl Provider for SpotifyProvider {
    fn name(&self) -> &str {
        "spotify"
    }

    async fn search_track(&self, query: &str) -> Result<Option<Track>> {
        let url = format!(
            "{}/search?q={}&type=track&limit=1",
            self.api_base,
            urlencoding::encode(query)
        );
        let resp = self
            .send(|c| c.get(&url).header(ACCEPT, "application/json"))
            .await?;
        let resp = Self::check(resp, "search").await?;
        let j: serde_json::Value = resp.json().await?;
        Ok(j["tracks"]["items"]
            .as_array()
            .and_then(|a| a.first())
            .and_then(track_from_json))
    }

    async fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<Track>> {
        let mut tracks = Vec::new();
        let mut next: Option<String> = Some(format!(
            "{}/playlists/{}/tracks?fields=items(track(uri,name)),next&limit={}",
            self.api_base, playlist_id, MAX_BATCH
        ));

        while let Some(url) = next {
            let resp = self.send(|c| c.get(&url)).await?;
            let resp = Self::check(resp, "list playlist tracks").await?;
            let j: serde_json::Value = resp.json().await?;
            if let Some(items) = j["items"].as_array() {
                // entries whose track was removed from the catalog come back as null
                tracks.extend(items.iter().filter_map(|it| track_from_json(&it["track"])));
            }
            next = j["next"].as_str().map(|s| s.to_string());
        }
        debug!("playlist {} has {} tracks", playlist_id, tracks.len());
        Ok(tracks)
    }

    async fn add_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        let url = format!("{}/playlists/{}/tracks", self.api_base, playlist_id);
        for chunk in uris.chunks(MAX_BATCH) {
            let body = json!({ "uris": chunk });
            let resp = self.send(|c| c.post(&url).json(&body)).await?;
            Self::check(resp, "add tracks").await?;
        }
        Ok(())
    }

    async fn remove_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        let url = format!("{}/playlists/{}/tracks", self.api_base, playlist_id);
        for chunk in uris.chunks(MAX_BATCH) {
            let tracks: Vec<serde_json::Value> = chunk.iter().map(|u| json!({ "uri": u })).collect();
            let body = json!({ "tracks": tracks });
            let resp = self.send(|c| c.delete(&url).json(&body)).await?;
            Self::check(resp, "remove tracks").await?;
        }
        Ok(())
    }

    async fn pause_playback(&self) -> Result<()> {
        self.playback("pause").await
    }

    async fn start_playback(&self) -> Result<()> {
        self.playback("play").await
    }
}
