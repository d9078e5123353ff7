use crate::config::Config;
use crate::models::StoredToken;
use anyhow::{anyhow, Result};
use base64::{engine::general_purpose, Engine as _};
use reqwest::Client;
use serde::Deserialize;
use tracing::info;
use url::Url;

/// Manual authorization-code helper:
/// 1. Build the Spotify authorization URL and print it.
/// 2. User opens it in a browser, approves and gets redirected to the redirect URI (which may fail if nothing listens there).
/// 3. User copies the full redirect URL and pastes it into this CLI.
/// 4. The `code` param is exchanged for an access_token + refresh_token.
/// 5. The tokens are written to the token cache file the relay reads at startup.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    token_type: String,
    expires_in: i64,
    refresh_token: Option<String>,
    scope: Option<String>,
}

pub fn authorize_url(cfg: &Config) -> Result<Url> {
    let mut url = Url::parse(&format!("{}/authorize", super::spotify::auth_base()))?;
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &cfg.client_id)
        .append_pair("scope", &cfg.scope)
        .append_pair("redirect_uri", &cfg.redirect_uri)
        .append_pair("show_dialog", "true");
    Ok(url)
}

/// Pull the `code` query parameter out of the pasted redirect URL.
pub fn extract_code(redirect_url: &str) -> Result<String> {
    let parsed = Url::parse(redirect_url.trim()).map_err(|e| anyhow!("invalid url pasted: {}", e))?;
    if let Some((_, err)) = parsed.query_pairs().find(|(k, _)| k == "error") {
        return Err(anyhow!("authorization was denied: {}", err));
    }
    let code = parsed
        .query_pairs()
        .find(|(k, _)| k == "code")
        .ok_or_else(|| anyhow!("no code in redirect URL"))?
        .1
        .into_owned();
    Ok(code)
}

/// Exchange an authorization code for tokens at `{auth_base}/api/token`.
pub async fn exchange_code(
    client: &Client,
    auth_base: &str,
    cfg: &Config,
    code: &str,
) -> Result<StoredToken> {
    let params = [
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", cfg.redirect_uri.as_str()),
    ];
    let auth_header = format!(
        "Basic {}",
        general_purpose::STANDARD.encode(format!("{}:{}", cfg.client_id, cfg.client_secret))
    );
    let resp = client
        .post(format!("{}/api/token", auth_base))
        .header("Authorization", auth_header)
        .form(&params)
        .send()
        .await?;
    let status = resp.status();
    if !status.is_success() {
        let txt = resp.text().await.unwrap_or_default();
        return Err(anyhow!("token exchange failed: {} => {}", status, txt));
    }

    let tr: TokenResponse = resp.json().await?;
    Ok(StoredToken {
        access_token: tr.access_token,
        token_type: tr.token_type,
        expires_at: chrono::Utc::now().timestamp() + tr.expires_in,
        refresh_token: tr.refresh_token,
        scope: tr.scope,
    })
}

pub async fn run_spotify_auth(cfg: &Config) -> Result<()> {
    use std::io;

    cfg.validate_spotify()?;
    let url = authorize_url(cfg)?;
    println!(
        "Open this URL in your browser and authorize the application:\n\n{}\n",
        url
    );
    println!("After authorizing, you'll be redirected to your redirect URI. Copy the full redirect URL and paste it here.");
    println!("Paste redirect URL:");
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let code = extract_code(&input)?;

    let token = exchange_code(&Client::new(), &super::spotify::auth_base(), cfg, &code).await?;
    super::spotify::write_token_cache(&cfg.token_cache_path, &token).await?;

    info!("Spotify tokens saved to {}", cfg.token_cache_path.display());
    println!("Saved tokens. You can now start the relay with `run`.");
    Ok(())
}
