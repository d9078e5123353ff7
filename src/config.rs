use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// How `skip` decides which URI to drop from the playlist.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SkipMode {
    /// Remove the URI of the playlist's own first entry.
    #[default]
    PlaylistEntry,
    /// Re-resolve the first entry by searching its name and remove whatever the
    /// search returns. A different track with the same name can be removed instead.
    SearchByName,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    // Chat side
    #[serde(default = "default_bot_username")]
    pub bot_username: String,
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    #[serde(default = "default_irc_host")]
    pub irc_host: String,
    #[serde(default = "default_irc_port")]
    pub irc_port: u16,

    // Spotify side
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default)]
    pub playlist_id: String,
    #[serde(default = "default_token_cache_path")]
    pub token_cache_path: PathBuf,

    /// Upper bound on a single remote HTTP call, in seconds. 0 disables it.
    #[serde(default = "default_remote_timeout")]
    pub remote_timeout_secs: u64,
    #[serde(default)]
    pub skip_mode: SkipMode,

    /// When set, logs are also written to a daily-rotated file here.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_bot_username() -> String { "BunnySongBot".into() }
fn default_command_prefix() -> String { "song ".into() }
fn default_irc_host() -> String { "irc.chat.twitch.tv".into() }
fn default_irc_port() -> u16 { 6667 }
fn default_redirect_uri() -> String { "http://127.0.0.1:8888/callback".into() }
fn default_scope() -> String {
    "playlist-modify-private playlist-modify-public user-modify-playback-state".into()
}
fn default_token_cache_path() -> PathBuf { ".spotify_token.json".into() }
fn default_remote_timeout() -> u64 { 15 }

impl Default for Config {
    fn default() -> Self {
        // every field carries a serde default, so an empty document is a full config
        toml::from_str("").expect("empty config document always parses")
    }
}

impl Config {
    pub fn from_path(path: &std::path::Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        let cfg: Config = toml::from_str(&s)?;
        Ok(cfg)
    }

    /// Overlay values from the process environment (after `.env` was loaded).
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Overlay values from `lookup`. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |keys: &[&str]| {
            keys.iter()
                .filter_map(|k| lookup(*k))
                .map(|v| v.trim().to_string())
                .find(|v| !v.is_empty())
        };
        if let Some(v) = get(&["TWITCH_BOT_TOKEN"]) {
            self.bot_token = v;
        }
        if let Some(v) = get(&["TWITCH_CHANNEL"]) {
            self.channel = v;
        }
        if let Some(v) = get(&["TWITCH_BOT_USERNAME"]) {
            self.bot_username = v;
        }
        if let Some(v) = get(&["CLIENT_ID", "SPOTIFY_CLIENT_ID"]) {
            self.client_id = v;
        }
        if let Some(v) = get(&["CLIENT_SECRET", "SPOTIFY_CLIENT_SECRET"]) {
            self.client_secret = v;
        }
        if let Some(v) = get(&["REDIRECT_URI"]) {
            self.redirect_uri = v;
        }
        if let Some(v) = get(&["PLAYLIST_ID"]) {
            self.playlist_id = v;
        }
    }

    /// Channel name as IRC expects it: lowercase, `#`-prefixed.
    pub fn irc_channel(&self) -> String {
        let c = self.channel.trim().trim_start_matches('#').to_ascii_lowercase();
        format!("#{}", c)
    }

    /// Bot token with the `oauth:` prefix Twitch IRC wants in `PASS`.
    pub fn irc_password(&self) -> String {
        let t = self.bot_token.trim();
        if t.starts_with("oauth:") {
            t.to_string()
        } else {
            format!("oauth:{}", t)
        }
    }

    /// Values needed to talk to Spotify at all (auth flow and relay).
    pub fn validate_spotify(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.client_id.trim().is_empty() {
            missing.push("client_id");
        }
        if self.client_secret.trim().is_empty() {
            missing.push("client_secret");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(anyhow!("missing required configuration: {}", missing.join(", ")))
        }
    }

    /// Everything the relay needs before it can start.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.bot_token.trim().is_empty() {
            missing.push("bot_token");
        }
        if self.channel.trim().trim_start_matches('#').is_empty() {
            missing.push("channel");
        }
        if self.client_id.trim().is_empty() {
            missing.push("client_id");
        }
        if self.client_secret.trim().is_empty() {
            missing.push("client_secret");
        }
        if self.playlist_id.trim().is_empty() {
            missing.push("playlist_id");
        }
        if self.command_prefix.trim().is_empty() {
            missing.push("command_prefix");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(anyhow!("missing required configuration: {}", missing.join(", ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn env_overrides_file_values_and_skips_blanks() {
        let mut cfg: Config = toml::from_str(
            r#"
channel = "from_file"
client_id = "file_id"
"#,
        )
        .unwrap();
        let env: HashMap<&str, &str> = [
            ("TWITCH_CHANNEL", "from_env"),
            ("CLIENT_ID", "  "),
            ("SPOTIFY_CLIENT_SECRET", "alias_secret"),
        ]
        .into_iter()
        .collect();
        cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.channel, "from_env");
        assert_eq!(cfg.client_id, "file_id");
        assert_eq!(cfg.client_secret, "alias_secret");
    }

    #[test]
    fn validate_lists_every_missing_value() {
        let cfg = Config::default();
        let err = cfg.validate().unwrap_err().to_string();
        for key in ["bot_token", "channel", "client_id", "client_secret", "playlist_id"] {
            assert!(err.contains(key), "{} missing from {}", key, err);
        }
    }

    #[test]
    fn blank_prefix_is_reported_with_the_other_gaps() {
        let mut cfg = Config::default();
        cfg.command_prefix = "  ".into();
        let err = cfg.validate().unwrap_err().to_string();
        for key in ["command_prefix", "bot_token", "channel", "playlist_id"] {
            assert!(err.contains(key), "{} missing from {}", key, err);
        }
    }

    #[test]
    fn irc_helpers_normalise_channel_and_token() {
        let mut cfg = Config::default();
        cfg.channel = "#SingaBunny".into();
        cfg.bot_token = "abc".into();
        assert_eq!(cfg.irc_channel(), "#singabunny");
        assert_eq!(cfg.irc_password(), "oauth:abc");
        cfg.bot_token = "oauth:abc".into();
        assert_eq!(cfg.irc_password(), "oauth:abc");
    }
}
