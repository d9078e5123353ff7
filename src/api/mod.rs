pub mod spotify;
pub mod mock;
pub mod spotify_auth;

use crate::models::Track;
use anyhow::Result;

/// Provider trait: the remote operations the playlist service needs.
/// Implementations: spotify::SpotifyProvider and mock::MockProvider.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    /// Single-result track search. `None` when nothing matches.
    async fn search_track(&self, query: &str) -> Result<Option<Track>>;

    /// All tracks of a playlist, in playlist order.
    async fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<Track>>;

    /// Append tracks (URIs) to a playlist.
    async fn add_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<()>;

    /// Remove every occurrence of the given URIs from a playlist.
    async fn remove_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<()>;

    /// Pause playback on the account's active device.
    async fn pause_playback(&self) -> Result<()>;

    /// Resume playback on the account's active device.
    async fn start_playback(&self) -> Result<()>;

    /// Return the provider's name (for logging)
    fn name(&self) -> &str;
}
