use crate::api::Provider;
use crate::config::SkipMode;
use crate::error::{RelayError, RelayResult};
use crate::models::Track;
use std::sync::Arc;
use tracing::debug;

/// Domain operations over the one configured playlist.
///
/// Holds no playlist state of its own: every read goes back to the provider,
/// since playback keeps changing the remote side. Remote failures come back as
/// `RelayError::RemoteService`; nothing is retried here.
pub struct PlaylistService {
    provider: Arc<dyn Provider>,
    playlist_id: String,
    skip_mode: SkipMode,
}

impl PlaylistService {
    pub fn new(provider: Arc<dyn Provider>, playlist_id: impl Into<String>) -> Self {
        Self {
            provider,
            playlist_id: playlist_id.into(),
            skip_mode: SkipMode::default(),
        }
    }

    pub fn with_skip_mode(mut self, mode: SkipMode) -> Self {
        self.skip_mode = mode;
        self
    }

    pub fn playlist_id(&self) -> &str {
        &self.playlist_id
    }

    pub fn skip_mode(&self) -> SkipMode {
        self.skip_mode
    }

    /// Top search hit for `query`, or `None`. A miss is not an error.
    pub async fn search_track(&self, query: &str) -> RelayResult<Option<Track>> {
        self.provider
            .search_track(query)
            .await
            .map_err(RelayError::remote)
    }

    /// Append a track. The remote side does not dedupe.
    pub async fn enqueue(&self, track_uri: &str) -> RelayResult<()> {
        self.provider
            .add_tracks(&self.playlist_id, &[track_uri.to_string()])
            .await
            .map_err(RelayError::remote)
    }

    async fn tracks(&self) -> RelayResult<Vec<Track>> {
        self.provider
            .playlist_tracks(&self.playlist_id)
            .await
            .map_err(RelayError::remote)
    }

    /// Track at position 0.
    pub async fn current_track(&self) -> RelayResult<Track> {
        self.tracks()
            .await?
            .into_iter()
            .next()
            .ok_or(RelayError::EmptyPlaylist)
    }

    /// Drop the current track (all of its occurrences).
    pub async fn skip(&self) -> RelayResult<Track> {
        let current = self.current_track().await?;
        let uri = match self.skip_mode {
            SkipMode::PlaylistEntry => current.uri.clone(),
            SkipMode::SearchByName => {
                // may resolve to a different track that shares the name
                let found = self
                    .search_track(&current.name)
                    .await?
                    .ok_or_else(|| RelayError::NotFound(current.name.clone()))?;
                if found.uri != current.uri {
                    debug!(
                        "skip resolved {:?} to {} instead of playlist entry {}",
                        current.name, found.uri, current.uri
                    );
                }
                found.uri
            }
        };
        self.remove(&uri).await?;
        Ok(current)
    }

    /// Remove every occurrence of `track_uri`.
    pub async fn remove(&self, track_uri: &str) -> RelayResult<()> {
        self.provider
            .remove_tracks(&self.playlist_id, &[track_uri.to_string()])
            .await
            .map_err(RelayError::remote)
    }

    /// Empty the playlist. Returns how many entries were removed.
    pub async fn clear(&self) -> RelayResult<usize> {
        let tracks = self.tracks().await?;
        if tracks.is_empty() {
            return Ok(0);
        }
        let mut uris: Vec<String> = tracks.iter().map(|t| t.uri.clone()).collect();
        let count = uris.len();
        uris.sort();
        uris.dedup();
        self.provider
            .remove_tracks(&self.playlist_id, &uris)
            .await
            .map_err(RelayError::remote)?;
        Ok(count)
    }

    /// Display names in playlist order.
    pub async fn list_tracks(&self) -> RelayResult<Vec<String>> {
        Ok(self.tracks().await?.into_iter().map(|t| t.name).collect())
    }

    pub async fn pause(&self) -> RelayResult<()> {
        self.provider.pause_playback().await.map_err(RelayError::remote)
    }

    pub async fn resume(&self) -> RelayResult<()> {
        self.provider.start_playback().await.map_err(RelayError::remote)
    }
}
