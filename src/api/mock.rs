use super::Provider;
use crate::models::Track;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::info;

/// In-memory provider used in tests.
/// Search matches catalog tracks by case-insensitive substring of the name;
/// playlists are plain vectors keyed by id.
pub struct MockProvider {
    catalog: Vec<Track>,
    playlists: Mutex<HashMap<String, Vec<Track>>>,
    paused: AtomicBool,
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            catalog: Vec::new(),
            playlists: Mutex::new(HashMap::new()),
            paused: AtomicBool::new(false),
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_catalog(mut self, tracks: Vec<Track>) -> Self {
        self.catalog = tracks;
        self
    }

    pub fn with_playlist(self, playlist_id: &str, tracks: Vec<Track>) -> Self {
        self.playlists
            .lock()
            .expect("mock playlists poisoned")
            .insert(playlist_id.to_string(), tracks);
        self
    }

    /// Make every following remote call fail.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Number of remote calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn playlist(&self, playlist_id: &str) -> Vec<Track> {
        self.playlists
            .lock()
            .expect("mock playlists poisoned")
            .get(playlist_id)
            .cloned()
            .unwrap_or_default()
    }

    fn enter(&self, op: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("mock {} failed: service unavailable", op));
        }
        Ok(())
    }

    fn lookup(&self, uri: &str) -> Result<Track> {
        self.catalog
            .iter()
            .find(|t| t.uri == uri)
            .cloned()
            .ok_or_else(|| anyhow!("invalid track uri: {}", uri))
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn search_track(&self, query: &str) -> Result<Option<Track>> {
        self.enter("search")?;
        info!("MockProvider: search {}", query);
        let q = query.to_lowercase();
        Ok(self
            .catalog
            .iter()
            .find(|t| t.name.to_lowercase().contains(&q))
            .cloned())
    }

    async fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<Track>> {
        self.enter("playlist_tracks")?;
        Ok(self.playlist(playlist_id))
    }

    async fn add_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        self.enter("add_tracks")?;
        info!("MockProvider: add_tracks {} -> {} tracks", playlist_id, uris.len());
        let tracks = uris
            .iter()
            .map(|u| self.lookup(u))
            .collect::<Result<Vec<_>>>()?;
        let mut g = self.playlists.lock().expect("mock playlists poisoned");
        g.entry(playlist_id.to_string()).or_default().extend(tracks);
        Ok(())
    }

    async fn remove_tracks(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        self.enter("remove_tracks")?;
        info!("MockProvider: remove_tracks {} -> {} tracks", playlist_id, uris.len());
        let mut g = self.playlists.lock().expect("mock playlists poisoned");
        if let Some(items) = g.get_mut(playlist_id) {
            items.retain(|t| !uris.contains(&t.uri));
        }
        Ok(())
    }

    async fn pause_playback(&self) -> Result<()> {
        self.enter("pause")?;
        self.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn start_playback(&self) -> Result<()> {
        self.enter("resume")?;
        self.paused.store(false, Ordering::SeqCst);
        Ok(())
    }
}
