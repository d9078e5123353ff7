use song_request_relay as lib;
use lib::api::mock::MockProvider;
use lib::error::RelayError;
use lib::models::Track;
use lib::service::PlaylistService;
use std::sync::Arc;

const PL: &str = "pl1";

fn numbered(n: usize) -> Vec<Track> {
    (0..n)
        .map(|i| Track::new(format!("spotify:track:{}", i), format!("Song {}", i)))
        .collect()
}

#[tokio::test]
async fn search_miss_is_none_not_an_error() {
    let mock = Arc::new(MockProvider::new().with_catalog(numbered(3)));
    let svc = PlaylistService::new(mock, PL);
    assert_eq!(svc.search_track("Song 2").await.unwrap(), Some(Track::new("spotify:track:2", "Song 2")));
    assert_eq!(svc.search_track("Thriller").await.unwrap(), None);
}

#[tokio::test]
async fn enqueue_then_list_includes_track() {
    let catalog = numbered(2);
    let mock = Arc::new(
        MockProvider::new()
            .with_catalog(catalog.clone())
            .with_playlist(PL, vec![catalog[0].clone()]),
    );
    let svc = PlaylistService::new(mock, PL);

    svc.enqueue(&catalog[1].uri).await.unwrap();
    // appending twice keeps both entries
    svc.enqueue(&catalog[1].uri).await.unwrap();
    assert_eq!(svc.list_tracks().await.unwrap(), vec!["Song 0", "Song 1", "Song 1"]);
}

#[tokio::test]
async fn current_track_on_empty_playlist() {
    let mock = Arc::new(MockProvider::new());
    let svc = PlaylistService::new(mock, PL);
    let err = svc.current_track().await.unwrap_err();
    assert!(matches!(err, RelayError::EmptyPlaylist));
}

#[tokio::test]
async fn current_track_is_first_entry() {
    let mock = Arc::new(MockProvider::new().with_playlist(PL, numbered(3)));
    let svc = PlaylistService::new(mock, PL);
    assert_eq!(svc.current_track().await.unwrap().name, "Song 0");
}

#[tokio::test]
async fn clear_empties_playlist_of_any_size() {
    for n in [0usize, 1, 2, 7, 150] {
        let mock = Arc::new(MockProvider::new().with_playlist(PL, numbered(n)));
        let svc = PlaylistService::new(mock.clone(), PL);
        assert_eq!(svc.clear().await.unwrap(), n);
        assert!(mock.playlist(PL).is_empty(), "n = {}", n);
        if n == 0 {
            // fetch only, no removal call
            assert_eq!(mock.calls(), 1);
        }
    }
}

#[tokio::test]
async fn clear_handles_duplicate_entries() {
    let t = Track::new("u1", "Loop");
    let mock = Arc::new(MockProvider::new().with_playlist(PL, vec![t.clone(), t.clone(), t]));
    let svc = PlaylistService::new(mock.clone(), PL);
    assert_eq!(svc.clear().await.unwrap(), 3);
    assert!(mock.playlist(PL).is_empty());
}

#[tokio::test]
async fn remote_failures_map_to_remote_service() {
    let mock = Arc::new(MockProvider::new().with_catalog(numbered(1)));
    mock.set_failing(true);
    let svc = PlaylistService::new(mock, PL);

    let err = svc.search_track("Song 0").await.unwrap_err();
    assert!(matches!(err, RelayError::RemoteService(_)));
    let err = svc.current_track().await.unwrap_err();
    assert!(matches!(err, RelayError::RemoteService(_)));
    let err = svc.pause().await.unwrap_err();
    assert!(err.to_string().contains("service unavailable"));
}
