use async_trait::async_trait;
use song_request_relay as lib;
use lib::api::mock::MockProvider;
use lib::api::Provider;
use lib::chat::{run_session, ChatSettings};
use lib::dispatcher::Dispatcher;
use lib::models::Track;
use lib::service::PlaylistService;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::time::timeout;

fn settings() -> ChatSettings {
    ChatSettings {
        nick: "bunnysongbot".into(),
        password: "oauth:secret".into(),
        channel: "#bunny".into(),
    }
}

fn dispatcher(mock: &Arc<MockProvider>) -> Arc<Dispatcher> {
    Arc::new(Dispatcher::new(PlaylistService::new(mock.clone(), "pl1"), "song "))
}

#[tokio::test]
async fn relays_prefixed_commands_and_answers_pings() {
    let mock = Arc::new(
        MockProvider::new().with_catalog(vec![Track::new("u1", "Bohemian Rhapsody")]),
    );
    let d = dispatcher(&mock);
    let (client, server) = tokio::io::duplex(8192);
    let (client_r, client_w) = tokio::io::split(client);
    let session = tokio::spawn(async move { run_session(client_r, client_w, &settings(), d).await });

    let (server_r, mut server_w) = tokio::io::split(server);
    let mut lines = BufReader::new(server_r).lines();

    assert_eq!(lines.next_line().await.unwrap().unwrap(), "PASS oauth:secret");
    assert_eq!(lines.next_line().await.unwrap().unwrap(), "NICK bunnysongbot");

    server_w
        .write_all(b":tmi.twitch.tv 001 bunnysongbot :Welcome, GLHF!\r\n")
        .await
        .unwrap();
    assert_eq!(lines.next_line().await.unwrap().unwrap(), "JOIN #bunny");

    server_w.write_all(b"PING :tmi.twitch.tv\r\n").await.unwrap();
    assert_eq!(lines.next_line().await.unwrap().unwrap(), "PONG :tmi.twitch.tv");

    server_w
        .write_all(
            b":alice!alice@alice.tmi.twitch.tv PRIVMSG #bunny :song add Bohemian Rhapsody\r\n",
        )
        .await
        .unwrap();
    assert_eq!(
        lines.next_line().await.unwrap().unwrap(),
        "PRIVMSG #bunny :Bohemian Rhapsody added successfully to the playlist!"
    );

    // none of these produce a reply
    server_w
        .write_all(
            concat!(
                ":bob!bob@bob.tmi.twitch.tv PRIVMSG #bunny :great song\r\n",
                ":bob!bob@bob.tmi.twitch.tv PRIVMSG #bunny :song dance\r\n",
                ":bunnysongbot!bunnysongbot@bunnysongbot.tmi.twitch.tv PRIVMSG #bunny :song help\r\n",
                ":bob!bob@bob.tmi.twitch.tv PRIVMSG #bunny :song playlist\r\n",
            )
            .as_bytes(),
        )
        .await
        .unwrap();
    assert_eq!(
        lines.next_line().await.unwrap().unwrap(),
        "PRIVMSG #bunny :Current Playlist: Bohemian Rhapsody"
    );
    assert_eq!(mock.playlist("pl1").len(), 1);

    drop(lines);
    drop(server_w);
    session.await.unwrap().unwrap();
}

#[tokio::test]
async fn login_failure_aborts_session() {
    let mock = Arc::new(MockProvider::new());
    let d = dispatcher(&mock);
    let (client, server) = tokio::io::duplex(8192);
    let (client_r, client_w) = tokio::io::split(client);
    let session = tokio::spawn(async move { run_session(client_r, client_w, &settings(), d).await });

    let (server_r, mut server_w) = tokio::io::split(server);
    let mut lines = BufReader::new(server_r).lines();
    lines.next_line().await.unwrap();
    lines.next_line().await.unwrap();
    server_w
        .write_all(b":tmi.twitch.tv NOTICE * :Login authentication failed\r\n")
        .await
        .unwrap();

    let err = session.await.unwrap().unwrap_err();
    assert!(err.to_string().contains("Login authentication failed"));
}

/// Provider whose pause request never completes, like a hung remote call.
struct StuckPlayback;

#[async_trait]
impl Provider for StuckPlayback {
    async fn search_track(&self, _query: &str) -> anyhow::Result<Option<Track>> {
        Ok(None)
    }
    async fn playlist_tracks(&self, _playlist_id: &str) -> anyhow::Result<Vec<Track>> {
        Ok(Vec::new())
    }
    async fn add_tracks(&self, _playlist_id: &str, _uris: &[String]) -> anyhow::Result<()> {
        Ok(())
    }
    async fn remove_tracks(&self, _playlist_id: &str, _uris: &[String]) -> anyhow::Result<()> {
        Ok(())
    }
    async fn pause_playback(&self) -> anyhow::Result<()> {
        std::future::pending().await
    }
    async fn start_playback(&self) -> anyhow::Result<()> {
        Ok(())
    }
    fn name(&self) -> &str {
        "stuck"
    }
}

#[tokio::test]
async fn pings_are_answered_while_a_command_hangs() {
    let d = Arc::new(Dispatcher::new(
        PlaylistService::new(Arc::new(StuckPlayback), "pl1"),
        "song ",
    ));
    let (client, server) = tokio::io::duplex(64 * 1024);
    let (client_r, client_w) = tokio::io::split(client);
    let session = tokio::spawn(async move { run_session(client_r, client_w, &settings(), d).await });

    let (server_r, mut server_w) = tokio::io::split(server);
    let mut lines = BufReader::new(server_r).lines();
    lines.next_line().await.unwrap();
    lines.next_line().await.unwrap();
    server_w
        .write_all(b":tmi.twitch.tv 001 bunnysongbot :Welcome, GLHF!\r\n")
        .await
        .unwrap();
    assert_eq!(lines.next_line().await.unwrap().unwrap(), "JOIN #bunny");

    // the first pause never returns, so the rest pile up behind it
    let mut burst = String::new();
    for _ in 0..70 {
        burst.push_str(":alice!alice@alice.tmi.twitch.tv PRIVMSG #bunny :song pause\r\n");
    }
    burst.push_str("PING :tmi.twitch.tv\r\n");
    server_w.write_all(burst.as_bytes()).await.unwrap();

    let pong = timeout(Duration::from_secs(2), lines.next_line())
        .await
        .expect("keepalive answered while the worker is stuck")
        .unwrap()
        .unwrap();
    assert_eq!(pong, "PONG :tmi.twitch.tv");

    session.abort();
}

#[tokio::test]
async fn non_utf8_line_does_not_end_the_session() {
    let mock = Arc::new(
        MockProvider::new().with_playlist("pl1", vec![Track::new("u1", "Bohemian Rhapsody")]),
    );
    let d = dispatcher(&mock);
    let (client, server) = tokio::io::duplex(8192);
    let (client_r, client_w) = tokio::io::split(client);
    let session = tokio::spawn(async move { run_session(client_r, client_w, &settings(), d).await });

    let (server_r, mut server_w) = tokio::io::split(server);
    let mut lines = BufReader::new(server_r).lines();
    lines.next_line().await.unwrap();
    lines.next_line().await.unwrap();
    server_w
        .write_all(b":tmi.twitch.tv 001 bunnysongbot :Welcome, GLHF!\r\n")
        .await
        .unwrap();
    assert_eq!(lines.next_line().await.unwrap().unwrap(), "JOIN #bunny");

    server_w
        .write_all(b":bob!bob@bob.tmi.twitch.tv PRIVMSG #bunny :caf\xe9 \xff\xfe\r\n")
        .await
        .unwrap();
    server_w.write_all(b"PING :tmi.twitch.tv\r\n").await.unwrap();
    assert_eq!(lines.next_line().await.unwrap().unwrap(), "PONG :tmi.twitch.tv");

    server_w
        .write_all(b":bob!bob@bob.tmi.twitch.tv PRIVMSG #bunny :song playlist\r\n")
        .await
        .unwrap();
    assert_eq!(
        lines.next_line().await.unwrap().unwrap(),
        "PRIVMSG #bunny :Current Playlist: Bohemian Rhapsody"
    );

    drop(lines);
    drop(server_w);
    session.await.unwrap().unwrap();
}
