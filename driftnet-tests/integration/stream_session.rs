//! Stream session protocol behavior over an in-memory channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use driftnet_core::TmdbClient;
use driftnet_core::auth::{AuthError, Authenticator, User};
use driftnet_core::config::{CacheConfig, TmdbConfig};
use driftnet_search::providers::ProviderRegistry;
use driftnet_search::providers::testing::StaticProvider;
use driftnet_search::types::{EpisodeInfo, ProviderSource, Torrent};
use driftnet_web::channel::testing::{Event, TestRemote, pair};
use driftnet_web::session::{SessionContext, StreamSession};
use tokio::sync::Notify;
use tokio::time::timeout;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Accepts exactly the token "token".
struct StubAuthenticator;

#[async_trait]
impl Authenticator for StubAuthenticator {
    async fn authenticate(&self, bearer: &str) -> Result<User, AuthError> {
        if bearer == "token" {
            Ok(User {
                username: "viewer".to_string(),
                email: "viewer@example.com".to_string(),
            })
        } else {
            Err(AuthError::InvalidToken)
        }
    }
}

fn torrent(title: &str) -> Torrent {
    Torrent {
        source: ProviderSource::Piratebay,
        title: title.to_string(),
        seeders: 2,
        download: "magnet:?xt=urn:btih:00000000000000000".to_string(),
        category: "video - tv shows".to_string(),
        episode_info: EpisodeInfo::default(),
    }
}

async fn tmdb_stub() -> (MockServer, Arc<TmdbClient>) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/movie/1/external_ids"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"imdb_id": "tt0000001"})),
        )
        .mount(&server)
        .await;

    let tmdb = Arc::new(TmdbClient::new(
        reqwest::Client::new(),
        &TmdbConfig {
            base_url: server.uri(),
            api_key: String::new(),
        },
        &CacheConfig::default(),
    ));
    (server, tmdb)
}

fn spawn_session(registry: ProviderRegistry, tmdb: Arc<TmdbClient>) -> TestRemote {
    let (channel, remote) = pair();
    let ctx = Arc::new(SessionContext {
        registry,
        tmdb,
        authenticator: Arc::new(StubAuthenticator),
        plex: None,
    });
    tokio::spawn(StreamSession::new(channel, ctx).run());
    remote
}

async fn next_event(remote: &mut TestRemote) -> Event {
    timeout(Duration::from_secs(2), remote.next_event())
        .await
        .expect("session must answer, not hang")
        .expect("session dropped without closing")
}

#[tokio::test]
async fn test_stream_movie_end_to_end() {
    let (_server, tmdb) = tmdb_stub().await;
    let mut registry = ProviderRegistry::new();
    registry.register_movie(Arc::new(StaticProvider::new(vec![torrent(
        "Ancient Aliens 480p x264-mSD",
    )])));

    let mut remote = spawn_session(registry, tmdb);
    remote.send(
        r#"{"jsonrpc": "2.0", "id": 1, "authorization": "token",
            "method": "stream", "params": {"type": "movie", "tmdb_id": 1}}"#,
    );

    let frame = match next_event(&mut remote).await {
        Event::Frame(text) => serde_json::from_str::<serde_json::Value>(&text).unwrap(),
        other => panic!("expected a result frame, got {other:?}"),
    };
    assert_eq!(frame["source"], "PIRATEBAY");
    assert_eq!(frame["title"], "Ancient Aliens 480p x264-mSD");
    assert_eq!(frame["seeders"], 2);

    assert_eq!(
        next_event(&mut remote).await,
        Event::Closed("Finished streaming".to_string())
    );
}

#[tokio::test]
async fn test_malformed_frame_closes_with_error() {
    let (_server, tmdb) = tmdb_stub().await;
    let mut remote = spawn_session(ProviderRegistry::new(), tmdb);

    remote.send(r#"{"jsonrpc": "2.0", "id": 1, "authorization": "token", "method": "shrug"}"#);

    let error = match next_event(&mut remote).await {
        Event::Frame(text) => serde_json::from_str::<serde_json::Value>(&text).unwrap(),
        other => panic!("expected an error frame, got {other:?}"),
    };
    assert_ne!(error["error"]["code"], 0);
    assert!(
        !error["error"]["message"].as_str().unwrap().is_empty(),
        "error frame must carry a message"
    );

    assert_eq!(
        next_event(&mut remote).await,
        Event::Closed("ValidationError".to_string())
    );
}

#[tokio::test]
async fn test_bad_credential_never_streams() {
    let (_server, tmdb) = tmdb_stub().await;
    let mut registry = ProviderRegistry::new();
    registry.register_movie(Arc::new(StaticProvider::new(vec![torrent("never sent")])));

    let mut remote = spawn_session(registry, tmdb);
    remote.send(
        r#"{"jsonrpc": "2.0", "id": 1, "authorization": "wrong",
            "method": "stream", "params": {"type": "movie", "tmdb_id": 1}}"#,
    );

    let error = match next_event(&mut remote).await {
        Event::Frame(text) => serde_json::from_str::<serde_json::Value>(&text).unwrap(),
        other => panic!("expected an error frame, got {other:?}"),
    };
    assert_eq!(error["error"]["code"], -32001);

    assert_eq!(
        next_event(&mut remote).await,
        Event::Closed("AuthenticationError".to_string())
    );
}

#[tokio::test]
async fn test_series_without_season_is_invalid_params() {
    let (_server, tmdb) = tmdb_stub().await;
    let mut remote = spawn_session(ProviderRegistry::new(), tmdb);

    remote.send(
        r#"{"jsonrpc": "2.0", "id": 4, "authorization": "token",
            "method": "stream", "params": {"type": "series", "tmdb_id": 1}}"#,
    );

    let error = match next_event(&mut remote).await {
        Event::Frame(text) => serde_json::from_str::<serde_json::Value>(&text).unwrap(),
        other => panic!("expected an error frame, got {other:?}"),
    };
    assert_eq!(error["error"]["code"], -32602);
    assert!(error["error"]["data"].is_array());

    assert_eq!(
        next_event(&mut remote).await,
        Event::Closed("ValidationError".to_string())
    );
}

#[tokio::test]
async fn test_ping_closes_with_pong() {
    let (_server, tmdb) = tmdb_stub().await;
    let mut remote = spawn_session(ProviderRegistry::new(), tmdb);

    remote.send(
        r#"{"jsonrpc": "2.0", "id": 9, "authorization": "token", "method": "ping", "params": null}"#,
    );
    assert_eq!(next_event(&mut remote).await, Event::Closed("Pong".to_string()));
}

#[tokio::test]
async fn test_plex_without_server_reports_upstream_error() {
    let (_server, tmdb) = tmdb_stub().await;
    let mut remote = spawn_session(ProviderRegistry::new(), tmdb);

    remote.send(
        r#"{"jsonrpc": "2.0", "id": 5, "authorization": "token",
            "method": "plex", "params": {"tmdb_id": 1, "media_type": "movie"}}"#,
    );

    let error = match next_event(&mut remote).await {
        Event::Frame(text) => serde_json::from_str::<serde_json::Value>(&text).unwrap(),
        other => panic!("expected an error frame, got {other:?}"),
    };
    assert_eq!(error["error"]["code"], -32002);
    assert_eq!(
        next_event(&mut remote).await,
        Event::Closed("PlexError".to_string())
    );
}

#[tokio::test]
async fn test_disconnect_mid_stream_reaps_provider_tasks() {
    let (_server, tmdb) = tmdb_stub().await;
    let active = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Notify::new());

    let mut registry = ProviderRegistry::new();
    registry.register_movie(Arc::new(
        StaticProvider::new(vec![torrent("first"), torrent("held back")])
            .gated(gate, 1)
            .tracked(active.clone()),
    ));

    let mut remote = spawn_session(registry, tmdb);
    remote.send(
        r#"{"jsonrpc": "2.0", "id": 1, "authorization": "token",
            "method": "stream", "params": {"type": "movie", "tmdb_id": 1}}"#,
    );

    // One frame arrives; the provider is now parked on its gate.
    assert!(matches!(next_event(&mut remote).await, Event::Frame(_)));
    assert_eq!(active.load(Ordering::SeqCst), 1);

    remote.disconnect();

    for _ in 0..100 {
        if active.load(Ordering::SeqCst) == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("provider task survived client disconnect");
}
