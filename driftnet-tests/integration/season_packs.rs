//! Season-pack resolution against a mocked episode-metadata service.

use chrono::Utc;
use driftnet_core::TmdbClient;
use driftnet_core::config::{CacheConfig, TmdbConfig};
use driftnet_core::history::{
    Download, DownloadKind, EpisodeDetails, PLACEHOLDER_ID, resolve_season, resolve_show,
};
use driftnet_core::types::{ImdbId, TmdbId};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn download(title: &str) -> Download {
    Download {
        id: 20,
        tmdb_id: TmdbId(87108),
        transmission_id: "hash1234".to_string(),
        imdb_id: Some(ImdbId::new("tt7366338").unwrap()),
        kind: DownloadKind::Episode,
        title: title.to_string(),
        timestamp: Utc::now(),
        added_by: None,
    }
}

fn record(season: u32, episode: Option<u32>) -> EpisodeDetails {
    EpisodeDetails {
        id: 10,
        download: download("Chernobyl Season 1"),
        show_title: "Chernobyl".to_string(),
        season,
        episode,
    }
}

async fn tmdb_with_two_episodes() -> (MockServer, TmdbClient) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tv/87108/season/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "episodes": [
                {"episode_number": 1, "name": "1:23:45", "air_date": "2019-05-06"},
                {"episode_number": 2, "name": "Please Remain Calm", "air_date": "2019-05-13"},
            ]
        })))
        .mount(&server)
        .await;

    let tmdb = TmdbClient::new(
        reqwest::Client::new(),
        &TmdbConfig {
            base_url: server.uri(),
            api_key: String::new(),
        },
        &CacheConfig::default(),
    );
    (server, tmdb)
}

#[tokio::test]
async fn test_single_pack_expands_to_synthetic_episodes() {
    let (_server, tmdb) = tmdb_with_two_episodes().await;

    let resolved = resolve_season(vec![record(1, None)], &tmdb).await.unwrap();

    assert_eq!(resolved.len(), 2);
    for (index, entry) in resolved.iter().enumerate() {
        assert_eq!(entry.id, PLACEHOLDER_ID);
        assert_eq!(entry.download.id, PLACEHOLDER_ID);
        assert_eq!(entry.episode, Some(index as u32 + 1));
        assert_eq!(entry.show_title, "Chernobyl");
        assert_eq!(entry.season, 1);
        assert_eq!(entry.download.imdb_id, record(1, None).download.imdb_id);
    }
    assert_eq!(resolved[0].download.title, "1:23:45");
    assert_eq!(resolved[0].download.transmission_id, "hash1234.1");
    assert_eq!(resolved[1].download.transmission_id, "hash1234.2");
}

#[tokio::test]
async fn test_concrete_episodes_pass_through_unchanged() {
    let (_server, tmdb) = tmdb_with_two_episodes().await;

    let input = vec![record(1, Some(1)), record(1, Some(2))];
    let resolved = resolve_season(input.clone(), &tmdb).await.unwrap();
    assert_eq!(resolved, input);
}

#[tokio::test]
async fn test_pack_beside_episode_passes_through() {
    let (_server, tmdb) = tmdb_with_two_episodes().await;

    // A pack next to a concrete episode is not the single-pack special case.
    let input = vec![record(1, None), record(1, Some(2))];
    let resolved = resolve_season(input.clone(), &tmdb).await.unwrap();
    assert_eq!(resolved.len(), 2);
    assert!(resolved[0].is_season_pack());
}

#[tokio::test]
async fn test_resolve_show_groups_by_season() {
    let (_server, tmdb) = tmdb_with_two_episodes().await;

    let records = vec![record(2, Some(1)), record(1, None), record(2, Some(2))];
    let seasons = resolve_show(records, &tmdb).await.unwrap();

    assert_eq!(seasons.len(), 2);
    assert_eq!(seasons[&1].len(), 2, "season 1 pack expanded");
    assert!(seasons[&1].iter().all(|entry| entry.id == PLACEHOLDER_ID));
    assert_eq!(seasons[&2].len(), 2, "season 2 untouched");
    assert!(seasons[&2].iter().all(|entry| entry.id == 10));
}
