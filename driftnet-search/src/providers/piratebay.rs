//! PirateBay provider: apibay.org JSON API.

use async_trait::async_trait;
use driftnet_core::types::{ImdbId, TmdbId};
use serde::Deserialize;

use super::{
    MovieProvider, Provider, TorrentStream, TvProvider, check_http, empty_stream, movie_convert,
    single_page, tv_convert,
};
use crate::errors::SearchError;
use crate::season::format_marker;
use crate::types::{EpisodeInfo, ProviderSource, Torrent};

/// apibay serializes every field as a string.
#[derive(Debug, Deserialize)]
struct ApibayTorrent {
    name: String,
    info_hash: String,
    seeders: String,
    category: String,
}

/// Builds a magnet link from an info hash.
fn magnet(info_hash: &str, name: &str) -> String {
    format!(
        "magnet:?xt=urn:btih:{info_hash}&dn={}",
        urlencoding::encode(name)
    )
}

/// Adapter for the PirateBay API mirror.
#[derive(Debug)]
pub struct PirateBayProvider {
    http: reqwest::Client,
    root: String,
}

impl PirateBayProvider {
    /// Creates a provider rooted at `root`.
    pub fn new(http: reqwest::Client, root: &str) -> Self {
        Self {
            http,
            root: root.trim_end_matches('/').to_string(),
        }
    }

    async fn query(&self, q: String) -> Result<Vec<ApibayTorrent>, SearchError> {
        let response = self
            .http
            .get(format!("{}/q.php", self.root))
            .query(&[("q", q.as_str())])
            .send()
            .await
            .map_err(SearchError::network)?;
        if !response.status().is_success() {
            return Err(SearchError::UpstreamStatus {
                status: response.status().as_u16(),
            });
        }

        let items: Vec<ApibayTorrent> = response.json().await.map_err(SearchError::network)?;

        // An empty result set comes back as a single sentinel row.
        if items.len() == 1 && items[0].name == "No results returned" {
            return Ok(Vec::new());
        }
        Ok(items)
    }
}

#[async_trait]
impl Provider for PirateBayProvider {
    fn source(&self) -> ProviderSource {
        ProviderSource::Piratebay
    }

    async fn health(&self) -> Result<(), SearchError> {
        check_http(&self.http, &self.root).await
    }
}

impl TvProvider for PirateBayProvider {
    fn search_tv<'a>(
        &'a self,
        imdb_id: Option<&'a ImdbId>,
        _tmdb_id: TmdbId,
        season: u32,
        episode: Option<u32>,
    ) -> TorrentStream<'a> {
        let Some(imdb_id) = imdb_id else {
            return empty_stream();
        };

        single_page(async move {
            let items = self
                .query(format!("{imdb_id} {}", format_marker(season, episode)))
                .await?;
            Ok(items
                .into_iter()
                .map(|item| Torrent {
                    source: ProviderSource::Piratebay,
                    title: item.name.clone(),
                    seeders: item.seeders.parse().unwrap_or(0),
                    download: magnet(&item.info_hash, &item.name),
                    category: tv_convert(&item.category),
                    episode_info: EpisodeInfo::tv(season, episode),
                })
                .collect())
        })
    }
}

impl MovieProvider for PirateBayProvider {
    fn search_movies<'a>(
        &'a self,
        imdb_id: Option<&'a ImdbId>,
        _tmdb_id: TmdbId,
    ) -> TorrentStream<'a> {
        let Some(imdb_id) = imdb_id else {
            return empty_stream();
        };

        single_page(async move {
            let items = self.query(imdb_id.to_string()).await?;
            Ok(items
                .into_iter()
                .map(|item| Torrent {
                    source: ProviderSource::Piratebay,
                    title: item.name.clone(),
                    seeders: item.seeders.parse().unwrap_or(0),
                    download: magnet(&item.info_hash, &item.name),
                    category: movie_convert(&item.category),
                    episode_info: EpisodeInfo::default(),
                })
                .collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn test_magnet_encodes_name() {
        assert_eq!(
            magnet("abc123", "Ancient Aliens"),
            "magnet:?xt=urn:btih:abc123&dn=Ancient%20Aliens"
        );
    }

    #[tokio::test]
    async fn test_search_tv_parses_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/q.php"))
            .and(query_param("q", "tt7366338 S01E04"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"name": "Chernobyl S01E04", "info_hash": "AB12", "seeders": "42", "category": "205"}
            ])))
            .mount(&server)
            .await;

        let provider = PirateBayProvider::new(reqwest::Client::new(), &server.uri());
        let imdb = ImdbId::new("tt7366338").unwrap();
        let results: Vec<_> = provider
            .search_tv(Some(&imdb), TmdbId(87108), 1, Some(4))
            .collect()
            .await;

        assert_eq!(results.len(), 1);
        let torrent = results[0].as_ref().unwrap();
        assert_eq!(torrent.seeders, 42);
        assert!(torrent.download.contains("urn:btih:AB12"));
        assert_eq!(torrent.episode_info, EpisodeInfo::tv(1, Some(4)));
    }

    #[tokio::test]
    async fn test_sentinel_row_means_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/q.php"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"name": "No results returned", "info_hash": "0", "seeders": "0", "category": "0"}
            ])))
            .mount(&server)
            .await;

        let provider = PirateBayProvider::new(reqwest::Client::new(), &server.uri());
        let imdb = ImdbId::new("tt0000001").unwrap();
        let results: Vec<_> = provider
            .search_movies(Some(&imdb), TmdbId(1))
            .collect()
            .await;
        assert!(results.is_empty());
    }
}
