//! TorrentsCsv provider: torrents-csv.com JSON search. Movie only.

use async_trait::async_trait;
use driftnet_core::types::{ImdbId, TmdbId};
use serde::Deserialize;

use super::{MovieProvider, Provider, TorrentStream, check_http, empty_stream, single_page};
use crate::errors::SearchError;
use crate::types::{EpisodeInfo, ProviderSource, Torrent};

#[derive(Debug, Deserialize)]
struct CsvTorrent {
    name: String,
    seeders: u32,
    infohash: String,
}

#[derive(Debug, Deserialize)]
struct CsvResponse {
    #[serde(default)]
    torrents: Vec<CsvTorrent>,
}

/// Adapter for the torrents-csv dataset. The upstream serves bare info
/// hashes, which pass through as the download reference.
#[derive(Debug)]
pub struct TorrentsCsvProvider {
    http: reqwest::Client,
    root: String,
}

impl TorrentsCsvProvider {
    /// Creates a provider rooted at `root`.
    pub fn new(http: reqwest::Client, root: &str) -> Self {
        Self {
            http,
            root: root.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Provider for TorrentsCsvProvider {
    fn source(&self) -> ProviderSource {
        ProviderSource::TorrentsCsv
    }

    async fn health(&self) -> Result<(), SearchError> {
        check_http(&self.http, &self.root).await
    }
}

impl MovieProvider for TorrentsCsvProvider {
    fn search_movies<'a>(
        &'a self,
        imdb_id: Option<&'a ImdbId>,
        _tmdb_id: TmdbId,
    ) -> TorrentStream<'a> {
        let Some(imdb_id) = imdb_id else {
            return empty_stream();
        };

        single_page(async move {
            let response = self
                .http
                .get(format!("{}/service/search", self.root))
                .query(&[("q", imdb_id.as_str())])
                .send()
                .await
                .map_err(SearchError::network)?;
            if !response.status().is_success() {
                return Err(SearchError::UpstreamStatus {
                    status: response.status().as_u16(),
                });
            }
            let body: CsvResponse = response.json().await.map_err(SearchError::network)?;

            Ok(body
                .torrents
                .into_iter()
                .map(|item| Torrent {
                    source: ProviderSource::TorrentsCsv,
                    title: item.name,
                    seeders: item.seeders,
                    download: item.infohash,
                    category: String::new(),
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

    #[tokio::test]
    async fn test_search_movies_parses_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/service/search"))
            .and(query_param("q", "tt0076759"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "torrents": [{"name": "Star Wars 1977", "seeders": 100, "infohash": "aa11"}]
            })))
            .mount(&server)
            .await;

        let provider = TorrentsCsvProvider::new(reqwest::Client::new(), &server.uri());
        let imdb = ImdbId::new("tt0076759").unwrap();
        let results: Vec<_> = provider
            .search_movies(Some(&imdb), TmdbId(11))
            .collect()
            .await;

        assert_eq!(results.len(), 1);
        let torrent = results[0].as_ref().unwrap();
        assert_eq!(torrent.download, "aa11");
        assert_eq!(torrent.source, ProviderSource::TorrentsCsv);
    }
}
