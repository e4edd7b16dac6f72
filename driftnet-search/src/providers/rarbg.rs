//! Rarbg provider: torrentapi.org JSON API with token-based access.
//!
//! The API hands out short-lived tokens; an expired token is reported with
//! `error_code: 4`, on which the provider refreshes the token once and
//! retries only the failing request. HTTP 429 is retried with exponential
//! backoff before giving up on the whole sequence.

use std::time::Duration;

use async_trait::async_trait;
use driftnet_core::types::{ImdbId, TmdbId};
use futures::{StreamExt, stream};
use serde::Deserialize;

use super::{
    MovieProvider, Provider, TorrentStream, TvProvider, check_http, empty_stream, movie_convert,
    paged, tv_convert,
};
use crate::errors::SearchError;
use crate::season::format_marker;
use crate::types::{EpisodeInfo, ProviderSource, Torrent};

const APP_ID: &str = "driftnet";
/// Exponential backoff for 429 responses, in seconds.
const RATE_LIMIT_BACKOFF: [u64; 4] = [1, 2, 4, 8];

/// torrentapi category codes, keyed by their listing names.
const CATEGORY_CODES: &[(&str, u32)] = &[
    ("Movies/XVID", 14),
    ("Movies/XVID/720", 48),
    ("Movies/x264", 17),
    ("Movies/x264/1080", 44),
    ("Movies/x264/720", 45),
    ("Movies/x264/3D", 47),
    ("Movies/x264/4k", 50),
    ("Movies/x265/4k", 51),
    ("Movs/x265/4k/HDR", 52),
    ("Movies/BD Remux", 46),
    ("Movies/Full BD", 42),
    ("TV Episodes", 18),
    ("TV HD Episodes", 41),
    ("TV UHD Episodes", 49),
];

const MOVIE_CATEGORIES: &[&str] = &[
    "Movies/BD Remux",
    "Movies/Full BD",
    "Movies/XVID",
    "Movies/x264",
    "Movies/x264/720",
    "Movies/XVID/720",
    "Movies/x264/3D",
    "Movies/x264/1080",
    "Movies/x264/4k",
    "Movies/x265/4k",
    "Movs/x265/4k/HDR",
];

const SERIES_CATEGORIES: &[&str] = &["TV Episodes", "TV HD Episodes", "TV UHD Episodes"];

/// Error strings the API uses to say "no results" rather than "failure".
const NO_RESULTS: &[&str] = &[
    "No results found",
    "Cant find search_imdb in database",
    "Cant find imdb in database",
];

fn category_codes(names: &[&str]) -> Vec<u32> {
    names
        .iter()
        .filter_map(|name| {
            CATEGORY_CODES
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, code)| *code)
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct RarbgTorrent {
    category: String,
    seeders: u32,
    title: String,
    download: String,
}

#[derive(Debug, Deserialize)]
struct RarbgResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    torrent_results: Vec<RarbgTorrent>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, Clone)]
struct SearchQuery {
    imdb_id: ImdbId,
    search_string: Option<String>,
}

/// Adapter for the torrentapi upstream.
#[derive(Debug)]
pub struct RarbgProvider {
    http: reqwest::Client,
    root: String,
}

impl RarbgProvider {
    /// Creates a provider rooted at `root`.
    pub fn new(http: reqwest::Client, root: &str) -> Self {
        Self {
            http,
            root: root.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/pubapi_v2.php", self.root)
    }

    async fn fetch_token(&self) -> Result<String, SearchError> {
        let response = self
            .http
            .get(self.endpoint())
            .query(&[("get_token", "get_token"), ("app_id", APP_ID)])
            .send()
            .await
            .map_err(SearchError::network)?;
        let body: TokenResponse = response.json().await.map_err(SearchError::network)?;
        Ok(body.token)
    }

    /// One category page. Refreshes the token at most once for this request
    /// and backs off on 429; any other upstream error ends the sequence.
    async fn page(
        &self,
        token: &mut String,
        category: u32,
        query: &SearchQuery,
    ) -> Result<Vec<RarbgTorrent>, SearchError> {
        let mut backoff = RATE_LIMIT_BACKOFF.iter();
        let mut token_refreshed = false;

        loop {
            let mut params = vec![
                ("mode", "search".to_string()),
                ("ranked", "0".to_string()),
                ("limit", "100".to_string()),
                ("format", "json_extended".to_string()),
                ("app_id", APP_ID.to_string()),
                ("token", token.clone()),
                ("category", category.to_string()),
                ("search_imdb", query.imdb_id.to_string()),
            ];
            if let Some(search_string) = &query.search_string {
                params.push(("search_string", search_string.clone()));
            }

            let response = self
                .http
                .get(self.endpoint())
                .query(&params)
                .send()
                .await
                .map_err(SearchError::network)?;

            if response.status().as_u16() == 429 {
                match backoff.next() {
                    Some(&secs) => {
                        tracing::debug!(delay_secs = secs, "rarbg rate limited, backing off");
                        tokio::time::sleep(Duration::from_secs(secs)).await;
                        continue;
                    }
                    None => {
                        return Err(SearchError::RateLimited {
                            attempts: RATE_LIMIT_BACKOFF.len() as u32 + 1,
                        });
                    }
                }
            }
            if !response.status().is_success() {
                return Err(SearchError::UpstreamStatus {
                    status: response.status().as_u16(),
                });
            }

            let body: RarbgResponse = response.json().await.map_err(|e| SearchError::Parse {
                reason: e.to_string(),
            })?;

            if body.error_code == Some(4) {
                if token_refreshed {
                    return Err(SearchError::Upstream {
                        reason: "token rejected twice".to_string(),
                    });
                }
                tracing::info!("rarbg token expired, reacquiring");
                *token = self.fetch_token().await?;
                token_refreshed = true;
                continue;
            }
            if let Some(error) = &body.error {
                if NO_RESULTS.iter().any(|needle| error.contains(needle)) {
                    return Ok(Vec::new());
                }
                if error.contains("Too many requests") {
                    match backoff.next() {
                        Some(&secs) => {
                            tokio::time::sleep(Duration::from_secs(secs)).await;
                            continue;
                        }
                        None => {
                            return Err(SearchError::RateLimited {
                                attempts: RATE_LIMIT_BACKOFF.len() as u32 + 1,
                            });
                        }
                    }
                }
                return Err(SearchError::Upstream {
                    reason: error.clone(),
                });
            }

            return Ok(body.torrent_results);
        }
    }

    /// Lazily walks the category list, one request per code. The token is
    /// acquired on the first page and kept privately in the unfold state.
    fn pages(
        &self,
        categories: &'static [&'static str],
        query: SearchQuery,
    ) -> impl futures::Stream<Item = Result<Vec<RarbgTorrent>, SearchError>> + Send + '_ {
        let codes = category_codes(categories).into_iter();
        stream::try_unfold(
            (codes, None::<String>),
            move |(mut codes, mut token)| {
                let query = query.clone();
                async move {
                    let Some(code) = codes.next() else {
                        return Ok(None);
                    };
                    let mut current = match token.take() {
                        Some(token) => token,
                        None => self.fetch_token().await?,
                    };
                    let items = self.page(&mut current, code, &query).await?;
                    Ok(Some((items, (codes, Some(current)))))
                }
            },
        )
    }
}

#[async_trait]
impl Provider for RarbgProvider {
    fn source(&self) -> ProviderSource {
        ProviderSource::Rarbg
    }

    async fn health(&self) -> Result<(), SearchError> {
        check_http(&self.http, &self.root).await
    }
}

impl TvProvider for RarbgProvider {
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

        let query = SearchQuery {
            imdb_id: imdb_id.clone(),
            search_string: Some(format_marker(season, episode)),
        };
        paged(self.pages(SERIES_CATEGORIES, query).map(move |page| {
            page.map(|items| {
                items
                    .into_iter()
                    .map(|item| Torrent {
                        source: ProviderSource::Rarbg,
                        title: item.title,
                        seeders: item.seeders,
                        download: item.download,
                        category: tv_convert(&item.category),
                        episode_info: EpisodeInfo::tv(season, episode),
                    })
                    .collect()
            })
        }))
    }
}

impl MovieProvider for RarbgProvider {
    fn search_movies<'a>(
        &'a self,
        imdb_id: Option<&'a ImdbId>,
        _tmdb_id: TmdbId,
    ) -> TorrentStream<'a> {
        let Some(imdb_id) = imdb_id else {
            return empty_stream();
        };

        let query = SearchQuery {
            imdb_id: imdb_id.clone(),
            search_string: None,
        };
        paged(self.pages(MOVIE_CATEGORIES, query).map(|page| {
            page.map(|items| {
                items
                    .into_iter()
                    .map(|item| Torrent {
                        source: ProviderSource::Rarbg,
                        title: item.title,
                        seeders: item.seeders,
                        download: item.download,
                        category: movie_convert(&item.category),
                        episode_info: EpisodeInfo::default(),
                    })
                    .collect()
            })
        }))
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn test_category_codes_resolve() {
        assert_eq!(category_codes(SERIES_CATEGORIES), vec![18, 41, 49]);
        assert_eq!(
            category_codes(MOVIE_CATEGORIES).len(),
            MOVIE_CATEGORIES.len()
        );
    }

    #[tokio::test]
    async fn test_token_refresh_retries_single_request() {
        let server = MockServer::start().await;

        // Token requests: first "t1", then "t2" after the refresh.
        Mock::given(method("GET"))
            .and(path("/pubapi_v2.php"))
            .and(query_param("get_token", "get_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token": "t1",
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/pubapi_v2.php"))
            .and(query_param("get_token", "get_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token": "t2",
            })))
            .mount(&server)
            .await;

        // Search with the stale token reports error_code 4.
        Mock::given(method("GET"))
            .and(path("/pubapi_v2.php"))
            .and(query_param("mode", "search"))
            .and(query_param("token", "t1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": "Invalid token", "error_code": 4,
            })))
            .mount(&server)
            .await;
        // With the fresh token, results flow.
        Mock::given(method("GET"))
            .and(path("/pubapi_v2.php"))
            .and(query_param("mode", "search"))
            .and(query_param("token", "t2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "torrent_results": [
                    {"category": "TV HD Episodes", "seeders": 7,
                     "title": "Chernobyl.S01E04.1080p", "download": "magnet:?xt=urn:btih:1"}
                ]
            })))
            .mount(&server)
            .await;

        let provider = RarbgProvider::new(reqwest::Client::new(), &server.uri());
        let imdb = ImdbId::new("tt7366338").unwrap();
        let results: Vec<_> = provider
            .search_tv(Some(&imdb), TmdbId(87108), 1, Some(4))
            .collect()
            .await;

        let ok: Vec<_> = results.into_iter().filter_map(|r| r.ok()).collect();
        // One result per series category (three categories, same mock).
        assert_eq!(ok.len(), 3);
        assert_eq!(ok[0].category, "TV HD Episodes");
    }

    #[tokio::test]
    async fn test_no_results_sentinel_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pubapi_v2.php"))
            .and(query_param("get_token", "get_token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"token": "t"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/pubapi_v2.php"))
            .and(query_param("mode", "search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": "No results found", "error_code": 20,
            })))
            .mount(&server)
            .await;

        let provider = RarbgProvider::new(reqwest::Client::new(), &server.uri());
        let imdb = ImdbId::new("tt0000001").unwrap();
        let results: Vec<_> = provider
            .search_movies(Some(&imdb), TmdbId(1))
            .collect()
            .await;
        assert!(results.iter().all(|r| r.is_ok()));
        assert!(results.is_empty());
    }
}
