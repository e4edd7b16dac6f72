//! TMDB HTTP client with TTL-cached lookups and 429 backoff.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use thiserror::Error;

use super::models::{ExternalIds, MovieDetails, TvDetails, TvSeason};
use crate::cache::TtlCache;
use crate::config::{CacheConfig, TmdbConfig};
use crate::types::{ImdbId, MediaKind, TmdbId};

/// Fibonacci backoff schedule for rate-limited requests, in seconds.
const BACKOFF_SCHEDULE: [u64; 4] = [1, 1, 2, 3];

/// Errors from the TMDB collaborator.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// Request could not be sent or the response body not read.
    #[error("tmdb network error: {reason}")]
    Network {
        /// The underlying transport failure
        reason: String,
    },

    /// Upstream answered with a non-success status.
    #[error("tmdb responded {status} for {path}")]
    UpstreamStatus {
        /// HTTP status code
        status: u16,
        /// Request path
        path: String,
    },

    /// Response body did not decode as the expected shape.
    #[error("tmdb decode error for {path}: {reason}")]
    Decode {
        /// Request path
        path: String,
        /// Decoder failure detail
        reason: String,
    },
}

/// Client for the TMDB v3 API.
///
/// Every lookup family is fronted by an explicit TTL cache owned by the
/// client; `clear_caches` resets them for test isolation.
#[derive(Debug, Clone)]
pub struct TmdbClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    movies: Arc<TtlCache<TmdbId, MovieDetails>>,
    shows: Arc<TtlCache<TmdbId, TvDetails>>,
    seasons: Arc<TtlCache<(TmdbId, u32), TvSeason>>,
    external_ids: Arc<TtlCache<(TmdbId, MediaKind), Option<ImdbId>>>,
}

impl TmdbClient {
    /// Creates a client from configuration.
    pub fn new(http: reqwest::Client, config: &TmdbConfig, cache: &CacheConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            movies: Arc::new(TtlCache::new(cache.capacity, cache.ttl)),
            shows: Arc::new(TtlCache::new(cache.capacity, cache.ttl)),
            seasons: Arc::new(TtlCache::new(cache.capacity, cache.ttl)),
            external_ids: Arc::new(TtlCache::new(cache.capacity, cache.ttl)),
        }
    }

    /// Movie details for a canonical id.
    ///
    /// # Errors
    /// - `MetadataError::Network` - Transport failure
    /// - `MetadataError::UpstreamStatus` - Non-success response
    /// - `MetadataError::Decode` - Unexpected body shape
    pub async fn get_movie(&self, id: TmdbId) -> Result<MovieDetails, MetadataError> {
        self.movies
            .get_or_try_insert(id, || self.get_json(format!("movie/{id}")))
            .await
    }

    /// Show details for a canonical id.
    ///
    /// # Errors
    /// Same as [`TmdbClient::get_movie`].
    pub async fn get_tv(&self, id: TmdbId) -> Result<TvDetails, MetadataError> {
        self.shows
            .get_or_try_insert(id, || self.get_json(format!("tv/{id}")))
            .await
    }

    /// Ordered episode listing for one season of a show.
    ///
    /// # Errors
    /// Same as [`TmdbClient::get_movie`].
    pub async fn get_tv_season(&self, id: TmdbId, season: u32) -> Result<TvSeason, MetadataError> {
        self.seasons
            .get_or_try_insert((id, season), || {
                self.get_json(format!("tv/{id}/season/{season}"))
            })
            .await
    }

    /// Cross-referenced IMDB id for a movie, when TMDB knows one.
    ///
    /// # Errors
    /// Same as [`TmdbClient::get_movie`].
    pub async fn movie_imdb_id(&self, id: TmdbId) -> Result<Option<ImdbId>, MetadataError> {
        self.imdb_id(MediaKind::Movie, id).await
    }

    /// Cross-referenced IMDB id for a show, when TMDB knows one.
    ///
    /// # Errors
    /// Same as [`TmdbClient::get_movie`].
    pub async fn tv_imdb_id(&self, id: TmdbId) -> Result<Option<ImdbId>, MetadataError> {
        self.imdb_id(MediaKind::Series, id).await
    }

    async fn imdb_id(&self, kind: MediaKind, id: TmdbId) -> Result<Option<ImdbId>, MetadataError> {
        self.external_ids
            .get_or_try_insert((id, kind), || async {
                let ids: ExternalIds = self
                    .get_json(format!("{}/{id}/external_ids", kind.tmdb_segment()))
                    .await?;
                // TMDB occasionally stores empty or malformed cross-references;
                // treat those the same as an absent one.
                Ok(ids.imdb_id.and_then(|raw| ImdbId::new(raw).ok()))
            })
            .await
    }

    /// Drops all cached lookups.
    pub fn clear_caches(&self) {
        self.movies.clear();
        self.shows.clear();
        self.seasons.clear();
        self.external_ids.clear();
    }

    async fn get_json<T: DeserializeOwned>(&self, path: String) -> Result<T, MetadataError> {
        let url = format!("{}/{path}", self.base_url);
        let mut backoff = BACKOFF_SCHEDULE.iter();

        loop {
            let response = self
                .http
                .get(&url)
                .query(&[("api_key", self.api_key.as_str())])
                .send()
                .await
                .map_err(|e| MetadataError::Network {
                    reason: e.to_string(),
                })?;

            let status = response.status();
            if status.as_u16() == 429 {
                match backoff.next() {
                    Some(&secs) => {
                        tracing::debug!(path = %path, delay_secs = secs, "tmdb rate limited, backing off");
                        tokio::time::sleep(Duration::from_secs(secs)).await;
                        continue;
                    }
                    None => {
                        return Err(MetadataError::UpstreamStatus {
                            status: status.as_u16(),
                            path,
                        });
                    }
                }
            }
            if !status.is_success() {
                return Err(MetadataError::UpstreamStatus {
                    status: status.as_u16(),
                    path,
                });
            }

            return response.json().await.map_err(|e| MetadataError::Decode {
                path,
                reason: e.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(server: &MockServer) -> TmdbClient {
        TmdbClient::new(
            reqwest::Client::new(),
            &TmdbConfig {
                base_url: server.uri(),
                api_key: "k".to_string(),
            },
            &CacheConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_get_tv_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tv/100"))
            .and(query_param("api_key", "k"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "Chernobyl",
                "number_of_seasons": 1,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tmdb = client(&server);
        assert_eq!(tmdb.get_tv(TmdbId(100)).await.unwrap().name, "Chernobyl");
        assert_eq!(tmdb.get_tv(TmdbId(100)).await.unwrap().name, "Chernobyl");
    }

    #[tokio::test]
    async fn test_clear_caches_forces_refetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movie/7"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"title": "Stalker"})),
            )
            .expect(2)
            .mount(&server)
            .await;

        let tmdb = client(&server);
        tmdb.get_movie(TmdbId(7)).await.unwrap();
        tmdb.clear_caches();
        tmdb.get_movie(TmdbId(7)).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_imdb_id_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tv/5/external_ids"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"imdb_id": null})),
            )
            .mount(&server)
            .await;

        let tmdb = client(&server);
        assert_eq!(tmdb.tv_imdb_id(TmdbId(5)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_error_status_surfaces() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movie/9"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let tmdb = client(&server);
        let err = tmdb.get_movie(TmdbId(9)).await.unwrap_err();
        assert!(matches!(
            err,
            MetadataError::UpstreamStatus { status: 404, .. }
        ));
    }
}
