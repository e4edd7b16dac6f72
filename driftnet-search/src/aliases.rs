//! Alternate-title lookup for fuzzy show matching.
//!
//! Anime upstreams index shows under romanized or alternate titles that
//! rarely equal the TMDB name. The jikan.moe API supplies the synonym set;
//! matching against every known alias keeps the 95/100 similarity gate from
//! rejecting legitimate shows.

use std::sync::Arc;

use driftnet_core::TmdbClient;
use driftnet_core::cache::TtlCache;
use driftnet_core::config::CacheConfig;
use driftnet_core::types::TmdbId;
use serde::Deserialize;
use strsim::normalized_levenshtein;

use crate::errors::SearchError;

/// Similarity ratio (0-100) below which a name match is rejected rather
/// than risking a wrong show.
pub const SIMILARITY_THRESHOLD: f64 = 95.0;

/// Best similarity ratio (0-100) between `key` and any of `names`.
pub fn closeness<'a, I>(key: &str, names: I) -> f64
where
    I: IntoIterator<Item = &'a str>,
{
    let key = key.to_lowercase();
    names
        .into_iter()
        .map(|name| normalized_levenshtein(&key, &name.to_lowercase()) * 100.0)
        .fold(0.0, f64::max)
}

#[derive(Debug, Deserialize)]
struct JikanResult {
    title: String,
    #[serde(default)]
    title_synonyms: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct JikanResponse {
    #[serde(default)]
    data: Vec<JikanResult>,
}

/// Client for the jikan.moe anime index.
#[derive(Debug)]
pub struct AliasClient {
    http: reqwest::Client,
    base_url: String,
    tmdb: Arc<TmdbClient>,
    names: TtlCache<TmdbId, Vec<String>>,
}

impl AliasClient {
    /// Creates a client rooted at `base_url`.
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        tmdb: Arc<TmdbClient>,
        cache: &CacheConfig,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            tmdb,
            names: TtlCache::new(cache.capacity, cache.ttl),
        }
    }

    /// All names a show is known under: the TMDB name plus, when the index
    /// agrees closely enough on the title, its synonyms. Falls back to just
    /// the TMDB name when the index has nothing usable.
    ///
    /// # Errors
    /// - `SearchError::Metadata` - TMDB name lookup failed
    /// - `SearchError::Network` - Index unreachable
    pub async fn names(&self, tmdb_id: TmdbId) -> Result<Vec<String>, SearchError> {
        self.names
            .get_or_try_insert(tmdb_id, || self.fetch_names(tmdb_id))
            .await
    }

    async fn fetch_names(&self, tmdb_id: TmdbId) -> Result<Vec<String>, SearchError> {
        let name = self.tmdb.get_tv(tmdb_id).await?.name;

        let response = self
            .http
            .get(format!("{}/anime", self.base_url))
            .query(&[("q", name.as_str()), ("limit", "1")])
            .send()
            .await
            .map_err(SearchError::network)?;
        let body: JikanResponse = response.json().await.map_err(SearchError::network)?;

        let Some(result) = body.data.into_iter().next() else {
            return Ok(vec![name]);
        };
        if closeness(&name, [result.title.as_str()]) < SIMILARITY_THRESHOLD {
            return Ok(vec![name]);
        }

        let mut names = vec![name, result.title];
        names.extend(result.title_synonyms);
        names.dedup();
        Ok(names)
    }

    /// Drops cached alias sets.
    pub fn clear_cache(&self) {
        self.names.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closeness_exact_match() {
        assert_eq!(closeness("Chernobyl", ["chernobyl"]), 100.0);
    }

    #[test]
    fn test_closeness_takes_best_of_aliases() {
        let score = closeness(
            "Shingeki no Kyojin",
            ["Attack on Titan", "Shingeki no Kyojin"],
        );
        assert_eq!(score, 100.0);
    }

    #[test]
    fn test_closeness_rejects_distant_names() {
        assert!(closeness("Chernobyl", ["Breaking Bad"]) < SIMILARITY_THRESHOLD);
    }

    #[test]
    fn test_threshold_boundary() {
        // One edit in a ten-character name lands below the gate.
        assert!(closeness("Chernobyl!", ["Chernobyl?"]) < SIMILARITY_THRESHOLD);
    }
}
