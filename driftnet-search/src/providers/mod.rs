//! Provider capability traits, registry, and shared normalization.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use driftnet_core::types::{ImdbId, TmdbId};
use driftnet_core::{DriftnetConfig, TmdbClient};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};

use crate::aliases::AliasClient;
use crate::errors::SearchError;
use crate::types::Torrent;

pub mod horriblesubs;
pub mod kickass;
pub mod nyaa;
pub mod piratebay;
pub mod rarbg;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod torrents_csv;

pub use horriblesubs::HorriblesubsProvider;
pub use kickass::KickassProvider;
pub use nyaa::NyaaProvider;
pub use piratebay::PirateBayProvider;
pub use rarbg::RarbgProvider;
pub use torrents_csv::TorrentsCsvProvider;

/// Lazy, non-restartable sequence of results from one provider. The
/// sequence ends at upstream exhaustion; an `Err` item ends it early and is
/// contained by the fan-out engine.
pub type TorrentStream<'a> = BoxStream<'a, Result<Torrent, SearchError>>;

/// Base contract every provider satisfies regardless of capability.
#[async_trait]
pub trait Provider: Send + Sync + fmt::Debug {
    /// The upstream this provider adapts.
    fn source(&self) -> crate::types::ProviderSource;

    /// Probes whether the upstream is reachable.
    ///
    /// # Errors
    /// - `SearchError` - Upstream unreachable or answering with an error
    async fn health(&self) -> Result<(), SearchError>;
}

/// Capability: search one upstream for TV results.
pub trait TvProvider: Provider {
    /// Produces results for one season (optionally narrowed to an episode).
    ///
    /// Providers that key on the cross-reference id yield nothing when it
    /// is absent, without touching the network.
    fn search_tv<'a>(
        &'a self,
        imdb_id: Option<&'a ImdbId>,
        tmdb_id: TmdbId,
        season: u32,
        episode: Option<u32>,
    ) -> TorrentStream<'a>;
}

/// Capability: search one upstream for movie results.
pub trait MovieProvider: Provider {
    /// Produces results for a movie.
    fn search_movies<'a>(
        &'a self,
        imdb_id: Option<&'a ImdbId>,
        tmdb_id: TmdbId,
    ) -> TorrentStream<'a>;
}

/// Wraps a future producing one page of results into a lazy stream.
pub(crate) fn single_page<'a, F>(page: F) -> TorrentStream<'a>
where
    F: Future<Output = Result<Vec<Torrent>, SearchError>> + Send + 'a,
{
    stream::once(page)
        .map_ok(|items| stream::iter(items.into_iter().map(Ok)))
        .try_flatten()
        .boxed()
}

/// Flattens pages produced by `try_unfold`-style pagination into a stream
/// of individual results.
pub(crate) fn paged<'a, S>(pages: S) -> TorrentStream<'a>
where
    S: futures::Stream<Item = Result<Vec<Torrent>, SearchError>> + Send + 'a,
{
    pages
        .map_ok(|items| stream::iter(items.into_iter().map(Ok)))
        .try_flatten()
        .boxed()
}

/// An always-empty provider stream.
pub(crate) fn empty_stream<'a>() -> TorrentStream<'a> {
    stream::empty().boxed()
}

/// Shared health probe: the upstream root answers an HTTP request.
pub(crate) async fn check_http(http: &reqwest::Client, url: &str) -> Result<(), SearchError> {
    let response = http.get(url).send().await.map_err(SearchError::network)?;
    if response.status().is_success() || response.status().is_redirection() {
        Ok(())
    } else {
        Err(SearchError::UpstreamStatus {
            status: response.status().as_u16(),
        })
    }
}

/// Translates a raw TV quality label into the canonical category name.
/// Unknown labels pass through unchanged.
pub fn tv_convert(key: &str) -> String {
    match key {
        "480" | "480p" | "720" | "720p" => "TV Episodes",
        "1080" | "1080p" | "x264" => "TV HD Episodes",
        "2160" | "2160p" => "TV UHD Episodes",
        other => other,
    }
    .to_string()
}

/// Translates a raw movie quality label into the canonical category name.
/// Unknown labels pass through unchanged.
pub fn movie_convert(key: &str) -> String {
    match key {
        "720" | "720p" => "x264/720",
        "1080" | "1080p" => "x264/1080",
        "2160" | "2160p" => "x265/4k",
        other => other,
    }
    .to_string()
}

/// The active provider set, filtered by capability at registration time so
/// dispatch never needs downcasting.
#[derive(Default)]
pub struct ProviderRegistry {
    tv: Vec<Arc<dyn TvProvider>>,
    movies: Vec<Arc<dyn MovieProvider>>,
    all: Vec<Arc<dyn Provider>>,
}

impl ProviderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a TV-capable provider.
    pub fn register_tv<P: TvProvider + 'static>(&mut self, provider: Arc<P>) {
        self.tv.push(provider.clone());
        self.all.push(provider);
    }

    /// Registers a movie-capable provider.
    pub fn register_movie<P: MovieProvider + 'static>(&mut self, provider: Arc<P>) {
        self.movies.push(provider.clone());
        self.all.push(provider);
    }

    /// Registers a provider with both capabilities.
    pub fn register<P: TvProvider + MovieProvider + 'static>(&mut self, provider: Arc<P>) {
        self.tv.push(provider.clone());
        self.movies.push(provider.clone());
        self.all.push(provider);
    }

    /// Providers able to serve a series request.
    pub fn tv_providers(&self) -> &[Arc<dyn TvProvider>] {
        &self.tv
    }

    /// Providers able to serve a movie request.
    pub fn movie_providers(&self) -> &[Arc<dyn MovieProvider>] {
        &self.movies
    }

    /// Every registered provider, once each, for health probing.
    pub fn providers(&self) -> &[Arc<dyn Provider>] {
        &self.all
    }

    /// Wires up the full production provider set.
    pub fn with_defaults(
        http: reqwest::Client,
        config: &DriftnetConfig,
        tmdb: Arc<TmdbClient>,
    ) -> Self {
        let aliases = Arc::new(AliasClient::new(
            http.clone(),
            &config.upstreams.jikan,
            tmdb.clone(),
            &config.cache,
        ));

        let mut registry = Self::new();
        registry.register_tv(Arc::new(HorriblesubsProvider::new(
            http.clone(),
            &config.upstreams.horriblesubs,
            tmdb.clone(),
            aliases,
            &config.cache,
        )));
        registry.register(Arc::new(RarbgProvider::new(
            http.clone(),
            &config.upstreams.rarbg,
        )));
        registry.register(Arc::new(KickassProvider::new(
            http.clone(),
            &config.upstreams.kickass,
            tmdb.clone(),
        )));
        registry.register_movie(Arc::new(TorrentsCsvProvider::new(
            http.clone(),
            &config.upstreams.torrents_csv,
        )));
        registry.register_tv(Arc::new(NyaaProvider::new(
            http.clone(),
            &config.upstreams.nyaa,
            tmdb,
        )));
        registry.register(Arc::new(PirateBayProvider::new(
            http,
            &config.upstreams.piratebay,
        )));
        registry
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("tv", &self.tv.len())
            .field("movies", &self.movies.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tv_convert() {
        assert_eq!(tv_convert("720p"), "TV Episodes");
        assert_eq!(tv_convert("1080"), "TV HD Episodes");
        assert_eq!(tv_convert("video - tv shows"), "video - tv shows");
    }

    #[test]
    fn test_movie_convert() {
        assert_eq!(movie_convert("720p"), "x264/720");
        assert_eq!(movie_convert("1080p"), "x264/1080");
        assert_eq!(movie_convert("Movies/Full BD"), "Movies/Full BD");
    }

    #[test]
    fn test_registry_capability_filtering() {
        let registry = ProviderRegistry::with_defaults(
            reqwest::Client::new(),
            &DriftnetConfig::default(),
            Arc::new(TmdbClient::new(
                reqwest::Client::new(),
                &DriftnetConfig::default().tmdb,
                &DriftnetConfig::default().cache,
            )),
        );

        // Horriblesubs and Nyaa are TV-only; TorrentsCsv is movie-only.
        assert_eq!(registry.tv_providers().len(), 5);
        assert_eq!(registry.movie_providers().len(), 4);
        assert_eq!(registry.providers().len(), 6);
    }
}
