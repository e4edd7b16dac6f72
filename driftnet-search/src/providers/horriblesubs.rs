//! HorribleSubs provider: show-index fuzzy matching plus a paginated
//! downloads API.
//!
//! The upstream has no search-by-id; shows are found by matching the TMDB
//! name (and its aliases) against the scraped show index, gated at 95/100
//! similarity so a near-miss never silently maps to the wrong show. The
//! site only carries current-run season 1 content.

use std::sync::Arc;

use async_trait::async_trait;
use driftnet_core::TmdbClient;
use driftnet_core::cache::TtlCache;
use driftnet_core::config::CacheConfig;
use driftnet_core::types::{ImdbId, TmdbId};
use futures::{TryStreamExt, stream};
use regex::Regex;
use scraper::{Html, Selector};

use super::{Provider, TorrentStream, TvProvider, check_http, paged, tv_convert};
use crate::aliases::{AliasClient, SIMILARITY_THRESHOLD, closeness};
use crate::errors::SearchError;
use crate::types::{EpisodeInfo, ProviderSource, Torrent};

const NO_BATCHES: &str = "There are no batches for this show yet";

#[derive(Debug, Clone)]
struct RawDownload {
    episode: String,
    resolution: String,
    magnet: String,
}

fn parse_show_index(html: &str) -> Vec<(String, String)> {
    let show = Selector::parse("div.ind-show a").unwrap();
    let document = Html::parse_document(html);

    document
        .select(&show)
        .filter_map(|a| {
            let title = a.value().attr("title")?;
            let href = a.value().attr("href")?;
            Some((title.to_string(), href.to_string()))
        })
        .collect()
}

fn parse_downloads(html: &str) -> Vec<RawDownload> {
    let container = Selector::parse("div.rls-info-container").unwrap();
    let document = Html::parse_fragment(html);

    let mut downloads = Vec::new();
    for div in document.select(&container) {
        let Some(episode) = div.value().attr("id") else {
            continue;
        };
        for resolution in ["1080", "720", "480"] {
            let magnet_link = Selector::parse(&format!(
                "div.link-{resolution} span a[title=\"Magnet Link\"]"
            ))
            .unwrap();
            if let Some(href) = div
                .select(&magnet_link)
                .filter_map(|a| a.value().attr("href"))
                .next()
            {
                downloads.push(RawDownload {
                    episode: episode.to_string(),
                    resolution: resolution.to_string(),
                    magnet: href.to_string(),
                });
            }
        }
    }
    downloads
}

/// Adapter for the HorribleSubs release archive.
#[derive(Debug)]
pub struct HorriblesubsProvider {
    http: reqwest::Client,
    root: String,
    tmdb: Arc<TmdbClient>,
    aliases: Arc<AliasClient>,
    shows: TtlCache<(), Vec<(String, String)>>,
}

impl HorriblesubsProvider {
    /// Creates a provider rooted at `root`.
    pub fn new(
        http: reqwest::Client,
        root: &str,
        tmdb: Arc<TmdbClient>,
        aliases: Arc<AliasClient>,
        cache: &CacheConfig,
    ) -> Self {
        Self {
            http,
            root: root.trim_end_matches('/').to_string(),
            tmdb,
            aliases,
            shows: TtlCache::new(1, cache.ttl),
        }
    }

    async fn all_shows(&self) -> Result<Vec<(String, String)>, SearchError> {
        self.shows
            .get_or_try_insert((), || async {
                let response = self
                    .http
                    .get(format!("{}/shows/", self.root))
                    .send()
                    .await
                    .map_err(SearchError::network)?;
                if !response.status().is_success() {
                    return Err(SearchError::UpstreamStatus {
                        status: response.status().as_u16(),
                    });
                }
                let body = response.text().await.map_err(SearchError::network)?;
                Ok(parse_show_index(&body))
            })
            .await
    }

    async fn show_id(&self, path: &str) -> Result<Option<u32>, SearchError> {
        let response = self
            .http
            .get(format!("{}{path}", self.root))
            .send()
            .await
            .map_err(SearchError::network)?;
        let body = response.text().await.map_err(SearchError::network)?;

        let show_id = Regex::new(r"var hs_showid = (\d+);").unwrap();
        Ok(show_id
            .captures(&body)
            .and_then(|captures| captures[1].parse().ok()))
    }

    /// Resolves the upstream show and builds the lazy download stream; any
    /// failure here ends the whole sequence before it produced anything.
    async fn tv_stream(
        &self,
        tmdb_id: TmdbId,
        season: u32,
        episode: Option<u32>,
    ) -> Result<TorrentStream<'_>, SearchError> {
        // The archive only carries current-run (first season) content.
        if season != 1 {
            return Ok(super::empty_stream());
        }

        let name = self.tmdb.get_tv(tmdb_id).await?.name;
        let names = self.aliases.names(tmdb_id).await?;

        let shows = self.all_shows().await?;
        let best = shows
            .iter()
            .max_by(|(a, _), (b, _)| {
                closeness(a, names.iter().map(String::as_str))
                    .total_cmp(&closeness(b, names.iter().map(String::as_str)))
            })
            .cloned();
        let Some((title, path)) = best else {
            return Ok(super::empty_stream());
        };
        if closeness(&title, names.iter().map(String::as_str)) < SIMILARITY_THRESHOLD {
            tracing::debug!(%title, show = %name, "no close enough show index match");
            return Ok(super::empty_stream());
        }

        let Some(show_id) = self.show_id(&path).await? else {
            return Ok(super::empty_stream());
        };

        let wanted = episode.map(|episode| format!("{episode:02}"));
        let template = format!("HorribleSubs {name} S{season:02}");

        Ok(paged(stream::try_unfold(0u32, move |page| {
            let wanted = wanted.clone();
            let template = template.clone();
            async move {
                let batch = self.downloads_page(show_id, page).await?;
                if batch.is_empty() {
                    return Ok(None);
                }
                let items: Vec<Torrent> = batch
                    .into_iter()
                    .filter(|download| {
                        wanted
                            .as_deref()
                            .is_none_or(|wanted| download.episode == wanted)
                    })
                    .map(|download| {
                        let number: u32 = download.episode.trim().parse().unwrap_or_default();
                        Torrent {
                            source: ProviderSource::Horriblesubs,
                            title: format!("{template}E{number:02} {}", download.resolution),
                            seeders: 0,
                            download: download.magnet,
                            category: tv_convert(&download.resolution),
                            episode_info: EpisodeInfo::tv(season, Some(number)),
                        }
                    })
                    .collect();
                Ok(Some((items, page + 1)))
            }
        })))
    }

    async fn downloads_page(
        &self,
        show_id: u32,
        page: u32,
    ) -> Result<Vec<RawDownload>, SearchError> {
        let show_id = show_id.to_string();
        let page = page.to_string();
        let response = self
            .http
            .get(format!("{}/api.php", self.root))
            .query(&[
                ("method", "getshows"),
                ("type", "show"),
                ("showid", show_id.as_str()),
                ("nextid", page.as_str()),
            ])
            .send()
            .await
            .map_err(SearchError::network)?;
        let body = response.text().await.map_err(SearchError::network)?;

        if body.trim() == NO_BATCHES {
            return Ok(Vec::new());
        }
        Ok(parse_downloads(&body))
    }
}

#[async_trait]
impl Provider for HorriblesubsProvider {
    fn source(&self) -> ProviderSource {
        ProviderSource::Horriblesubs
    }

    async fn health(&self) -> Result<(), SearchError> {
        check_http(&self.http, &self.root).await
    }
}

impl TvProvider for HorriblesubsProvider {
    fn search_tv<'a>(
        &'a self,
        _imdb_id: Option<&'a ImdbId>,
        tmdb_id: TmdbId,
        season: u32,
        episode: Option<u32>,
    ) -> TorrentStream<'a> {
        Box::pin(stream::once(self.tv_stream(tmdb_id, season, episode)).try_flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_show_index() {
        let html = r#"
            <div class="ind-show"><a title="Shingeki no Kyojin" href="/shows/shingeki-no-kyojin"></a></div>
            <div class="ind-show"><a title="One Piece" href="/shows/one-piece"></a></div>
        "#;
        let shows = parse_show_index(html);
        assert_eq!(shows.len(), 2);
        assert_eq!(shows[0].0, "Shingeki no Kyojin");
        assert_eq!(shows[1].1, "/shows/one-piece");
    }

    #[test]
    fn test_parse_downloads_prefers_available_resolutions() {
        let html = r#"
            <div class="rls-info-container" id="04">
              <div class="link-1080"><span><a title="Magnet Link" href="magnet:?xt=urn:btih:aa"></a></span></div>
              <div class="link-480"><span><a title="Magnet Link" href="magnet:?xt=urn:btih:bb"></a></span></div>
            </div>
        "#;
        let downloads = parse_downloads(html);
        assert_eq!(downloads.len(), 2);
        assert_eq!(downloads[0].resolution, "1080");
        assert_eq!(downloads[0].episode, "04");
        assert_eq!(downloads[1].resolution, "480");
    }

    #[test]
    fn test_parse_downloads_no_batches_shape() {
        assert!(parse_downloads("<p>nothing here</p>").is_empty());
    }
}
