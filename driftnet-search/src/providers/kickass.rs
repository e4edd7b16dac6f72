//! Kickass provider: HTML scraping of katcr.co.

use std::sync::Arc;

use async_trait::async_trait;
use driftnet_core::TmdbClient;
use driftnet_core::types::{ImdbId, TmdbId};
use scraper::{Html, Selector};

use super::{
    MovieProvider, Provider, TorrentStream, TvProvider, check_http, empty_stream, movie_convert,
    single_page, tv_convert,
};
use crate::errors::SearchError;
use crate::types::{EpisodeInfo, ProviderSource, Torrent};

#[derive(Debug, Clone)]
struct RawResult {
    title: String,
    magnet: String,
    resolution: String,
    seeders: u32,
}

/// Lowercases a show name and folds punctuation into the hyphenated form
/// katcr uses in its URLs.
fn tokenise(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| !c.is_ascii_punctuation())
        .collect::<String>()
        .replace(' ', "-")
}

/// Results are grouped into tabs keyed by resolution; the comments tab is
/// not a result set.
fn parse_listing(html: &str) -> Vec<RawResult> {
    let tab = Selector::parse("div.tab_content").unwrap();
    let row = Selector::parse("tbody tr").unwrap();
    let link = Selector::parse("a").unwrap();
    let title = Selector::parse("a.torrents_table__torrent_title").unwrap();
    let cell = Selector::parse("td").unwrap();

    let document = Html::parse_document(html);
    let mut results = Vec::new();

    for div in document.select(&tab) {
        let resolution = match div.value().attr("id") {
            Some(id) if id != "comments" => id.to_string(),
            _ => continue,
        };

        for tr in div.select(&row) {
            let magnet = tr
                .select(&link)
                .filter_map(|a| a.value().attr("href"))
                .find(|href| href.starts_with("magnet:"));
            let name = tr
                .select(&title)
                .next()
                .map(|a| a.text().collect::<String>());
            let seeders = tr
                .select(&cell)
                .find(|td| td.value().attr("data-title") == Some("Seed"))
                .map(|td| td.text().collect::<String>().replace(',', ""))
                .and_then(|text| text.trim().parse().ok())
                .unwrap_or(0);

            if let (Some(magnet), Some(name)) = (magnet, name) {
                results.push(RawResult {
                    title: name.trim().to_string(),
                    magnet: magnet.to_string(),
                    resolution: resolution.clone(),
                    seeders,
                });
            }
        }
    }

    results
}

/// Adapter for the Kickass upstream. Searches key on the IMDB id; without
/// one the provider yields nothing and stays off the network.
#[derive(Debug)]
pub struct KickassProvider {
    http: reqwest::Client,
    root: String,
    tmdb: Arc<TmdbClient>,
}

impl KickassProvider {
    /// Creates a provider rooted at `root`.
    pub fn new(http: reqwest::Client, root: &str, tmdb: Arc<TmdbClient>) -> Self {
        Self {
            http,
            root: root.trim_end_matches('/').to_string(),
            tmdb,
        }
    }

    async fn fetch(&self, path: String) -> Result<Vec<RawResult>, SearchError> {
        let response = self
            .http
            .get(format!("{}{path}", self.root))
            .send()
            .await
            .map_err(SearchError::network)?;
        if !response.status().is_success() {
            return Err(SearchError::UpstreamStatus {
                status: response.status().as_u16(),
            });
        }
        let body = response.text().await.map_err(SearchError::network)?;
        Ok(parse_listing(&body))
    }
}

#[async_trait]
impl Provider for KickassProvider {
    fn source(&self) -> ProviderSource {
        ProviderSource::Kickass
    }

    async fn health(&self) -> Result<(), SearchError> {
        check_http(&self.http, &self.root).await
    }
}

impl TvProvider for KickassProvider {
    fn search_tv<'a>(
        &'a self,
        imdb_id: Option<&'a ImdbId>,
        tmdb_id: TmdbId,
        season: u32,
        episode: Option<u32>,
    ) -> TorrentStream<'a> {
        let Some(imdb_id) = imdb_id else {
            return empty_stream();
        };

        single_page(async move {
            let name = self.tmdb.get_tv(tmdb_id).await?.name;

            let items = match episode {
                Some(episode) => {
                    self.fetch(format!(
                        "/name/search/{}/i{}/{season}/{episode}",
                        tokenise(&name),
                        imdb_id.digits()
                    ))
                    .await?
                }
                None => {
                    let marker = format!("S{season:02}");
                    self.fetch(format!("/name/{}/i{}", tokenise(&name), imdb_id.digits()))
                        .await?
                        .into_iter()
                        .filter(|item| item.title.contains(&marker))
                        .collect()
                }
            };

            Ok(items
                .into_iter()
                .map(|item| Torrent {
                    source: ProviderSource::Kickass,
                    title: item.title,
                    seeders: item.seeders,
                    download: item.magnet,
                    category: tv_convert(&item.resolution),
                    episode_info: EpisodeInfo::tv(season, episode),
                })
                .collect())
        })
    }
}

impl MovieProvider for KickassProvider {
    fn search_movies<'a>(
        &'a self,
        imdb_id: Option<&'a ImdbId>,
        tmdb_id: TmdbId,
    ) -> TorrentStream<'a> {
        let Some(imdb_id) = imdb_id else {
            return empty_stream();
        };

        single_page(async move {
            let title = self.tmdb.get_movie(tmdb_id).await?.title;
            let items = self
                .fetch(format!("/name/{}/i{}", tokenise(&title), imdb_id.digits()))
                .await?;

            Ok(items
                .into_iter()
                .map(|item| Torrent {
                    source: ProviderSource::Kickass,
                    title: item.title,
                    seeders: item.seeders,
                    download: item.magnet,
                    category: movie_convert(&item.resolution),
                    episode_info: EpisodeInfo::default(),
                })
                .collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;

    const LISTING: &str = r#"
        <html><body>
        <div class="tab_content" id="1080p">
          <table><tbody>
            <tr>
              <td><a class="torrents_table__torrent_title" href="/t/1"> Chernobyl S01E04 1080p </a></td>
              <td><a href="magnet:?xt=urn:btih:abc">magnet</a></td>
              <td data-title="Seed">1,234</td>
            </tr>
          </tbody></table>
        </div>
        <div class="tab_content" id="comments"><table><tbody>
          <tr><td><a class="torrents_table__torrent_title" href="/c">spam</a></td></tr>
        </tbody></table></div>
        </body></html>
    "#;

    #[test]
    fn test_parse_listing_skips_comments_tab() {
        let results = parse_listing(LISTING);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Chernobyl S01E04 1080p");
        assert_eq!(results[0].resolution, "1080p");
        assert_eq!(results[0].seeders, 1234);
        assert!(results[0].magnet.starts_with("magnet:"));
    }

    #[test]
    fn test_tokenise() {
        assert_eq!(tokenise("The Handmaid's Tale"), "the-handmaids-tale");
        assert_eq!(tokenise("Mr. Robot"), "mr-robot");
    }

    #[tokio::test]
    async fn test_missing_imdb_id_yields_nothing_offline() {
        // No server is running at this root: any network call would error,
        // and an error would surface as a stream item.
        let provider = KickassProvider::new(
            reqwest::Client::new(),
            "http://127.0.0.1:1",
            Arc::new(TmdbClient::new(
                reqwest::Client::new(),
                &driftnet_core::config::TmdbConfig {
                    base_url: "http://127.0.0.1:1".to_string(),
                    api_key: String::new(),
                },
                &driftnet_core::config::CacheConfig::default(),
            )),
        );

        let results: Vec<_> = provider.search_tv(None, TmdbId(1), 1, Some(1)).collect().await;
        assert!(results.is_empty());
    }
}
