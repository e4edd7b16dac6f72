//! Nyaa provider: HTML scraping of nyaa.si with page-number pagination.

use std::sync::Arc;

use async_trait::async_trait;
use driftnet_core::TmdbClient;
use driftnet_core::types::{ImdbId, TmdbId};
use futures::{TryStreamExt, stream};
use scraper::{Html, Selector};

use super::{Provider, TorrentStream, TvProvider, check_http, paged, tv_convert};
use crate::errors::SearchError;
use crate::season::format_marker;
use crate::types::{EpisodeInfo, ProviderSource, Torrent};

#[derive(Debug, Clone)]
struct RawRow {
    title: String,
    magnet: String,
    category: String,
    seeders: u32,
}

fn parse_listing(html: &str) -> Vec<RawRow> {
    let row = Selector::parse("table.torrent-list tbody tr").unwrap();
    let link = Selector::parse("a").unwrap();
    let cell = Selector::parse("td").unwrap();

    let document = Html::parse_document(html);
    let mut rows = Vec::new();

    for tr in document.select(&row) {
        let cells: Vec<_> = tr.select(&cell).collect();

        let title = cells.get(1).and_then(|td| {
            td.select(&link)
                .filter(|a| {
                    a.value()
                        .attr("href")
                        .is_some_and(|href| href.starts_with("/view/"))
                })
                .last()
                .map(|a| {
                    a.value()
                        .attr("title")
                        .map(str::to_string)
                        .unwrap_or_else(|| a.text().collect::<String>())
                })
        });
        let magnet = tr
            .select(&link)
            .filter_map(|a| a.value().attr("href"))
            .find(|href| href.starts_with("magnet:"))
            .map(str::to_string);
        let category = cells
            .first()
            .and_then(|td| td.select(&link).next())
            .and_then(|a| a.value().attr("title"))
            .unwrap_or_default()
            .to_string();
        let seeders = cells
            .get(5)
            .map(|td| td.text().collect::<String>())
            .and_then(|text| text.trim().parse().ok())
            .unwrap_or(0);

        if let (Some(title), Some(magnet)) = (title, magnet) {
            rows.push(RawRow {
                title: title.trim().to_string(),
                magnet,
                category,
                seeders,
            });
        }
    }

    rows
}

/// Adapter for the nyaa.si index. TV only; queries by show name plus the
/// season/episode marker and walks result pages until one comes back empty.
#[derive(Debug)]
pub struct NyaaProvider {
    http: reqwest::Client,
    root: String,
    tmdb: Arc<TmdbClient>,
}

impl NyaaProvider {
    /// Creates a provider rooted at `root`.
    pub fn new(http: reqwest::Client, root: &str, tmdb: Arc<TmdbClient>) -> Self {
        Self {
            http,
            root: root.trim_end_matches('/').to_string(),
            tmdb,
        }
    }

    async fn page(&self, query: &str, page: u32) -> Result<Vec<RawRow>, SearchError> {
        let page = page.to_string();
        let response = self
            .http
            .get(&self.root)
            .query(&[("q", query), ("p", page.as_str())])
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
impl Provider for NyaaProvider {
    fn source(&self) -> ProviderSource {
        ProviderSource::NyaaSi
    }

    async fn health(&self) -> Result<(), SearchError> {
        check_http(&self.http, &self.root).await
    }
}

impl TvProvider for NyaaProvider {
    fn search_tv<'a>(
        &'a self,
        _imdb_id: Option<&'a ImdbId>,
        tmdb_id: TmdbId,
        season: u32,
        episode: Option<u32>,
    ) -> TorrentStream<'a> {
        let pages = stream::once(async move {
            let name = self.tmdb.get_tv(tmdb_id).await?.name;
            let template = format!("{name} {}", format_marker(season, episode));

            Ok::<_, SearchError>(stream::try_unfold(0u32, move |page| {
                let template = template.clone();
                async move {
                    let rows = self.page(&template, page).await?;
                    if rows.is_empty() {
                        Ok(None)
                    } else {
                        Ok(Some((rows, page + 1)))
                    }
                }
            }))
        })
        .try_flatten();

        paged(pages.map_ok(move |rows| {
            rows.into_iter()
                .map(|row| Torrent {
                    source: ProviderSource::NyaaSi,
                    title: row.title,
                    seeders: row.seeders,
                    download: row.magnet,
                    category: tv_convert(&row.category),
                    episode_info: EpisodeInfo::tv(season, episode),
                })
                .collect()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <table class="torrent-list"><tbody>
          <tr>
            <td><a href="/?c=1_2" title="Anime - English-translated"></a></td>
            <td>
              <a href="/view/1#comments" class="comments">3</a>
              <a href="/view/1" title="[Subs] Chernobyl S01E04 [1080p]">[Subs] Chernobyl S01E04 [1080p]</a>
            </td>
            <td><a href="/download/1.torrent"></a><a href="magnet:?xt=urn:btih:ff"></a></td>
            <td>1.2 GiB</td>
            <td>2019-05-28</td>
            <td>15</td>
            <td>3</td>
            <td>820</td>
          </tr>
        </tbody></table>
    "#;

    #[test]
    fn test_parse_listing_reads_title_magnet_seeders() {
        let rows = parse_listing(LISTING);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "[Subs] Chernobyl S01E04 [1080p]");
        assert_eq!(rows[0].seeders, 15);
        assert_eq!(rows[0].category, "Anime - English-translated");
        assert!(rows[0].magnet.starts_with("magnet:"));
    }

    #[test]
    fn test_parse_listing_empty_page() {
        assert!(parse_listing("<html><body>nothing</body></html>").is_empty());
    }
}
