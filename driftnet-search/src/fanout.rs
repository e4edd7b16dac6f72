//! Concurrent fan-out across providers with per-provider failure isolation.
//!
//! One worker task per capable provider drains that provider's lazy result
//! sequence into a shared unbounded queue. The consumer side is a plain
//! `Stream` over the queue: it ends only once every worker has finished AND
//! the queue is drained, which is exactly the close semantics of an mpsc
//! channel whose senders have all been dropped. Dropping the stream aborts
//! all outstanding workers, so a disconnected client never leaves orphaned
//! upstream fetches behind.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use driftnet_core::types::{ImdbId, TmdbId};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::providers::{MovieProvider, TorrentStream, TvProvider};
use crate::types::Torrent;

/// Merged, arrival-ordered stream of results from all queried providers.
///
/// No ordering is guaranteed between providers; within one provider the
/// upstream's pagination order is preserved.
pub struct SearchStream {
    rx: mpsc::UnboundedReceiver<Torrent>,
    // Worker tasks are aborted when the set (and thus the stream) is dropped.
    workers: JoinSet<()>,
}

impl SearchStream {
    /// Number of worker tasks not yet finished and reaped.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

impl Stream for SearchStream {
    type Item = Torrent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Torrent>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

async fn drain(
    source: crate::types::ProviderSource,
    mut results: TorrentStream<'_>,
    tx: &mpsc::UnboundedSender<Torrent>,
) {
    while let Some(item) = results.next().await {
        match item {
            Ok(torrent) => {
                // The consumer dropping the stream is normal shutdown.
                if tx.send(torrent).is_err() {
                    return;
                }
            }
            Err(error) => {
                tracing::warn!(provider = %source, %error, "provider search failed");
                return;
            }
        }
    }
}

/// Queries every TV-capable provider concurrently for one season/episode.
pub fn search_for_tv(
    providers: &[Arc<dyn TvProvider>],
    imdb_id: Option<ImdbId>,
    tmdb_id: TmdbId,
    season: u32,
    episode: Option<u32>,
) -> SearchStream {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut workers = JoinSet::new();

    for provider in providers {
        let provider = Arc::clone(provider);
        let imdb_id = imdb_id.clone();
        let tx = tx.clone();
        workers.spawn(async move {
            let results = provider.search_tv(imdb_id.as_ref(), tmdb_id, season, episode);
            drain(provider.source(), results, &tx).await;
        });
    }

    SearchStream { rx, workers }
}

/// Queries every movie-capable provider concurrently.
pub fn search_for_movie(
    providers: &[Arc<dyn MovieProvider>],
    imdb_id: Option<ImdbId>,
    tmdb_id: TmdbId,
) -> SearchStream {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut workers = JoinSet::new();

    for provider in providers {
        let provider = Arc::clone(provider);
        let imdb_id = imdb_id.clone();
        let tx = tx.clone();
        workers.spawn(async move {
            let results = provider.search_movies(imdb_id.as_ref(), tmdb_id);
            drain(provider.source(), results, &tx).await;
        });
    }

    SearchStream { rx, workers }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::providers::testing::StaticProvider;
    use crate::types::ProviderSource;

    fn torrent(title: &str) -> Torrent {
        Torrent {
            source: ProviderSource::Piratebay,
            title: title.to_string(),
            seeders: 1,
            download: "magnet:?xt=urn:btih:0".to_string(),
            category: "TV Episodes".to_string(),
            episode_info: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_merges_all_providers() {
        let providers: Vec<Arc<dyn TvProvider>> = vec![
            Arc::new(StaticProvider::new(vec![torrent("a1"), torrent("a2")])),
            Arc::new(StaticProvider::new(vec![torrent("b1")])),
        ];

        let stream = search_for_tv(&providers, None, TmdbId(1), 1, None);
        let mut titles: Vec<String> = stream.map(|t| t.title).collect().await;
        titles.sort();
        assert_eq!(titles, ["a1", "a2", "b1"]);
    }

    #[tokio::test]
    async fn test_failing_provider_does_not_poison_siblings() {
        let providers: Vec<Arc<dyn TvProvider>> = vec![
            Arc::new(StaticProvider::failing()),
            Arc::new(StaticProvider::new(vec![torrent("ok")])),
        ];

        let stream = search_for_tv(&providers, None, TmdbId(1), 1, None);
        let titles: Vec<String> = stream.map(|t| t.title).collect().await;
        assert_eq!(titles, ["ok"]);
    }

    #[tokio::test]
    async fn test_empty_provider_list_completes() {
        let stream = search_for_tv(&[], None, TmdbId(1), 1, None);
        assert_eq!(stream.collect::<Vec<_>>().await.len(), 0);
    }
}
