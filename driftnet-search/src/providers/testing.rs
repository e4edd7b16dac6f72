//! Configurable in-memory provider for exercising the fan-out engine.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use driftnet_core::types::{ImdbId, TmdbId};
use futures::stream;
use tokio::sync::Notify;

use super::{MovieProvider, Provider, TorrentStream, TvProvider};
use crate::errors::SearchError;
use crate::types::{ProviderSource, Torrent};

/// Counts live provider streams; decremented on drop so tests can assert
/// that cancellation reaped every outstanding sequence.
#[derive(Debug)]
pub struct ActiveGuard {
    counter: Arc<AtomicUsize>,
}

impl ActiveGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// In-memory provider with scriptable behavior: fixed results, an immediate
/// failure, or a gate that holds the sequence open until notified.
#[derive(Debug, Default)]
pub struct StaticProvider {
    items: Vec<Torrent>,
    fail: bool,
    /// When set, the stream yields `gate_after` items, then waits for a
    /// notification before yielding the rest.
    gate: Option<Arc<Notify>>,
    gate_after: usize,
    active: Option<Arc<AtomicUsize>>,
}

impl StaticProvider {
    /// Provider yielding exactly `items`, in order.
    pub fn new(items: Vec<Torrent>) -> Self {
        Self {
            items,
            ..Default::default()
        }
    }

    /// Provider whose sequence fails before producing anything.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    /// Holds the sequence open after `after` items until `gate` is notified.
    pub fn gated(mut self, gate: Arc<Notify>, after: usize) -> Self {
        self.gate = Some(gate);
        self.gate_after = after;
        self
    }

    /// Tracks live streams in `counter` for leak assertions.
    pub fn tracked(mut self, counter: Arc<AtomicUsize>) -> Self {
        self.active = Some(counter);
        self
    }

    fn stream(&self) -> TorrentStream<'_> {
        if self.fail {
            return Box::pin(stream::once(async {
                Err(SearchError::Upstream {
                    reason: "scripted failure".to_string(),
                })
            }));
        }

        struct State {
            items: std::vec::IntoIter<Torrent>,
            yielded: usize,
            gate: Option<Arc<Notify>>,
            gate_after: usize,
            _guard: Option<ActiveGuard>,
        }

        let state = State {
            items: self.items.clone().into_iter(),
            yielded: 0,
            gate: self.gate.clone(),
            gate_after: self.gate_after,
            _guard: self.active.clone().map(ActiveGuard::new),
        };

        Box::pin(stream::unfold(state, |mut state| async move {
            if state.yielded == state.gate_after {
                if let Some(gate) = state.gate.take() {
                    gate.notified().await;
                }
            }
            let item = state.items.next()?;
            state.yielded += 1;
            Some((Ok(item), state))
        }))
    }
}

#[async_trait]
impl Provider for StaticProvider {
    fn source(&self) -> ProviderSource {
        ProviderSource::Piratebay
    }

    async fn health(&self) -> Result<(), SearchError> {
        Ok(())
    }
}

impl TvProvider for StaticProvider {
    fn search_tv<'a>(
        &'a self,
        _imdb_id: Option<&'a ImdbId>,
        _tmdb_id: TmdbId,
        _season: u32,
        _episode: Option<u32>,
    ) -> TorrentStream<'a> {
        self.stream()
    }
}

impl MovieProvider for StaticProvider {
    fn search_movies<'a>(
        &'a self,
        _imdb_id: Option<&'a ImdbId>,
        _tmdb_id: TmdbId,
    ) -> TorrentStream<'a> {
        self.stream()
    }
}
