//! Fan-out engine behavior: isolation, ordering, laziness, cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use driftnet_core::types::TmdbId;
use driftnet_search::fanout::search_for_tv;
use driftnet_search::providers::TvProvider;
use driftnet_search::providers::testing::StaticProvider;
use driftnet_search::types::{EpisodeInfo, ProviderSource, Torrent};
use futures::StreamExt;
use tokio::sync::Notify;
use tokio::time::timeout;

fn torrent(title: &str) -> Torrent {
    Torrent {
        source: ProviderSource::Piratebay,
        title: title.to_string(),
        seeders: 0,
        download: "magnet:?xt=urn:btih:0".to_string(),
        category: "TV Episodes".to_string(),
        episode_info: EpisodeInfo::tv(1, Some(1)),
    }
}

/// With k of N providers failing immediately, the stream still carries
/// exactly the union of the successful providers' results.
#[tokio::test]
async fn test_partial_failure_isolation() {
    for failing in 0..=2usize {
        let mut providers: Vec<Arc<dyn TvProvider>> = Vec::new();
        for _ in 0..failing {
            providers.push(Arc::new(StaticProvider::failing()));
        }
        providers.push(Arc::new(StaticProvider::new(vec![
            torrent("x1"),
            torrent("x2"),
        ])));
        providers.push(Arc::new(StaticProvider::new(vec![torrent("y1")])));

        let stream = search_for_tv(&providers, None, TmdbId(1), 1, Some(1));
        let mut titles: Vec<String> = stream.map(|t| t.title).collect().await;
        titles.sort();
        assert_eq!(titles, ["x1", "x2", "y1"], "failing={failing}");
    }
}

/// A provider's own output order survives the merge.
#[tokio::test]
async fn test_per_provider_order_preserved() {
    let providers: Vec<Arc<dyn TvProvider>> = vec![
        Arc::new(StaticProvider::failing()),
        Arc::new(StaticProvider::new(vec![
            torrent("a-1"),
            torrent("a-2"),
            torrent("a-3"),
        ])),
    ];

    let stream = search_for_tv(&providers, None, TmdbId(1), 1, None);
    let titles: Vec<String> = stream.map(|t| t.title).collect().await;

    let from_a: Vec<&String> = titles.iter().filter(|t| t.starts_with("a-")).collect();
    assert_eq!(from_a, ["a-1", "a-2", "a-3"]);
}

/// Results stream out before a slow provider finishes its sequence.
#[tokio::test]
async fn test_streaming_before_exhaustion() {
    let gate = Arc::new(Notify::new());
    let providers: Vec<Arc<dyn TvProvider>> = vec![Arc::new(
        StaticProvider::new(vec![torrent("page1"), torrent("page2")]).gated(gate.clone(), 1),
    )];

    let mut stream = search_for_tv(&providers, None, TmdbId(1), 1, None);

    // Page 1 must be observable while page 2 is still blocked.
    let first = timeout(Duration::from_secs(1), stream.next())
        .await
        .expect("first element must arrive before the sequence is exhausted")
        .unwrap();
    assert_eq!(first.title, "page1");

    gate.notify_one();
    let second = timeout(Duration::from_secs(1), stream.next())
        .await
        .expect("gated element must arrive after the notify")
        .unwrap();
    assert_eq!(second.title, "page2");

    assert!(stream.next().await.is_none());
}

async fn assert_drains_to_zero(active: &AtomicUsize) {
    for _ in 0..100 {
        if active.load(Ordering::SeqCst) == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "provider tasks still alive after grace period: {}",
        active.load(Ordering::SeqCst)
    );
}

/// Dropping the merged stream aborts every outstanding provider task.
#[tokio::test]
async fn test_drop_cancels_outstanding_tasks() {
    let active = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Notify::new());

    let providers: Vec<Arc<dyn TvProvider>> = vec![
        Arc::new(
            StaticProvider::new(vec![torrent("a1"), torrent("a2")])
                .gated(gate.clone(), 1)
                .tracked(active.clone()),
        ),
        Arc::new(
            StaticProvider::new(vec![torrent("b1"), torrent("b2")])
                .gated(gate.clone(), 1)
                .tracked(active.clone()),
        ),
    ];

    let mut stream = search_for_tv(&providers, None, TmdbId(1), 1, None);

    // Both workers are now parked on their gates with one element delivered.
    stream.next().await.unwrap();
    stream.next().await.unwrap();
    assert_eq!(active.load(Ordering::SeqCst), 2);
    assert_eq!(stream.worker_count(), 2);

    drop(stream);
    assert_drains_to_zero(&active).await;
}
