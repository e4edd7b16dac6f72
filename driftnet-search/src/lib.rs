//! Driftnet Search - Concurrent provider fan-out
//!
//! Queries several independent torrent upstreams concurrently, normalizes
//! their results, and merges them into one arrival-ordered stream with
//! per-provider failure isolation.

pub mod aliases;
pub mod errors;
pub mod fanout;
pub mod providers;
pub mod season;
pub mod types;

pub use errors::SearchError;
pub use fanout::{SearchStream, search_for_movie, search_for_tv};
pub use providers::{MovieProvider, Provider, ProviderRegistry, TorrentStream, TvProvider};
pub use types::{EpisodeInfo, ProviderSource, Torrent};

/// Convenience alias for Results with SearchError.
pub type Result<T> = std::result::Result<T, SearchError>;
