//! Driftnet Core - Shared foundation for the Driftnet search aggregator
//!
//! Provides configuration, typed identifiers, TTL caching, and clients for
//! the external collaborators the aggregation core depends on: TMDB identity
//! resolution and episode metadata, bearer-token authentication, and Plex
//! library lookup.

pub mod auth;
pub mod cache;
pub mod config;
pub mod history;
pub mod metadata;
pub mod plex;
pub mod tracing_setup;
pub mod types;

pub use auth::{AuthError, Authenticator, OidcAuthenticator, User};
pub use cache::TtlCache;
pub use config::DriftnetConfig;
pub use history::{Download, DownloadKind, EpisodeDetails, resolve_season, resolve_show};
pub use metadata::{MetadataError, TmdbClient};
pub use plex::{PlexClient, PlexError};
pub use types::{ImdbId, InvalidImdbId, MediaKind, TmdbId};
