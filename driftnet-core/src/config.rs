//! Centralized configuration for Driftnet.
//!
//! All tunable parameters live here instead of being scattered through the
//! codebase. Upstream base URLs are configuration so integration tests can
//! point a provider at a local mock server.

use std::time::Duration;

/// Central configuration for all Driftnet components.
#[derive(Debug, Clone, Default)]
pub struct DriftnetConfig {
    pub network: NetworkConfig,
    pub tmdb: TmdbConfig,
    pub auth: AuthConfig,
    pub plex: PlexConfig,
    pub upstreams: UpstreamConfig,
    pub cache: CacheConfig,
}

impl DriftnetConfig {
    /// Default configuration with secrets and endpoints overridden from the
    /// environment: `TMDB_API_KEY`, `AUTH_USERINFO_URL`, `PLEX_SERVER`,
    /// `PLEX_TOKEN`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(key) = std::env::var("TMDB_API_KEY") {
            config.tmdb.api_key = key;
        }
        if let Ok(url) = std::env::var("AUTH_USERINFO_URL") {
            config.auth.userinfo_url = url;
        }
        config.plex.server = std::env::var("PLEX_SERVER").ok();
        config.plex.token = std::env::var("PLEX_TOKEN").ok();
        config
    }
}

/// HTTP client behavior shared by every upstream call.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// User agent sent with upstream requests
    pub user_agent: &'static str,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            user_agent: "driftnet/0.1 (+https://github.com/driftnet-org/driftnet)",
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// TMDB identity-resolution and episode-metadata collaborator.
#[derive(Debug, Clone)]
pub struct TmdbConfig {
    pub base_url: String,
    pub api_key: String,
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.themoviedb.org/3".to_string(),
            api_key: String::new(),
        }
    }
}

/// Bearer-token validation collaborator.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// OIDC userinfo endpoint the session handler validates tokens against
    pub userinfo_url: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            userinfo_url: "https://driftnet.au.auth0.com/userinfo".to_string(),
        }
    }
}

/// Optional Plex server used by the `plex` RPC method.
#[derive(Debug, Clone, Default)]
pub struct PlexConfig {
    pub server: Option<String>,
    pub token: Option<String>,
}

/// Base URLs of the torrent upstreams, one per provider.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub kickass: String,
    pub rarbg: String,
    pub piratebay: String,
    pub nyaa: String,
    pub horriblesubs: String,
    pub torrents_csv: String,
    pub jikan: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            kickass: "https://katcr.co".to_string(),
            rarbg: "https://torrentapi.org".to_string(),
            piratebay: "https://apibay.org".to_string(),
            nyaa: "https://nyaa.si".to_string(),
            horriblesubs: "https://horriblesubs.info".to_string(),
            torrents_csv: "https://torrents-csv.com".to_string(),
            jikan: "https://api.jikan.moe/v4".to_string(),
        }
    }
}

/// Sizing for the collaborator lookup caches.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub capacity: usize,
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            ttl: Duration::from_secs(600),
        }
    }
}
