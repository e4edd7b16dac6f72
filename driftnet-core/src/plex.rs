//! Plex library lookup for the `plex` RPC method.
//!
//! Answers "is this media item already in the user's Plex library" by
//! querying the server's library for a TMDB guid.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::PlexConfig;
use crate::types::{MediaKind, TmdbId};

/// Errors from the Plex collaborator. All are terminal for the request that
/// triggered the lookup.
#[derive(Debug, Error)]
pub enum PlexError {
    /// No Plex server is configured for this deployment.
    #[error("no plex server configured")]
    NotConfigured,

    /// The server could not be reached.
    #[error("plex server unreachable: {reason}")]
    Unreachable {
        /// Transport failure detail
        reason: String,
    },

    /// The server answered with a non-success status.
    #[error("plex server responded {status}")]
    UpstreamStatus {
        /// HTTP status code
        status: u16,
    },

    /// The response body did not decode.
    #[error("plex decode error: {reason}")]
    Decode {
        /// Decoder failure detail
        reason: String,
    },
}

/// One library item matching a lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlexItem {
    #[serde(rename = "ratingKey")]
    pub rating_key: String,
    pub title: String,
    #[serde(rename = "type", default)]
    pub item_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaContainer {
    #[serde(rename = "Metadata", default)]
    metadata: Vec<PlexItem>,
}

#[derive(Debug, Deserialize)]
struct PlexResponse {
    #[serde(rename = "MediaContainer")]
    container: MediaContainer,
}

/// Client for one Plex media server.
#[derive(Debug, Clone)]
pub struct PlexClient {
    http: reqwest::Client,
    server: String,
    token: String,
}

impl PlexClient {
    /// Creates a client when a server and token are configured.
    pub fn from_config(http: reqwest::Client, config: &PlexConfig) -> Option<Self> {
        match (&config.server, &config.token) {
            (Some(server), Some(token)) => Some(Self {
                http,
                server: server.trim_end_matches('/').to_string(),
                token: token.clone(),
            }),
            _ => None,
        }
    }

    /// Finds library items carrying the given TMDB guid.
    ///
    /// # Errors
    /// - `PlexError::Unreachable` - Server not reachable
    /// - `PlexError::UpstreamStatus` - Non-success response
    /// - `PlexError::Decode` - Unexpected body shape
    pub async fn find(&self, tmdb_id: TmdbId, kind: MediaKind) -> Result<Vec<PlexItem>, PlexError> {
        let guid = format!("tmdb://{tmdb_id}");
        let url = format!("{}/library/all", self.server);
        let response = self
            .http
            .get(&url)
            .query(&[("guid", guid.as_str()), ("X-Plex-Token", &self.token)])
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| PlexError::Unreachable {
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(PlexError::UpstreamStatus {
                status: response.status().as_u16(),
            });
        }

        let body: PlexResponse = response.json().await.map_err(|e| PlexError::Decode {
            reason: e.to_string(),
        })?;

        let wanted = match kind {
            MediaKind::Movie => "movie",
            MediaKind::Series => "show",
        };
        Ok(body
            .container
            .metadata
            .into_iter()
            .filter(|item| item.item_type.as_deref().is_none_or(|t| t == wanted))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn test_find_filters_by_kind() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/library/all"))
            .and(query_param("guid", "tmdb://42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "MediaContainer": {"Metadata": [
                    {"ratingKey": "1", "title": "A Movie", "type": "movie"},
                    {"ratingKey": "2", "title": "A Show", "type": "show"},
                ]}
            })))
            .mount(&server)
            .await;

        let plex = PlexClient::from_config(
            reqwest::Client::new(),
            &PlexConfig {
                server: Some(server.uri()),
                token: Some("t".to_string()),
            },
        )
        .unwrap();

        let items = plex.find(TmdbId(42), MediaKind::Movie).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "A Movie");
    }

    #[test]
    fn test_unconfigured_server_yields_no_client() {
        assert!(PlexClient::from_config(reqwest::Client::new(), &PlexConfig::default()).is_none());
    }
}
