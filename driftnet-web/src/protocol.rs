//! Wire frames for the streaming channel.
//!
//! Inbound frames are a JSON-RPC-like envelope carrying a bearer credential
//! and a closed set of methods; adding a method means adding a variant and
//! the compiler forces every dispatch site to handle it. Outbound result
//! frames are the flat `Torrent` object itself; failures are JSON-RPC error
//! frames, and every close carries a human-readable reason.

use driftnet_core::types::{MediaKind, TmdbId};
use serde::{Deserialize, Serialize};

/// JSON-RPC error codes used on the wire.
pub mod codes {
    /// Envelope did not parse as a known request shape.
    pub const INVALID_REQUEST: i64 = -32600;
    /// Request parsed but its params are unusable.
    pub const INVALID_PARAMS: i64 = -32602;
    /// Unexpected server-side failure.
    pub const INTERNAL: i64 = -32603;
    /// Credential missing, invalid, or lacking scope.
    pub const UNAUTHORIZED: i64 = -32001;
    /// A hard upstream dependency failed.
    pub const UPSTREAM: i64 = -32002;
}

/// Close reasons observable by the client.
pub mod reasons {
    pub const FINISHED: &str = "Finished streaming";
    pub const PONG: &str = "Pong";
    pub const PLEX_COMPLETE: &str = "Plex complete";
    pub const VALIDATION: &str = "ValidationError";
    pub const AUTHENTICATION: &str = "AuthenticationError";
    pub const METADATA: &str = "MetadataError";
    pub const PLEX_FAILED: &str = "PlexError";
}

/// One inbound request frame.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    pub id: i64,
    /// Bearer credential; never logged.
    pub authorization: String,
    #[serde(flatten)]
    pub call: MethodCall,
}

/// The closed set of methods a client may invoke.
#[derive(Debug, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "lowercase")]
pub enum MethodCall {
    Stream(StreamParams),
    Ping,
    Plex(PlexParams),
}

/// Params of the `stream` method.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamParams {
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub tmdb_id: TmdbId,
    #[serde(default)]
    pub season: Option<u32>,
    #[serde(default)]
    pub episode: Option<u32>,
}

/// A validated `stream` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamRequest {
    Movie {
        tmdb_id: TmdbId,
    },
    Series {
        tmdb_id: TmdbId,
        season: u32,
        episode: Option<u32>,
    },
}

impl StreamParams {
    /// Checks the cross-field constraints a serde decode cannot express.
    ///
    /// # Errors
    /// Returns the list of field errors when the params are inconsistent.
    pub fn validate(&self) -> Result<StreamRequest, Vec<String>> {
        let mut errors = Vec::new();
        match self.kind {
            MediaKind::Movie => {
                if self.season.is_some() || self.episode.is_some() {
                    errors.push("movie requests take no season or episode".to_string());
                }
                if errors.is_empty() {
                    return Ok(StreamRequest::Movie {
                        tmdb_id: self.tmdb_id,
                    });
                }
            }
            MediaKind::Series => match self.season {
                Some(season) => {
                    return Ok(StreamRequest::Series {
                        tmdb_id: self.tmdb_id,
                        season,
                        episode: self.episode,
                    });
                }
                None => errors.push("series requests require a season".to_string()),
            },
        }
        Err(errors)
    }
}

/// Params of the `plex` method.
#[derive(Debug, Clone, Deserialize)]
pub struct PlexParams {
    pub tmdb_id: TmdbId,
    pub media_type: MediaKind,
}

/// Outbound error frame.
#[derive(Debug, Serialize)]
pub struct ErrorFrame {
    pub jsonrpc: &'static str,
    pub id: Option<i64>,
    pub error: ErrorBody,
}

/// Error payload of an [`ErrorFrame`].
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ErrorFrame {
    /// Error frame without structured data.
    pub fn new(id: Option<i64>, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            error: ErrorBody {
                code,
                message: message.into(),
                data: None,
            },
        }
    }

    /// Attaches structured data, e.g. a validation error list.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.error.data = Some(data);
        self
    }
}

/// Outbound success frame for single-shot methods.
#[derive(Debug, Serialize)]
pub struct ResultFrame<T: Serialize> {
    pub jsonrpc: &'static str,
    pub id: i64,
    pub result: T,
}

impl<T: Serialize> ResultFrame<T> {
    /// Wraps `result` for request `id`.
    pub fn new(id: i64, result: T) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_envelope_parses() {
        let envelope: Envelope = serde_json::from_str(
            r#"{
                "jsonrpc": "2.0", "id": 1, "authorization": "Bearer token",
                "method": "stream",
                "params": {"type": "series", "tmdb_id": 87108, "season": 1, "episode": 4}
            }"#,
        )
        .unwrap();

        match envelope.call {
            MethodCall::Stream(params) => {
                assert_eq!(
                    params.validate().unwrap(),
                    StreamRequest::Series {
                        tmdb_id: TmdbId(87108),
                        season: 1,
                        episode: Some(4),
                    }
                );
            }
            other => panic!("wrong method: {other:?}"),
        }
    }

    #[test]
    fn test_ping_envelope_with_null_params() {
        let envelope: Envelope = serde_json::from_str(
            r#"{"jsonrpc": "2.0", "id": 2, "authorization": "t", "method": "ping", "params": null}"#,
        )
        .unwrap();
        assert!(matches!(envelope.call, MethodCall::Ping));
    }

    #[test]
    fn test_unknown_method_rejected() {
        let result = serde_json::from_str::<Envelope>(
            r#"{"jsonrpc": "2.0", "id": 3, "authorization": "t", "method": "shrug", "params": {}}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_series_without_season_invalid() {
        let params = StreamParams {
            kind: MediaKind::Series,
            tmdb_id: TmdbId(1),
            season: None,
            episode: None,
        };
        let errors = params.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("season"));
    }

    #[test]
    fn test_error_frame_shape() {
        let frame = ErrorFrame::new(Some(7), codes::UNAUTHORIZED, "invalid bearer token");
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["error"]["code"], codes::UNAUTHORIZED);
        assert_eq!(value["id"], 7);
        assert!(value["error"].get("data").is_none());
    }
}
