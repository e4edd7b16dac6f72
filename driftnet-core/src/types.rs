//! Typed identifiers shared across the workspace.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The Movie Database identifier, used internally to key all lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TmdbId(pub u32);

impl fmt::Display for TmdbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when a string does not look like an IMDB identifier.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid imdb id: {value:?}")]
pub struct InvalidImdbId {
    /// The rejected input.
    pub value: String,
}

/// Internet Movie Database identifier, always of the form `tt` followed by
/// digits. Certain providers key their search APIs on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImdbId(String);

impl ImdbId {
    /// Validates and wraps an IMDB identifier string.
    ///
    /// # Errors
    /// - `InvalidImdbId` - Input does not match `tt` + digits
    pub fn new(value: impl Into<String>) -> Result<Self, InvalidImdbId> {
        let value = value.into();
        let digits = value.strip_prefix("tt");
        match digits {
            Some(rest) if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) => {
                Ok(Self(value))
            }
            _ => Err(InvalidImdbId { value }),
        }
    }

    /// Full identifier including the `tt` prefix.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The numeric suffix without the `tt` prefix, as some upstreams want it.
    pub fn digits(&self) -> &str {
        &self.0[2..]
    }
}

impl fmt::Display for ImdbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ImdbId {
    type Error = InvalidImdbId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ImdbId> for String {
    fn from(id: ImdbId) -> Self {
        id.0
    }
}

/// Media kind discriminant used by search requests and identity resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    #[serde(alias = "tv")]
    Series,
}

impl MediaKind {
    /// TMDB path segment for this kind.
    pub fn tmdb_segment(self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Series => "tv",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_imdb_id_accepts_valid() {
        let id = ImdbId::new("tt0436992").unwrap();
        assert_eq!(id.as_str(), "tt0436992");
        assert_eq!(id.digits(), "0436992");
    }

    #[test]
    fn test_imdb_id_rejects_garbage() {
        assert!(ImdbId::new("").is_err());
        assert!(ImdbId::new("tt").is_err());
        assert!(ImdbId::new("0436992").is_err());
        assert!(ImdbId::new("ttx123").is_err());
    }

    #[test]
    fn test_imdb_id_serde_round_trip() {
        let id: ImdbId = serde_json::from_str("\"tt28454008\"").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"tt28454008\"");
        assert!(serde_json::from_str::<ImdbId>("\"bogus\"").is_err());
    }

    #[test]
    fn test_media_kind_serde() {
        assert_eq!(
            serde_json::from_str::<MediaKind>("\"series\"").unwrap(),
            MediaKind::Series
        );
        assert_eq!(
            serde_json::from_str::<MediaKind>("\"tv\"").unwrap(),
            MediaKind::Series
        );
        assert_eq!(
            serde_json::from_str::<MediaKind>("\"movie\"").unwrap(),
            MediaKind::Movie
        );
    }
}
