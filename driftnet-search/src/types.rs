//! Normalized search result types emitted by every provider.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of the upstream a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderSource {
    Kickass,
    Horriblesubs,
    Rarbg,
    TorrentsCsv,
    NyaaSi,
    Piratebay,
}

impl fmt::Display for ProviderSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProviderSource::Kickass => "KICKASS",
            ProviderSource::Horriblesubs => "HORRIBLESUBS",
            ProviderSource::Rarbg => "RARBG",
            ProviderSource::TorrentsCsv => "TORRENTS_CSV",
            ProviderSource::NyaaSi => "NYAA_SI",
            ProviderSource::Piratebay => "PIRATEBAY",
        };
        f.write_str(name)
    }
}

/// Episode locator carried by TV results; both fields absent for movies,
/// episode absent for whole-season packs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeInfo {
    pub seasonnum: Option<u32>,
    pub epnum: Option<u32>,
}

impl EpisodeInfo {
    /// Locator for a TV result.
    pub fn tv(season: u32, episode: Option<u32>) -> Self {
        Self {
            seasonnum: Some(season),
            epnum: episode,
        }
    }
}

/// One normalized result as emitted by a provider. Plain value; results are
/// never deduplicated across providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Torrent {
    pub source: ProviderSource,
    pub title: String,
    pub seeders: u32,
    pub download: String,
    pub category: String,
    #[serde(default)]
    pub episode_info: EpisodeInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_serializes_screaming() {
        assert_eq!(
            serde_json::to_string(&ProviderSource::NyaaSi).unwrap(),
            "\"NYAA_SI\""
        );
        assert_eq!(
            serde_json::to_string(&ProviderSource::TorrentsCsv).unwrap(),
            "\"TORRENTS_CSV\""
        );
    }

    #[test]
    fn test_torrent_wire_shape() {
        let torrent = Torrent {
            source: ProviderSource::Piratebay,
            title: "Ancient Aliens 480p x264-mSD".to_string(),
            seeders: 2,
            download: "magnet:?xt=urn:btih:00000000000000000".to_string(),
            category: "video - tv shows".to_string(),
            episode_info: EpisodeInfo::tv(1, Some(2)),
        };

        let value = serde_json::to_value(&torrent).unwrap();
        assert_eq!(value["source"], "PIRATEBAY");
        assert_eq!(value["episode_info"]["seasonnum"], 1);
        assert_eq!(value["episode_info"]["epnum"], 2);
    }
}
