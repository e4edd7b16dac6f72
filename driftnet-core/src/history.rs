//! Download-history records and season-pack resolution.
//!
//! The records themselves belong to the external persistence service; this
//! module holds the read-side DTOs plus the presentation-time expansion of a
//! "whole season" download into per-episode entries. Nothing here writes
//! back to the persistence service.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::User;
use crate::metadata::{MetadataError, TmdbClient};
use crate::types::{ImdbId, TmdbId};

/// Sentinel id carried by synthetic records produced by season-pack
/// resolution; never a valid persistence id.
pub const PLACEHOLDER_ID: i64 = -1;

/// What a download record refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadKind {
    Movie,
    Episode,
}

/// A download a user initiated, as recorded by the persistence service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Download {
    pub id: i64,
    pub tmdb_id: TmdbId,
    pub transmission_id: String,
    pub imdb_id: Option<ImdbId>,
    pub kind: DownloadKind,
    pub title: String,
    pub timestamp: DateTime<Utc>,
    pub added_by: Option<User>,
}

/// One persisted episode download. `episode` is absent for season packs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeDetails {
    pub id: i64,
    pub download: Download,
    pub show_title: String,
    pub season: u32,
    pub episode: Option<u32>,
}

impl EpisodeDetails {
    /// True when this record stands for a whole season rather than one episode.
    pub fn is_season_pack(&self) -> bool {
        self.episode.is_none()
    }
}

/// Expands a single season-pack record into per-episode entries.
///
/// Applies only when the season's records are exactly one pack; anything
/// else is already per-episode and passes through unchanged. Synthetic
/// entries carry [`PLACEHOLDER_ID`], the episode's name as download title,
/// and a `transmission_id` suffixed with the episode number so each row
/// remains addressable.
///
/// # Errors
/// - `MetadataError` - The episode listing could not be fetched
pub async fn resolve_season(
    episodes: Vec<EpisodeDetails>,
    tmdb: &TmdbClient,
) -> Result<Vec<EpisodeDetails>, MetadataError> {
    if !(episodes.len() == 1 && episodes[0].is_season_pack()) {
        return Ok(episodes);
    }

    let pack = &episodes[0];
    let download = &pack.download;
    let season = tmdb.get_tv_season(download.tmdb_id, pack.season).await?;

    Ok(season
        .episodes
        .into_iter()
        .map(|episode| EpisodeDetails {
            id: PLACEHOLDER_ID,
            download: Download {
                id: PLACEHOLDER_ID,
                tmdb_id: download.tmdb_id,
                transmission_id: format!(
                    "{}.{}",
                    download.transmission_id, episode.episode_number
                ),
                imdb_id: download.imdb_id.clone(),
                kind: DownloadKind::Episode,
                title: episode.name,
                timestamp: download.timestamp,
                added_by: download.added_by.clone(),
            },
            show_title: pack.show_title.clone(),
            season: pack.season,
            episode: Some(episode.episode_number),
        })
        .collect())
}

/// Groups a show's records by season and resolves each season's packs.
///
/// Within a season, packs sort ahead of numbered episodes so the single-pack
/// case is stable regardless of input order.
///
/// # Errors
/// - `MetadataError` - An episode listing could not be fetched
pub async fn resolve_show(
    records: Vec<EpisodeDetails>,
    tmdb: &TmdbClient,
) -> Result<BTreeMap<u32, Vec<EpisodeDetails>>, MetadataError> {
    let mut seasons: BTreeMap<u32, Vec<EpisodeDetails>> = BTreeMap::new();
    for record in records {
        seasons.entry(record.season).or_default().push(record);
    }

    let mut resolved = BTreeMap::new();
    for (number, mut season) in seasons {
        season.sort_by_key(|record| record.episode);
        resolved.insert(number, resolve_season(season, tmdb).await?);
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pack(season: u32) -> EpisodeDetails {
        EpisodeDetails {
            id: 10,
            download: Download {
                id: 20,
                tmdb_id: TmdbId(87108),
                transmission_id: "hash1234".to_string(),
                imdb_id: Some(ImdbId::new("tt7366338").unwrap()),
                kind: DownloadKind::Episode,
                title: "Chernobyl Season 1".to_string(),
                timestamp: Utc::now(),
                added_by: None,
            },
            show_title: "Chernobyl".to_string(),
            season,
            episode: None,
        }
    }

    #[test]
    fn test_is_season_pack() {
        assert!(pack(1).is_season_pack());

        let mut episode = pack(1);
        episode.episode = Some(3);
        assert!(!episode.is_season_pack());
    }
}
