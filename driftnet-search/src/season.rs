//! Season/episode marker parsing and whole-season result grouping.

use std::collections::BTreeMap;

use driftnet_core::metadata::SeasonEpisode;
use regex::Regex;

use crate::types::Torrent;

/// Marker string for a search query: `S01E04`, or `S01` for a whole season.
pub fn format_marker(season: u32, episode: Option<u32>) -> String {
    match episode {
        Some(episode) => format!("S{season:02}E{episode:02}"),
        None => format!("S{season:02}"),
    }
}

/// Season/episode locator extracted from a release title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker {
    pub season: u32,
    pub episode: Option<u32>,
}

/// Pulls the `SxxEyy` (or bare `Sxx`) marker out of a release title.
pub fn extract_marker(title: &str) -> Option<Marker> {
    let full = Regex::new(r"S(\d{2})E(\d{2})").unwrap();
    if let Some(captures) = full.captures(title) {
        return Some(Marker {
            season: captures[1].parse().ok()?,
            episode: Some(captures[2].parse().ok()?),
        });
    }

    let partial = Regex::new(r"S(\d{2})").unwrap();
    partial.captures(title).map(|captures| Marker {
        season: captures[1].parse().unwrap_or(0),
        episode: None,
    })
}

/// Collapses a release title to its episode-independent shape: the full
/// marker becomes `S00E00` and the episode's name tokens become `TITLE`, so
/// releases of different episodes from the same group compare equal.
///
/// Titles carrying only a season marker (packs) pass through unchanged;
/// titles with no marker at all yield `None`.
pub fn normalise(episodes: &[SeasonEpisode], title: &str) -> Option<String> {
    let full = Regex::new(r"(S(\d{2})E(\d{2}))").unwrap();
    let Some(captures) = full.captures(title) else {
        let season_only = Regex::new(r"\WS\d{2}\W").unwrap();
        if season_only.is_match(title) {
            return Some(title.to_string());
        }
        tracing::debug!(title, "unable to find marker in title");
        return None;
    };

    let marker = captures[1].to_string();
    let number: usize = captures[3].parse().ok()?;
    let episode = episodes.get(number.checked_sub(1)?)?;

    let tokens: Vec<&str> = episode
        .name
        .split(|c: char| c.is_ascii_punctuation() || c == ' ')
        .filter(|token| !token.is_empty())
        .collect();
    let dotted = tokens.join(".");

    let name_re = Regex::new(&format!("(?i){}", regex::escape(&dotted))).ok()?;
    let title = name_re.replace(title, "TITLE");

    Some(title.replace(&marker, "S00E00"))
}

/// A whole-season result list split for presentation: season packs first,
/// then per-episode groups.
#[derive(Debug, Clone)]
pub struct SeasonSelection {
    /// Season packs, best seeded first
    pub packs: Vec<Torrent>,
    /// Per-episode results grouped by normalised title
    pub episodes: BTreeMap<String, Vec<Torrent>>,
    /// True when every episode of the season has at least one result
    pub complete: bool,
}

/// Splits a whole-season search's results into packs and per-episode groups.
pub fn partition_packs(results: Vec<Torrent>, episodes: &[SeasonEpisode]) -> SeasonSelection {
    let mut packs = Vec::new();
    let mut grouped: BTreeMap<String, Vec<Torrent>> = BTreeMap::new();
    let mut covered = std::collections::BTreeSet::new();

    for result in results {
        match extract_marker(&result.title) {
            Some(Marker { episode: None, .. }) => packs.push(result),
            Some(Marker {
                episode: Some(number),
                ..
            }) => {
                let Some(key) = normalise(episodes, &result.title) else {
                    continue;
                };
                covered.insert(number);
                grouped.entry(key).or_default().push(result);
            }
            None => {
                tracing::debug!(title = %result.title, "dropping unmarked season result");
            }
        }
    }

    packs.sort_by_key(|torrent| std::cmp::Reverse(torrent.seeders));
    let complete = !episodes.is_empty() && covered.len() == episodes.len();

    SeasonSelection {
        packs,
        episodes: grouped,
        complete,
    }
}

#[cfg(test)]
mod tests {
    use crate::types::{EpisodeInfo, ProviderSource};

    use super::*;

    fn chernobyl_episodes() -> Vec<SeasonEpisode> {
        [
            "1:23:45",
            "Please Remain Calm",
            "Open Wide, O Earth",
            "The Happiness of All Mankind",
            "Vichnaya Pamyat",
        ]
        .iter()
        .enumerate()
        .map(|(i, name)| SeasonEpisode {
            episode_number: i as u32 + 1,
            name: (*name).to_string(),
            air_date: None,
        })
        .collect()
    }

    #[test]
    fn test_format_marker() {
        assert_eq!(format_marker(1, Some(4)), "S01E04");
        assert_eq!(format_marker(1, None), "S01");
    }

    #[test]
    fn test_extract_marker_full_and_partial() {
        assert_eq!(
            extract_marker("Chernobyl.S01E04.1080p"),
            Some(Marker {
                season: 1,
                episode: Some(4)
            })
        );
        assert_eq!(
            extract_marker("Chernobyl.S01.1080p"),
            Some(Marker {
                season: 1,
                episode: None
            })
        );
        assert_eq!(extract_marker("Chernobyl.1080p"), None);
    }

    #[test]
    fn test_normalise_replaces_marker_and_episode_name() {
        let title =
            "Chernobyl.S01E04.The.Happiness.of.All.Mankind.1080p.AMZN.WEB-DL.DDP5.1.H.264-NTb";
        assert_eq!(
            normalise(&chernobyl_episodes(), title).unwrap(),
            "Chernobyl.S00E00.TITLE.1080p.AMZN.WEB-DL.DDP5.1.H.264-NTb"
        );
    }

    #[test]
    fn test_normalise_passes_packs_through() {
        let title = "Chernobyl S01 1080p BluRay x264";
        assert_eq!(
            normalise(&chernobyl_episodes(), title).unwrap(),
            title.to_string()
        );
    }

    #[test]
    fn test_normalise_rejects_unmarked_titles() {
        assert_eq!(normalise(&chernobyl_episodes(), "Chernobyl 1080p"), None);
    }

    fn result(title: &str, seeders: u32) -> Torrent {
        Torrent {
            source: ProviderSource::Rarbg,
            title: title.to_string(),
            seeders,
            download: "magnet:?xt=urn:btih:0".to_string(),
            category: "TV HD Episodes".to_string(),
            episode_info: EpisodeInfo::tv(1, None),
        }
    }

    #[test]
    fn test_partition_packs_orders_and_groups() {
        let episodes = &chernobyl_episodes()[..2];
        let selection = partition_packs(
            vec![
                result("Chernobyl.S01.1080p.WEB-DL-A", 5),
                result("Chernobyl.S01.720p.WEB-DL-B", 9),
                result("Chernobyl.S01E01.1.23.45.1080p-NTb", 3),
                result("Chernobyl.S01E02.Please.Remain.Calm.1080p-NTb", 2),
            ],
            episodes,
        );

        assert_eq!(selection.packs.len(), 2);
        assert_eq!(selection.packs[0].seeders, 9, "packs sorted by seeders");
        assert_eq!(selection.episodes.len(), 1, "same group after normalise");
        assert!(selection.complete);
    }

    #[test]
    fn test_partition_incomplete_season() {
        let episodes = chernobyl_episodes();
        let selection = partition_packs(
            vec![result("Chernobyl.S01E01.1.23.45.1080p-NTb", 3)],
            &episodes,
        );
        assert!(!selection.complete);
    }
}
