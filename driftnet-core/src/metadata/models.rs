//! Response bodies from the TMDB v3 API, reduced to the fields Driftnet reads.

use serde::{Deserialize, Serialize};

/// `movie/{id}` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovieDetails {
    pub title: String,
}

/// `tv/{id}` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TvDetails {
    pub name: String,
    #[serde(default)]
    pub number_of_seasons: u32,
}

/// `tv/{id}/season/{n}` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TvSeason {
    pub episodes: Vec<SeasonEpisode>,
}

/// One episode from a season listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonEpisode {
    pub episode_number: u32,
    pub name: String,
    #[serde(default)]
    pub air_date: Option<String>,
}

/// `{kind}/{id}/external_ids` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalIds {
    #[serde(default)]
    pub imdb_id: Option<String>,
}
