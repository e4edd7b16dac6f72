//! TMDB collaborator: identity resolution and episode metadata.

mod client;
mod models;

pub use client::{MetadataError, TmdbClient};
pub use models::{ExternalIds, MovieDetails, SeasonEpisode, TvDetails, TvSeason};
