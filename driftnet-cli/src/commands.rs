//! CLI command implementations

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Subcommand;
use driftnet_core::types::{MediaKind, TmdbId};
use driftnet_core::{DriftnetConfig, TmdbClient};
use driftnet_search::providers::ProviderRegistry;
use driftnet_search::season::partition_packs;
use driftnet_search::{Torrent, fanout};
use futures::StreamExt;

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the streaming search server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
    /// Query every capable provider once, printing rows as they arrive
    Search {
        /// Canonical TMDB id of the media item
        tmdb_id: u32,
        /// Media kind
        #[arg(long = "type", value_enum, default_value = "movie")]
        kind: MediaKind,
        /// Season number (series only)
        #[arg(short, long)]
        season: Option<u32>,
        /// Episode number; omit for a whole-season query
        #[arg(short, long)]
        episode: Option<u32>,
    },
}

/// Handles the parsed CLI command.
///
/// # Errors
/// Returns the underlying failure of the command that ran.
pub async fn handle_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Serve { host, port } => serve(host, port).await,
        Commands::Search {
            tmdb_id,
            kind,
            season,
            episode,
        } => search(TmdbId(tmdb_id), kind, season, episode).await,
    }
}

async fn serve(host: String, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    let config = DriftnetConfig::from_env();

    println!("Driftnet streaming server");
    println!("  Channel:  ws://{addr}/ws");
    println!("  Health:   http://{addr}/health");

    driftnet_web::run_server(config, addr)
        .await
        .map_err(|e| anyhow::anyhow!("server failed: {e}"))
}

async fn search(
    tmdb_id: TmdbId,
    kind: MediaKind,
    season: Option<u32>,
    episode: Option<u32>,
) -> anyhow::Result<()> {
    let config = DriftnetConfig::from_env();
    let http = reqwest::Client::builder()
        .user_agent(config.network.user_agent)
        .timeout(config.network.request_timeout)
        .build()?;
    let tmdb = Arc::new(TmdbClient::new(http.clone(), &config.tmdb, &config.cache));
    let registry = ProviderRegistry::with_defaults(http, &config, tmdb.clone());

    let mut results = match kind {
        MediaKind::Movie => {
            let imdb_id = tmdb.movie_imdb_id(tmdb_id).await?;
            fanout::search_for_movie(registry.movie_providers(), imdb_id, tmdb_id)
        }
        MediaKind::Series => {
            let season = season.ok_or_else(|| anyhow::anyhow!("series searches need --season"))?;
            let imdb_id = tmdb.tv_imdb_id(tmdb_id).await?;
            fanout::search_for_tv(registry.tv_providers(), imdb_id, tmdb_id, season, episode)
        }
    };

    println!("{:<14} {:<60} {:>8}  {}", "Source", "Title", "Seeders", "Magnet");
    println!("{:-<96}", "");

    let mut collected: Vec<Torrent> = Vec::new();
    while let Some(row) = results.next().await {
        let mut title = row.title.clone();
        title.truncate(60);
        println!(
            "{:<14} {:<60} {:>8}  {}",
            row.source.to_string(),
            title,
            row.seeders,
            if row.download.is_empty() { "no" } else { "yes" },
        );
        collected.push(row);
    }
    println!("{} results", collected.len());

    // For a whole-season query, summarize packs versus per-episode coverage.
    if let (MediaKind::Series, Some(season), None) = (kind, season, episode) {
        let listing = tmdb.get_tv_season(tmdb_id, season).await?;
        let selection = partition_packs(collected, &listing.episodes);
        println!(
            "\nSeason {season}: {} packs, {} episode groups, coverage {}",
            selection.packs.len(),
            selection.episodes.len(),
            if selection.complete { "complete" } else { "incomplete" },
        );
    }

    Ok(())
}
