use std::{path::PathBuf, time::Duration};

use clap::{Parser, Subcommand};
use log::{info, warn};
use travelbot_logic::{
    CompanionSettings, Coordinate, GeocodingProvider, LocationFix, LocationPipeline, PoiProvider,
    RoutingProvider, with_timeout,
};
use travelbot_providers::{Nominatim, OpenRouteService, Overpass};
use travelbot_test_shared::{
    JsonLinesSender, PlainTemplates, ScriptedRoute, ScriptedWorld, TrackFile, load_settings,
    prelude::*, replay_back_to_back, replay_realtime,
};

#[derive(Parser)]
/// Drive the travel companion with recorded tracks
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a track file and print every event as a line of JSON
    Replay {
        /// Path to the track file
        track: PathBuf,
        /// Settings JSON, takes precedence over the track's own settings
        #[arg(long)]
        settings: Option<PathBuf>,
        /// Override the random seed
        #[arg(long)]
        seed: Option<u32>,
        /// Sleep between fixes as long as the recording did
        #[arg(long)]
        realtime: bool,
        /// Use the real routing, geocoding and POI services instead of the track's
        #[arg(long)]
        live: bool,
    },
    /// Ask OpenRouteService for a route and print it
    Route {
        /// Start as "lat,lon"
        #[arg(value_parser = parse_coordinate)]
        from: Coordinate,
        /// Destination as "lat,lon"
        #[arg(value_parser = parse_coordinate)]
        to: Coordinate,
    },
}

fn parse_coordinate(raw: &str) -> Result<Coordinate, String> {
    let (lat, lon) = raw
        .split_once(',')
        .ok_or_else(|| "Expected \"lat,lon\"".to_string())?;
    let parse = |s: &str| s.trim().parse::<f64>().map_err(|e| e.to_string());
    let coord = Coordinate::new(parse(lat)?, parse(lon)?);
    if coord.is_valid() {
        Ok(coord)
    } else {
        Err(format!("{raw} is not on this planet"))
    }
}

async fn run<R: RoutingProvider, G: GeocodingProvider, P: PoiProvider>(
    settings: CompanionSettings,
    track: &TrackFile,
    fixes: &[LocationFix],
    providers: (R, G, P),
    realtime: bool,
) -> Result {
    let (routing, geocoder, pois) = providers;
    let settle = settings.provider_timeout() * 2;

    let pipeline = LocationPipeline::new(
        settings,
        routing,
        geocoder,
        pois,
        Box::new(PlainTemplates),
        JsonLinesSender,
    );

    if let Some(destination) = track.destination {
        let origin = fixes.first().map(LocationFix::coordinate);
        match pipeline.start_navigation(origin, destination).await {
            Ok(summary) => info!(
                "Guiding along {} steps, {:.0}m",
                summary.steps, summary.distance_m
            ),
            Err(why) => warn!("Continuing without navigation: {why}"),
        }
    }

    let feed = async {
        if realtime {
            replay_realtime(&pipeline, fixes, settle).await
        } else {
            replay_back_to_back(&pipeline, fixes).await;
            Ok(())
        }
    };

    tokio::select! {
        res = feed => res,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
            pipeline.stop_navigation().await;
            pipeline.stop_tracking();
            Ok(())
        }
    }
}

async fn replay(
    path: PathBuf,
    settings_path: Option<PathBuf>,
    seed: Option<u32>,
    realtime: bool,
    live: bool,
) -> Result {
    let track = TrackFile::load(&path)?;
    let fixes = track.location_fixes()?;

    let mut settings = match settings_path {
        Some(path) => load_settings(&path)?,
        None => track.settings.clone().unwrap_or_default(),
    };
    if let Some(seed) = seed {
        settings.random_seed = seed;
    }

    info!(
        "Replaying {} fixes from {} (seed {})",
        fixes.len(),
        path.display(),
        settings.random_seed
    );

    if live {
        let providers = (OpenRouteService::from_env()?, Nominatim::new()?, Overpass::new()?);
        run(settings, &track, &fixes, providers, realtime).await
    } else {
        let providers = (
            ScriptedRoute(track.route.clone()),
            ScriptedWorld::new(track.places.clone()),
            ScriptedWorld::new(track.places.clone()),
        );
        run(settings, &track, &fixes, providers, realtime).await
    }
}

async fn route(from: Coordinate, to: Coordinate) -> Result {
    let ors = OpenRouteService::from_env()?;
    let route = with_timeout(Duration::from_secs(30), ors.route(from, to))
        .await
        .context("Failed to get route")?;
    let out = serde_json::to_string_pretty(&route).context("Failed to serialize route")?;
    println!("{out}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result {
    colog::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            track,
            settings,
            seed,
            realtime,
            live,
        } => replay(track, settings, seed, realtime, live).await,
        Commands::Route { from, to } => route(from, to).await,
    }
}
