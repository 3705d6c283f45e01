use std::collections::HashMap;

use clap::Parser;
use foliage_router::{CoreError, Position, RoutingEngine};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(author, version, about = "Shortest-route queries over an OpenStreetMap XML extract")]
struct Args {
    /// Path to the OSM XML document to load
    #[arg(long)]
    document: std::path::PathBuf,

    /// Start latitude
    #[arg(long)]
    start_lat: f64,
    /// Start longitude
    #[arg(long)]
    start_lon: f64,

    /// Goal latitude
    #[arg(long)]
    goal_lat: f64,
    /// Goal longitude
    #[arg(long)]
    goal_lon: f64,

    /// Routing preference as `key=value`; may be repeated
    #[arg(long = "pref", value_parser = parse_preference)]
    preferences: Vec<(String, String)>,
}

fn parse_preference(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))
}

fn main() -> Result<(), CoreError> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "foliage_router=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let engine = RoutingEngine::new();
    let bounds = engine.load(&args.document)?;
    tracing::info!(min = ?bounds.min, max = ?bounds.max, "document loaded");

    let preferences: HashMap<String, String> = args.preferences.into_iter().collect();
    let path = engine.query(
        Position::new(args.start_lat, args.start_lon),
        Position::new(args.goal_lat, args.goal_lon),
        &preferences,
    )?;

    if path.is_empty() {
        tracing::warn!("no route found");
    } else {
        for position in &path {
            println!("{},{}", position.lat, position.lon);
        }
    }

    Ok(())
}
