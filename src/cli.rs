//! CLI interface for SpotNear.
//!
//! `spotnear run` hosts the search service in the foreground. Host actions
//! are typed (or piped) one per line on its stdin. The remaining commands
//! read or adjust the persisted state and exit.

mod host;
mod inspect;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::storage::Storage;

/// SpotNear: every so often, surface one interesting place near you.
#[derive(Debug, Parser)]
#[command(name = "spotnear", version, after_long_help = ACTIONS_HELP)]
pub struct Cli {
    /// Config file. Defaults to `~/.spotnear/config.toml`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// State directory. Defaults to `~/.spotnear`.
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

const ACTIONS_HELP: &str = r"Actions accepted on stdin by `spotnear run`:
  start-service                 begin searching
  stop-service                  stop and cancel any pending wake
  update-location               run a discovery cycle now
  search-notification-clicked   search again right away
  place-notification-clicked    dismiss the found place";

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the search service, reading actions from stdin until interrupted.
    Run {
        /// Send `start-service` as soon as the service is up.
        #[arg(long)]
        start: bool,
    },

    /// Show the persisted session state.
    Status,

    /// Show the search radius, or set it in meters.
    ///
    /// A new radius takes effect from the next discovery cycle.
    Radius {
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        meters: Option<u32>,
    },

    /// Show the last found place.
    Place {
        /// Forget the last found place instead.
        #[arg(long)]
        clear: bool,
    },

    /// Print the Overpass query for a point.
    Query {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Radius in meters. Defaults to the stored search radius.
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        radius: Option<u32>,

        /// Print the URL-encoded request instead of the raw query.
        #[arg(long)]
        encoded: bool,
    },
}

pub fn run() -> Result<(), String> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).map_err(|e| e.to_string())?;
    let storage = open_storage(cli.state, &config)?;

    match cli.command {
        Command::Run { start } => host::cmd_run(&config, storage, start),
        Command::Status => inspect::cmd_status(&storage),
        Command::Radius { meters } => inspect::cmd_radius(&storage, meters),
        Command::Place { clear } => inspect::cmd_place(&storage, clear),
        Command::Query {
            lat,
            lon,
            radius,
            encoded,
        } => inspect::cmd_query(&config, &storage, lat, lon, radius, encoded),
    }
}

fn open_storage(root: Option<PathBuf>, config: &Config) -> Result<Storage, String> {
    let root = root
        .or_else(Storage::default_root)
        .ok_or("could not determine home directory")?;
    Storage::new(root)
        .map(|storage| storage.with_default_radius(config.search_radius))
        .map_err(|e| format!("failed to initialize storage: {e}"))
}
