use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "terranova")]
#[command(about = "Log wildlife sightings and aggregate them into verified hotspots")]
#[command(version = "1.0")]
pub(crate) struct Args {
    /// Sightings ledger CSV
    #[arg(long, env = "TERRANOVA_SIGHTINGS", default_value = "sightings.csv", global = true)]
    pub sightings: PathBuf,

    /// Derived hotspot table CSV
    #[arg(long, env = "TERRANOVA_HOTSPOTS", default_value = "final_hotspots.csv", global = true)]
    pub hotspots: PathBuf,

    /// Users CSV with username,password columns
    #[arg(long, env = "TERRANOVA_USERS", default_value = "users.csv", global = true)]
    pub users: PathBuf,

    /// Minimum sightings per species and grid cell for a verified hotspot
    #[arg(short, long, default_value = "3", global = true)]
    pub threshold: u64,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(ClapArgs)]
pub(crate) struct Credentials {
    #[arg(short, long, env = "TERRANOVA_USER")]
    pub username: String,

    #[arg(short, long, env = "TERRANOVA_PASSWORD")]
    pub password: String,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Record one sighting and refresh the hotspot table
    Log {
        #[command(flatten)]
        credentials: Credentials,

        /// Species common name
        #[arg(short, long)]
        species: String,

        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Observation date (dd/mm/yyyy), defaults to today
        #[arg(long)]
        date: Option<String>,

        /// Observation time (HH:MM:SS), defaults to now
        #[arg(long)]
        time: Option<String>,

        /// Classifier confidence in percent; below 50 the sighting is not logged
        #[arg(short, long)]
        confidence: Option<f64>,
    },

    /// Rebuild the hotspot table from the full ledger
    Recompute,

    /// Print the hotspot table with marker styles
    Hotspots,

    /// Find the nearest hotspot to a position
    Nearest {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },

    /// Append a CSV batch of sightings, then recompute once
    Import {
        #[command(flatten)]
        credentials: Credentials,

        /// CSV with date_observed,time_observed,latitude,longitude,common_name
        file: PathBuf,

        /// Maximum number of concurrent appends
        #[arg(short, long, default_value = "5")]
        concurrent: usize,
    },
}
