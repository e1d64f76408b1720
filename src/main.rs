mod aggregate;
mod auth;
mod error;
mod fieldlog;
mod grid;
mod identify;
mod nearest;
mod parse;
mod record;
mod species;
mod store;
mod util;

use crate::aggregate::{HotspotAggregator, RecomputeStatus, load_hotspots};
use crate::auth::Session;
use crate::fieldlog::{FieldLog, read_batch};
use crate::identify::{Candidate, Identification, identify};
use crate::nearest::{HabitatStatus, assess};
use crate::parse::{Args, Command, Credentials};
use crate::record::{Hotspot, NewSighting};
use crate::species::{MARKER_RADIUS, marker_style};
use crate::store::SightingStore;
use crate::util::print_hms;
use chrono::Local;
use clap::Parser;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, PartialEq)]
pub struct Summary {
    pub hotspots: usize,
    pub species: usize,
    pub sightings: u64,
    /// Species by verified sightings, most first, ties by name.
    pub top_species: Vec<(String, u64)>,
}

pub fn summarize(hotspots: &[Hotspot]) -> Summary {
    let mut species_counts: HashMap<&str, u64> = HashMap::new();
    for hotspot in hotspots {
        *species_counts.entry(hotspot.common_name.as_str()).or_insert(0) += hotspot.sighting_count;
    }

    let mut sorted_species: Vec<_> = species_counts
        .into_iter()
        .map(|(name, count)| (name.to_string(), count))
        .collect();
    sorted_species.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    Summary {
        hotspots: hotspots.len(),
        species: sorted_species.len(),
        sightings: sorted_species.iter().map(|(_, count)| count).sum(),
        top_species: sorted_species,
    }
}

pub fn print_summary(hotspots: &[Hotspot]) {
    if hotspots.is_empty() {
        println!("No verified hotspots yet");
        return;
    }

    let summary = summarize(hotspots);
    println!("\nSummary:");
    println!("Verified hotspots: {}", summary.hotspots);
    println!("Unique species: {}", summary.species);
    println!("Verified sightings: {}", summary.sightings);

    println!("Top species:");
    for (name, count) in summary.top_species.iter().take(3) {
        println!("  {}: {}", name, count);
    }
}

fn print_hotspots(hotspots: &[Hotspot]) {
    for hotspot in hotspots {
        let style = marker_style(&hotspot.common_name);
        println!(
            "{:<28} ({:.3}, {:.3})  {:>4} sightings  [{} {}, r={}]",
            hotspot.common_name,
            hotspot.lat,
            hotspot.lon,
            hotspot.sighting_count,
            style.icon,
            style.color,
            MARKER_RADIUS
        );
    }
}

fn report_status(status: RecomputeStatus) {
    match status {
        RecomputeStatus::Updated { hotspots } => {
            println!("Map updated! ({} verified locations)", hotspots)
        }
        RecomputeStatus::NoData => println!("Data saved, but map update skipped (no data yet)."),
    }
}

fn login(users: &Path, credentials: &Credentials) -> Result<Session, Box<dyn std::error::Error>> {
    let session = Session::login(users, &credentials.username, &credentials.password);
    if session.user().is_none() {
        return Err("Invalid credentials.".into());
    }
    Ok(session)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::try_parse()?;
    // Initialize logger
    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let store = SightingStore::new(&args.sightings);
    let aggregator = HotspotAggregator::new(&args.hotspots).with_threshold(args.threshold);
    let field_log = Arc::new(FieldLog::new(store, aggregator));

    match args.command {
        Command::Log {
            credentials,
            species,
            lat,
            lon,
            date,
            time,
            confidence,
        } => {
            let session = login(&args.users, &credentials)?;

            if let Some(confidence) = confidence {
                let candidates = [Candidate {
                    name: species.clone(),
                    confidence,
                }];
                match identify(&candidates) {
                    Identification::Confirmed(top) => {
                        println!("Identified: {} ({:.1}%)", top.name, top.confidence)
                    }
                    Identification::BestGuess(top) => {
                        println!("Unsure. Best guess: {}", top.name);
                        return Ok(());
                    }
                    Identification::Nothing => return Ok(()),
                }
            }

            let now = Local::now();
            let new = NewSighting {
                date_observed: date.unwrap_or_else(|| now.format("%d/%m/%Y").to_string()),
                time_observed: time.unwrap_or_else(|| now.format("%H:%M:%S").to_string()),
                latitude: lat,
                longitude: lon,
                common_name: species,
            };

            let submission = field_log.submit(&session, new)?;
            println!("Saved sighting #{}", submission.sighting.id);
            report_status(submission.status);
        }
        Command::Recompute => {
            let start = Instant::now();
            let status = field_log.recompute()?;
            print_hms(&start);
            report_status(status);
        }
        Command::Hotspots => {
            let hotspots = load_hotspots(field_log.aggregator().hotspots_path());
            print_hotspots(&hotspots);
            print_summary(&hotspots);
        }
        Command::Nearest { lat, lon } => {
            let hotspots = load_hotspots(field_log.aggregator().hotspots_path());
            match assess(&hotspots, lat, lon) {
                HabitatStatus::Verified {
                    common_name,
                    distance_m,
                } => {
                    println!("HABITAT VERIFIED ({:.0}m away)", distance_m);
                    println!("Confirmed historical data for {}.", common_name);
                }
                HabitatStatus::NewDiscovery { nearest_m } => {
                    println!("NEW DISCOVERY");
                    println!("You are mapping a new zone.");
                    if let Some(distance) = nearest_m {
                        println!("Nearest outpost: {}m", distance as u64);
                    }
                }
            }
        }
        Command::Import {
            credentials,
            file,
            concurrent,
        } => {
            let session = login(&args.users, &credentials)?;
            let rows = read_batch(&file)?;

            println!(
                "\nImporting {} sightings into {}...",
                rows.len(),
                field_log.store().path().display()
            );
            let start = Instant::now();
            let report = Arc::clone(&field_log)
                .import(&session, rows, concurrent)
                .await?;
            print_hms(&start);

            println!(
                "Appended {} sightings ({} failed)",
                report.appended.len(),
                report.failed
            );
            report_status(report.status);
        }
    }

    Ok(())
}
