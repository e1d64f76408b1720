use crate::error::Result;
use crate::grid::{GridCell, snap};
use crate::record::{Hotspot, Sighting};
use crate::store::SightingStore;
use crate::util::format_hms;
use csv::{ReaderBuilder, WriterBuilder};
use log::{debug, error, info, warn};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tempfile::NamedTempFile;

/// Minimum sightings of one species in one cell before the cell is published.
pub const VERIFICATION_THRESHOLD: u64 = 3;

const HOTSPOT_HEADER: [&str; 4] = ["common_name", "lat", "lon", "sighting_count"];

/// Outcome of a recompute that did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecomputeStatus {
    /// The table was rewritten with this many rows.
    Updated { hotspots: usize },
    /// The ledger is missing or unreadable; the previous table was left alone.
    NoData,
}

impl RecomputeStatus {
    pub fn is_updated(&self) -> bool {
        matches!(self, RecomputeStatus::Updated { .. })
    }
}

/// Count sightings per (species, grid cell) and keep the groups that reach
/// `threshold`. Output is sorted by species, then cell, so it does not depend
/// on input order.
pub fn aggregate(sightings: &[Sighting], threshold: u64) -> Vec<Hotspot> {
    let mut counts: BTreeMap<(&str, GridCell), u64> = BTreeMap::new();
    for sighting in sightings {
        let Some(cell) = snap(sighting.latitude, sighting.longitude) else {
            warn!(
                "Skipping sighting {} of {}: position ({}, {}) is not a number",
                sighting.id, sighting.common_name, sighting.latitude, sighting.longitude
            );
            continue;
        };
        *counts.entry((sighting.common_name.as_str(), cell)).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .filter(|(_, count)| *count >= threshold)
        .map(|((name, cell), count)| Hotspot {
            common_name: name.to_string(),
            lat: cell.lat_degrees(),
            lon: cell.lon_degrees(),
            sighting_count: count,
        })
        .collect()
}

/// Rebuilds the hotspot table from the full sightings ledger.
pub struct HotspotAggregator {
    hotspots_path: PathBuf,
    threshold: u64,
}

impl HotspotAggregator {
    pub fn new(hotspots_path: impl Into<PathBuf>) -> Self {
        Self {
            hotspots_path: hotspots_path.into(),
            threshold: VERIFICATION_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: u64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn hotspots_path(&self) -> &Path {
        &self.hotspots_path
    }

    /// Full recompute: load, snap, group, count, filter, then atomically
    /// replace the table.
    ///
    /// A missing or unreadable ledger yields [`RecomputeStatus::NoData`] and
    /// leaves any existing table untouched. Write failures are returned and
    /// also leave the old table in place.
    pub fn recompute(&self, store: &SightingStore) -> Result<RecomputeStatus> {
        let start = Instant::now();
        info!("Processing raw data from {}", store.path().display());

        let sightings = match store.load() {
            Ok(Some(sightings)) => sightings,
            Ok(None) => {
                warn!("No sightings found at {} yet", store.path().display());
                return Ok(RecomputeStatus::NoData);
            }
            Err(e) => {
                error!("Skipping hotspot update, sightings unreadable: {}", e);
                return Ok(RecomputeStatus::NoData);
            }
        };
        info!("Found {} raw sightings", sightings.len());

        let hotspots = aggregate(&sightings, self.threshold);
        self.write_table(&hotspots)?;

        info!(
            "Compressed into {} verified hotspots in {}",
            hotspots.len(),
            format_hms(start.elapsed())
        );
        Ok(RecomputeStatus::Updated {
            hotspots: hotspots.len(),
        })
    }

    fn write_table(&self, hotspots: &[Hotspot]) -> Result<()> {
        let dir = match self.hotspots_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;

        {
            // Header is written by hand so an empty table still has one.
            let mut writer = WriterBuilder::new().has_headers(false).from_writer(&mut tmp);
            writer.write_record(HOTSPOT_HEADER)?;
            for hotspot in hotspots {
                writer.serialize(hotspot)?;
            }
            writer.flush()?;
        }
        tmp.flush()?;
        tmp.as_file().sync_all()?;

        // Dropping the PersistError's temp file removes it from disk.
        tmp.persist(&self.hotspots_path).map_err(|e| e.error)?;
        debug!("Hotspot table written to {}", self.hotspots_path.display());
        Ok(())
    }
}

/// Read the published hotspot table for map and proximity readers. A missing
/// or unreadable table reads as empty.
pub fn load_hotspots(path: &Path) -> Vec<Hotspot> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("No hotspot table at {}", path.display());
            return Vec::new();
        }
        Err(e) => {
            warn!("Could not open hotspot table {}: {}", path.display(), e);
            return Vec::new();
        }
    };

    let mut reader = ReaderBuilder::new().from_reader(file);
    match reader.deserialize().collect::<std::result::Result<Vec<Hotspot>, _>>() {
        Ok(hotspots) => hotspots,
        Err(e) => {
            warn!("Could not parse hotspot table {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::store::tests::sighting;
    use rand::seq::SliceRandom;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, SightingStore, HotspotAggregator) {
        let dir = TempDir::new().unwrap();
        let store = SightingStore::new(dir.path().join("sightings.csv"));
        let aggregator = HotspotAggregator::new(dir.path().join("final_hotspots.csv"));
        (dir, store, aggregator)
    }

    fn raw(id: u64, name: &str, lat: f64, lon: f64) -> Sighting {
        sighting(name, lat, lon).with_id(id)
    }

    #[test]
    fn test_junglefowl_cluster_becomes_one_hotspot() {
        let (_dir, store, aggregator) = setup();
        store.append(sighting("Red Junglefowl", 1.35210, 103.81980)).unwrap();
        store.append(sighting("Red Junglefowl", 1.35213, 103.81981)).unwrap();
        store.append(sighting("Red Junglefowl", 1.35209, 103.81979)).unwrap();

        let status = aggregator.recompute(&store).unwrap();
        assert_eq!(status, RecomputeStatus::Updated { hotspots: 1 });

        let table = load_hotspots(aggregator.hotspots_path());
        assert_eq!(
            table,
            vec![Hotspot {
                common_name: "Red Junglefowl".to_string(),
                lat: 1.352,
                lon: 103.820,
                sighting_count: 3,
            }]
        );
    }

    #[test]
    fn test_two_mynas_stay_below_threshold() {
        let (_dir, store, aggregator) = setup();
        store.append(sighting("Common Myna", 1.30010, 103.80010)).unwrap();
        store.append(sighting("Common Myna", 1.30012, 103.80008)).unwrap();

        let status = aggregator.recompute(&store).unwrap();
        assert_eq!(status, RecomputeStatus::Updated { hotspots: 0 });
        assert!(load_hotspots(aggregator.hotspots_path()).is_empty());

        let contents = fs::read_to_string(aggregator.hotspots_path()).unwrap();
        assert_eq!(contents.trim_end(), "common_name,lat,lon,sighting_count");
    }

    #[test]
    fn test_threshold_boundary() {
        let two = vec![raw(1, "Common Myna", 1.0, 2.0), raw(2, "Common Myna", 1.0, 2.0)];
        assert!(aggregate(&two, VERIFICATION_THRESHOLD).is_empty());

        let mut three = two.clone();
        three.push(raw(3, "Common Myna", 1.0001, 2.0001));
        let hotspots = aggregate(&three, VERIFICATION_THRESHOLD);
        assert_eq!(hotspots.len(), 1);
        assert_eq!(hotspots[0].sighting_count, 3);
    }

    #[test]
    fn test_non_finite_positions_are_skipped() {
        let sightings = vec![
            raw(1, "Common Myna", f64::NAN, f64::NAN),
            raw(2, "Common Myna", f64::NAN, f64::NAN),
            raw(3, "Common Myna", f64::NAN, f64::NAN),
            raw(4, "Common Myna", 0.0, f64::INFINITY),
        ];
        assert!(aggregate(&sightings, VERIFICATION_THRESHOLD).is_empty());
        assert!(aggregate(&sightings, 1).is_empty());
    }

    #[test]
    fn test_nan_rows_do_not_join_real_cells() {
        let (_dir, store, aggregator) = setup();
        for _ in 0..2 {
            store.append(sighting("Common Myna", 0.0, 0.0)).unwrap();
        }
        store.append(sighting("Common Myna", f64::NAN, f64::NAN)).unwrap();

        assert_eq!(
            aggregator.recompute(&store).unwrap(),
            RecomputeStatus::Updated { hotspots: 0 }
        );
    }

    #[test]
    fn test_grouping_is_case_sensitive_and_per_cell() {
        let sightings = vec![
            raw(1, "Common Myna", 1.0, 2.0),
            raw(2, "Common Myna", 1.0, 2.0),
            raw(3, "common myna", 1.0, 2.0),
            raw(4, "Common Myna", 1.002, 2.0),
        ];
        assert!(aggregate(&sightings, VERIFICATION_THRESHOLD).is_empty());
        assert_eq!(aggregate(&sightings, 1).len(), 3);
    }

    #[test]
    fn test_output_sorted_and_order_independent() {
        let mut sightings = Vec::new();
        let mut id = 0;
        for (name, lat, lon) in [
            ("Javan Myna", 1.3001, 103.8001),
            ("Asian Glossy Starling", 1.2900, 103.7700),
            ("Red Junglefowl", 1.3521, 103.8198),
            ("Javan Myna", 1.4000, 103.9000),
        ] {
            for jitter in 0..4 {
                id += 1;
                let offset = jitter as f64 * 0.00001;
                sightings.push(raw(id, name, lat + offset, lon - offset));
            }
        }
        let expected = aggregate(&sightings, VERIFICATION_THRESHOLD);
        assert_eq!(expected.len(), 4);
        let names: Vec<&str> = expected.iter().map(|h| h.common_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Asian Glossy Starling", "Javan Myna", "Javan Myna", "Red Junglefowl"]
        );

        let mut rng = rand::rng();
        for _ in 0..10 {
            sightings.shuffle(&mut rng);
            assert_eq!(aggregate(&sightings, VERIFICATION_THRESHOLD), expected);
        }
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let (_dir, store, aggregator) = setup();
        for _ in 0..3 {
            store.append(sighting("Asian Glossy Starling", 1.29, 103.77)).unwrap();
        }
        store.append(sighting("Common Myna", 1.29, 103.77)).unwrap();

        aggregator.recompute(&store).unwrap();
        let first = fs::read(aggregator.hotspots_path()).unwrap();
        aggregator.recompute(&store).unwrap();
        let second = fs::read(aggregator.hotspots_path()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_store_keeps_existing_table() {
        let (_dir, store, aggregator) = setup();
        let existing = "common_name,lat,lon,sighting_count\nRed Junglefowl,1.352,103.82,5\n";
        fs::write(aggregator.hotspots_path(), existing).unwrap();

        let status = aggregator.recompute(&store).unwrap();
        assert_eq!(status, RecomputeStatus::NoData);
        assert!(!status.is_updated());
        assert_eq!(fs::read_to_string(aggregator.hotspots_path()).unwrap(), existing);
    }

    #[test]
    fn test_missing_store_and_table_stays_missing() {
        let (_dir, store, aggregator) = setup();
        assert_eq!(aggregator.recompute(&store).unwrap(), RecomputeStatus::NoData);
        assert!(!aggregator.hotspots_path().exists());
    }

    #[test]
    fn test_malformed_store_keeps_existing_table() {
        let (_dir, store, aggregator) = setup();
        fs::write(
            store.path(),
            "id,date_observed,time_observed,latitude,longitude,common_name\n\
             1,01/01/2025,10:00:00,north,2.0,Common Myna\n",
        )
        .unwrap();
        let existing = "common_name,lat,lon,sighting_count\nCommon Myna,1.0,2.0,4\n";
        fs::write(aggregator.hotspots_path(), existing).unwrap();

        assert_eq!(aggregator.recompute(&store).unwrap(), RecomputeStatus::NoData);
        assert_eq!(fs::read_to_string(aggregator.hotspots_path()).unwrap(), existing);
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_failed_replace_keeps_existing_table_and_no_temp_file() {
        let (dir, store, aggregator) = setup();
        for _ in 0..3 {
            store.append(sighting("Common Myna", 1.0, 2.0)).unwrap();
        }
        // A directory in the table's place makes the final rename fail.
        fs::create_dir(aggregator.hotspots_path()).unwrap();
        let kept = aggregator.hotspots_path().join("keep.csv");
        fs::write(&kept, "common_name,lat,lon,sighting_count\n").unwrap();

        assert!(aggregator.recompute(&store).is_err());
        assert_eq!(entries(dir.path()), vec!["final_hotspots.csv", "sightings.csv"]);
        assert_eq!(entries(aggregator.hotspots_path()), vec!["keep.csv"]);
        assert_eq!(
            fs::read_to_string(&kept).unwrap(),
            "common_name,lat,lon,sighting_count\n"
        );
    }

    #[test]
    fn test_missing_table_directory_is_an_error() {
        let (dir, store, _) = setup();
        store.append(sighting("Common Myna", 1.0, 2.0)).unwrap();
        let aggregator = HotspotAggregator::new(dir.path().join("maps").join("final_hotspots.csv"));

        assert!(matches!(aggregator.recompute(&store), Err(Error::Io(_))));
        assert_eq!(entries(dir.path()), vec!["sightings.csv"]);
    }

    #[test]
    fn test_recompute_replaces_rather_than_merges() {
        let (_dir, store, aggregator) = setup();
        fs::write(
            aggregator.hotspots_path(),
            "common_name,lat,lon,sighting_count\nGhost Bird,0.0,0.0,9\n",
        )
        .unwrap();
        for _ in 0..3 {
            store.append(sighting("Common Myna", 1.0, 2.0)).unwrap();
        }

        aggregator.recompute(&store).unwrap();
        let table = load_hotspots(aggregator.hotspots_path());
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].common_name, "Common Myna");
    }

    #[test]
    fn test_custom_threshold() {
        let (_dir, store, aggregator) = setup();
        let aggregator = aggregator.with_threshold(1);
        store.append(sighting("Oriental Pied Hornbill", 1.404, 103.788)).unwrap();
        assert_eq!(
            aggregator.recompute(&store).unwrap(),
            RecomputeStatus::Updated { hotspots: 1 }
        );
    }

    #[test]
    fn test_load_hotspots_unparseable_reads_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("final_hotspots.csv");
        fs::write(&path, "common_name,lat,lon,sighting_count\nMyna,x,y,z\n").unwrap();
        assert!(load_hotspots(&path).is_empty());
    }
}
