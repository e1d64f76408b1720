use serde::{Deserialize, Serialize};

/// One row of the sightings ledger. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sighting {
    pub id: u64,
    pub date_observed: String,
    pub time_observed: String,
    pub latitude: f64,
    pub longitude: f64,
    pub common_name: String,
}

/// A sighting as submitted by an observer, before the ledger assigns its id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSighting {
    pub date_observed: String,
    pub time_observed: String,
    pub latitude: f64,
    pub longitude: f64,
    pub common_name: String,
}

impl NewSighting {
    pub fn with_id(self, id: u64) -> Sighting {
        Sighting {
            id,
            date_observed: self.date_observed,
            time_observed: self.time_observed,
            latitude: self.latitude,
            longitude: self.longitude,
            common_name: self.common_name,
        }
    }
}

/// One row of the derived hotspot table. `lat`/`lon` are the grid cell's
/// snapped coordinate, never a raw sighting position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hotspot {
    pub common_name: String,
    pub lat: f64,
    pub lon: f64,
    pub sighting_count: u64,
}
