//! Proximity checks against the published hotspot table.

use crate::record::Hotspot;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// A query point closer than this to a hotspot counts as known habitat.
pub const VERIFIED_RADIUS_M: f64 = 50.0;

/// Great-circle distance in meters between two WGS84 points.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().min(1.0).asin()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Nearest<'a> {
    pub hotspot: &'a Hotspot,
    pub distance_m: f64,
}

pub fn nearest_hotspot(hotspots: &[Hotspot], lat: f64, lon: f64) -> Option<Nearest<'_>> {
    hotspots
        .iter()
        .map(|hotspot| Nearest {
            hotspot,
            distance_m: haversine_m(lat, lon, hotspot.lat, hotspot.lon),
        })
        .min_by(|a, b| a.distance_m.total_cmp(&b.distance_m))
}

#[derive(Debug, Clone, PartialEq)]
pub enum HabitatStatus {
    /// Within [`VERIFIED_RADIUS_M`] of a published hotspot.
    Verified { common_name: String, distance_m: f64 },
    /// Nothing published nearby; `nearest_m` is `None` when the table is empty.
    NewDiscovery { nearest_m: Option<f64> },
}

pub fn assess(hotspots: &[Hotspot], lat: f64, lon: f64) -> HabitatStatus {
    match nearest_hotspot(hotspots, lat, lon) {
        Some(nearest) if nearest.distance_m < VERIFIED_RADIUS_M => HabitatStatus::Verified {
            common_name: nearest.hotspot.common_name.clone(),
            distance_m: nearest.distance_m,
        },
        Some(nearest) => HabitatStatus::NewDiscovery {
            nearest_m: Some(nearest.distance_m),
        },
        None => HabitatStatus::NewDiscovery { nearest_m: None },
    }
}
