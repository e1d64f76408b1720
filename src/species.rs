//! Map marker styling by species group.

/// Radius of the region drawn around every hotspot, independent of its count.
pub const MARKER_RADIUS: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerStyle {
    pub icon: &'static str,
    pub color: &'static str,
}

pub const DEFAULT_STYLE: MarkerStyle = MarkerStyle {
    icon: "leaf",
    color: "gray",
};

/// Keyed by species group, one whole word of a common name.
const GROUP_STYLES: &[(&str, MarkerStyle)] = &[
    ("Junglefowl", MarkerStyle { icon: "fire", color: "red" }),
    ("Myna", MarkerStyle { icon: "volume-up", color: "purple" }),
    ("Starling", MarkerStyle { icon: "star", color: "green" }),
];

fn words(common_name: &str) -> impl Iterator<Item = &str> {
    common_name
        .split(|c: char| !c.is_alphanumeric() && c != '-')
        .filter(|word| !word.is_empty())
}

/// First word of `common_name` that names a styled group, so qualifiers such
/// as "Myna (juvenile)" or "Junglefowl, male" still resolve.
pub fn species_group(common_name: &str) -> Option<&'static str> {
    words(common_name).find_map(|word| {
        GROUP_STYLES
            .iter()
            .find(|(key, _)| *key == word)
            .map(|(key, _)| *key)
    })
}

pub fn marker_style(common_name: &str) -> MarkerStyle {
    species_group(common_name)
        .and_then(|group| {
            GROUP_STYLES
                .iter()
                .find(|(key, _)| *key == group)
                .map(|(_, style)| *style)
        })
        .unwrap_or(DEFAULT_STYLE)
}
