//! Interferometric pair discovery
//!
//! Every unordered pair of scenes is tested. Two scenes pair when their
//! centroids agree on the leading `coord_precision` characters of the
//! catalog's decimal strings, they share a relative orbit, and their absolute
//! orbits are less than `max_orbit_delta` apart. A scene may appear in several
//! pairs.
//!
//! The centroid test is a coarse string match, not a distance: `-9.99` and
//! `-10.0` never match, and the same prefix length covers different spans of
//! latitude on either side of 10 and 100 degrees.

use serde::Deserialize;
use std::collections::HashSet;

use crate::catalog::SceneDescriptor;
use crate::work_unit::WorkUnit;

pub const DEFAULT_MAX_ORBIT_DELTA: u32 = 180;
pub const DEFAULT_COORD_PRECISION: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PairingRule {
    pub max_orbit_delta: u32,
    pub coord_precision: usize,
}

impl Default for PairingRule {
    fn default() -> Self {
        Self {
            max_orbit_delta: DEFAULT_MAX_ORBIT_DELTA,
            coord_precision: DEFAULT_COORD_PRECISION,
        }
    }
}

impl PairingRule {
    pub fn matches(&self, a: &SceneDescriptor, b: &SceneDescriptor) -> bool {
        let n = self.coord_precision;
        a.centroid_lat.prefix(n) == b.centroid_lat.prefix(n)
            && a.centroid_lon.prefix(n) == b.centroid_lon.prefix(n)
            && a.relative_orbit == b.relative_orbit
            && a.absolute_orbit.abs_diff(b.absolute_orbit) < self.max_orbit_delta
    }
}

/// Pairs in encounter order: by position of the first scene, then of the second.
/// The earlier scene of each pair is its primary.
/// Repeated storage paths are considered once, at their first position.
pub fn find_pairs(scenes: &[SceneDescriptor], rule: &PairingRule) -> Vec<WorkUnit> {
    let mut seen = HashSet::new();
    let scenes: Vec<&SceneDescriptor> = scenes
        .iter()
        .filter(|s| seen.insert(s.storage_path.as_str()))
        .collect();

    let mut pairs = Vec::new();
    for (i, primary) in scenes.iter().enumerate() {
        for secondary in &scenes[i + 1..] {
            if rule.matches(primary, secondary) {
                log::debug!(
                    "Pair {} + {}",
                    primary.identifier.start_token(),
                    secondary.identifier.start_token()
                );
                pairs.push(WorkUnit::Pair {
                    primary: (*primary).clone(),
                    secondary: (*secondary).clone(),
                });
            }
        }
    }
    pairs
}

/// One unit per scene, for single-scene workflows.
pub fn single_units(scenes: &[SceneDescriptor]) -> Vec<WorkUnit> {
    scenes
        .iter()
        .cloned()
        .map(|scene| WorkUnit::Single { scene })
        .collect()
}
