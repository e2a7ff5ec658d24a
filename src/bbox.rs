use serde::Deserialize;
use std::fmt;

/// Lat/long search window, in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Bbox {
    pub west: f64,
    pub east: f64,
    pub south: f64,
    pub north: f64,
}

impl Bbox {
    pub fn new(west: f64, east: f64, south: f64, north: f64) -> Result<Self, String> {
        if !(-180.0..=180.0).contains(&west) || !(-180.0..=180.0).contains(&east) {
            return Err("Longitude values must be between -180 and 180".to_string());
        }

        if !(-90.0..=90.0).contains(&south) || !(-90.0..=90.0).contains(&north) {
            return Err("Latitude values must be between -90 and 90".to_string());
        }

        if west > east || south > north {
            return Err("Min values must be <= max values".to_string());
        }

        Ok(Bbox {
            west,
            east,
            south,
            north,
        })
    }

    /// Closed polygon ring, starting and ending at the north-west corner.
    pub fn to_wkt(&self) -> String {
        format!(
            "POLYGON(({w} {n}, {e} {n}, {e} {s}, {w} {s}, {w} {n}))",
            w = self.west,
            e = self.east,
            n = self.north,
            s = self.south
        )
    }
}

impl fmt::Display for Bbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.west, self.east, self.south, self.north
        )
    }
}
