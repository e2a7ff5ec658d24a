use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer};
use std::fmt;

use super::identifier::{IdentifierError, SceneIdentifier};

/// Sub-directory under which the archive mirrors the catalog collection.
pub const COLLECTION_DIR: &str = "Sentinel-1";

/// A decimal degree value as reported by the catalog.
///
/// The catalog text is kept because scene pairing compares leading
/// characters of the decimal string rather than the numeric value.
#[derive(Debug, Clone, PartialEq)]
pub struct Coordinate {
    text: String,
    degrees: f64,
}

impl Coordinate {
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let degrees = text.parse::<f64>().ok()?;
        if !degrees.is_finite() {
            return None;
        }
        Some(Coordinate {
            text: text.to_string(),
            degrees,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn degrees(&self) -> f64 {
        self.degrees
    }

    /// First `n` characters of the decimal string (the whole string if shorter).
    pub fn prefix(&self, n: usize) -> &str {
        match self.text.char_indices().nth(n) {
            Some((idx, _)) => &self.text[..idx],
            None => &self.text,
        }
    }
}

/// Raw catalog entry, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogRecord {
    #[serde(default)]
    pub storage_path: Option<String>,
    #[serde(default)]
    pub quicklook: Option<String>,
    #[serde(default)]
    pub centroid: Option<Centroid>,
    #[serde(default)]
    pub orbit: Option<OrbitNumbers>,
    #[serde(default)]
    pub start_time: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Centroid {
    #[serde(default, deserialize_with = "decimal_text")]
    pub latitude: Option<String>,
    #[serde(default, deserialize_with = "decimal_text")]
    pub longitude: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrbitNumbers {
    #[serde(default)]
    pub absolute: Option<u32>,
    #[serde(default)]
    pub relative: Option<u32>,
}

// Accepts `"-20.5123"` as well as `-20.5123`.
fn decimal_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Why a catalog entry cannot take part in processing.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneError {
    MissingStoragePath,
    MissingCentroid(String),
    InvalidCoordinate { path: String, value: String },
    MissingOrbit(String),
    InvalidIdentifier { path: String, reason: String },
    InvalidStartTime { path: String, value: String },
}

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneError::MissingStoragePath => {
                write!(f, "record has neither a storage path nor a quicklook url")
            }
            SceneError::MissingCentroid(p) => write!(f, "{}: missing centroid", p),
            SceneError::InvalidCoordinate { path, value } => {
                write!(f, "{}: invalid coordinate '{}'", path, value)
            }
            SceneError::MissingOrbit(p) => write!(f, "{}: missing orbit numbers", p),
            SceneError::InvalidIdentifier { path, reason } => write!(f, "{}: {}", path, reason),
            SceneError::InvalidStartTime { path, value } => {
                write!(f, "{}: invalid start time '{}'", path, value)
            }
        }
    }
}

impl std::error::Error for SceneError {}

/// Maps a catalog quicklook url onto the archive's storage path.
pub fn quicklook_to_storage_path(quicklook: &str, source_root: &str) -> Option<String> {
    let (_, tail) = quicklook.split_once(COLLECTION_DIR)?;
    let tail = tail.strip_suffix(".png").unwrap_or(tail);
    Some(format!(
        "{}/{}{}.zip",
        source_root.trim_end_matches('/'),
        COLLECTION_DIR,
        tail
    ))
}

/// One validated catalog entry.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneDescriptor {
    pub storage_path: String,
    pub centroid_lat: Coordinate,
    pub centroid_lon: Coordinate,
    pub absolute_orbit: u32,
    pub relative_orbit: u32,
    pub acquisition_start: NaiveDateTime,
    pub identifier: SceneIdentifier,
}

impl SceneDescriptor {
    pub fn from_record(record: &CatalogRecord, source_root: &str) -> Result<Self, SceneError> {
        let storage_path = match (&record.storage_path, &record.quicklook) {
            (Some(path), _) => path.clone(),
            (None, Some(ql)) => {
                quicklook_to_storage_path(ql, source_root).ok_or(SceneError::MissingStoragePath)?
            }
            (None, None) => return Err(SceneError::MissingStoragePath),
        };

        let identifier =
            SceneIdentifier::parse(&storage_path).map_err(|IdentifierError(reason)| {
                SceneError::InvalidIdentifier {
                    path: storage_path.clone(),
                    reason,
                }
            })?;

        let centroid = record
            .centroid
            .as_ref()
            .ok_or_else(|| SceneError::MissingCentroid(storage_path.clone()))?;
        let (Some(lat), Some(lon)) = (&centroid.latitude, &centroid.longitude) else {
            return Err(SceneError::MissingCentroid(storage_path));
        };
        let centroid_lat = parse_coordinate(lat, &storage_path)?;
        let centroid_lon = parse_coordinate(lon, &storage_path)?;

        let (absolute_orbit, relative_orbit) = match &record.orbit {
            Some(OrbitNumbers {
                absolute: Some(abs),
                relative: Some(rel),
            }) => (*abs, *rel),
            _ => return Err(SceneError::MissingOrbit(storage_path)),
        };

        let acquisition_start = match &record.start_time {
            Some(value) => parse_start_time(value).ok_or_else(|| SceneError::InvalidStartTime {
                path: storage_path.clone(),
                value: value.clone(),
            })?,
            None => identifier.start,
        };

        Ok(SceneDescriptor {
            storage_path,
            centroid_lat,
            centroid_lon,
            absolute_orbit,
            relative_orbit,
            acquisition_start,
            identifier,
        })
    }
}

fn parse_coordinate(value: &str, path: &str) -> Result<Coordinate, SceneError> {
    Coordinate::parse(value).ok_or_else(|| SceneError::InvalidCoordinate {
        path: path.to_string(),
        value: value.to_string(),
    })
}

fn parse_start_time(value: &str) -> Option<NaiveDateTime> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.naive_utc())
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: &str = "/g/data/fj7/Copernicus";
    const NAME: &str = "S1A_IW_SLC__1SDV_20180101T193217_20180101T193244_019965_02200B_8E03";

    fn record() -> CatalogRecord {
        CatalogRecord {
            storage_path: Some(format!("{ROOT}/Sentinel-1/C-SAR/SLC/2018/2018-01/{NAME}.zip")),
            quicklook: None,
            centroid: Some(Centroid {
                latitude: Some("-20.51234".to_string()),
                longitude: Some("130.49876".to_string()),
            }),
            orbit: Some(OrbitNumbers {
                absolute: Some(19965),
                relative: Some(9),
            }),
            start_time: None,
        }
    }

    #[test]
    fn test_coordinate_prefix() {
        let c = Coordinate::parse("-20.51234").unwrap();
        assert_eq!(c.prefix(5), "-20.5");
        assert_eq!(c.prefix(50), "-20.51234");
        assert_eq!(c.degrees(), -20.51234);
        assert!(Coordinate::parse("north").is_none());
        assert!(Coordinate::parse("NaN").is_none());
    }

    #[test]
    fn test_valid_record() {
        let scene = SceneDescriptor::from_record(&record(), ROOT).unwrap();
        assert_eq!(scene.absolute_orbit, 19965);
        assert_eq!(scene.relative_orbit, 9);
        assert_eq!(scene.centroid_lat.text(), "-20.51234");
        assert_eq!(scene.acquisition_start, scene.identifier.start);
    }

    #[test]
    fn test_quicklook_mapping() {
        let ql = format!(
            "https://copernicus.nci.org.au/thumbs/Sentinel-1/C-SAR/SLC/2018/2018-01/{NAME}.png"
        );
        assert_eq!(
            quicklook_to_storage_path(&ql, "/g/data/fj7/Copernicus/").unwrap(),
            format!("{ROOT}/Sentinel-1/C-SAR/SLC/2018/2018-01/{NAME}.zip")
        );
        assert!(quicklook_to_storage_path("https://elsewhere/x.png", ROOT).is_none());

        let mut rec = record();
        rec.storage_path = None;
        rec.quicklook = Some(ql);
        let scene = SceneDescriptor::from_record(&rec, ROOT).unwrap();
        assert!(scene.storage_path.starts_with(ROOT));
    }

    #[test]
    fn test_missing_attributes_are_reported() {
        let mut rec = record();
        rec.centroid = None;
        assert!(matches!(
            SceneDescriptor::from_record(&rec, ROOT),
            Err(SceneError::MissingCentroid(_))
        ));

        let mut rec = record();
        rec.orbit = Some(OrbitNumbers {
            absolute: Some(1),
            relative: None,
        });
        assert!(matches!(
            SceneDescriptor::from_record(&rec, ROOT),
            Err(SceneError::MissingOrbit(_))
        ));

        let mut rec = record();
        rec.centroid.as_mut().unwrap().longitude = Some("east".to_string());
        assert!(matches!(
            SceneDescriptor::from_record(&rec, ROOT),
            Err(SceneError::InvalidCoordinate { .. })
        ));

        assert_eq!(
            SceneDescriptor::from_record(&CatalogRecord::default(), ROOT),
            Err(SceneError::MissingStoragePath)
        );
    }

    #[test]
    fn test_explicit_start_time() {
        let mut rec = record();
        rec.start_time = Some("2018-01-01T19:32:17.500Z".to_string());
        let scene = SceneDescriptor::from_record(&rec, ROOT).unwrap();
        assert_eq!(scene.acquisition_start.format("%H%M%S").to_string(), "193217");

        rec.start_time = Some("yesterday".to_string());
        assert!(matches!(
            SceneDescriptor::from_record(&rec, ROOT),
            Err(SceneError::InvalidStartTime { .. })
        ));
    }

    #[test]
    fn test_numeric_centroid_is_accepted() {
        let rec: CatalogRecord = serde_json::from_str(&format!(
            r#"{{
                "storage_path": "{ROOT}/Sentinel-1/{NAME}.zip",
                "centroid": {{"latitude": -20.5, "longitude": "130.25"}},
                "orbit": {{"absolute": 19965, "relative": 9}}
            }}"#
        ))
        .unwrap();
        let scene = SceneDescriptor::from_record(&rec, ROOT).unwrap();
        assert_eq!(scene.centroid_lat.text(), "-20.5");
        assert_eq!(scene.centroid_lon.text(), "130.25");
    }
}
