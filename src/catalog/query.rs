use chrono::NaiveDate;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;
use std::fmt;

use crate::bbox::Bbox;

pub const SARA_SEARCH_URL: &str =
    "https://copernicus.nci.org.au/sara.server/1.0/api/collections/S1/search.json?";

/// Records requested per catalog page.
pub const PAGE_SIZE: u32 = 50;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum Product {
    #[default]
    #[serde(rename(deserialize = "SLC"))]
    Slc,
    #[serde(rename(deserialize = "GRD"))]
    Grd,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensorMode {
    #[default]
    #[serde(rename(deserialize = "IW"))]
    Iw,
    #[serde(rename(deserialize = "EW"))]
    Ew,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Polarisation {
    #[serde(rename(deserialize = "HH"))]
    Hh,
    #[serde(rename(deserialize = "VV"))]
    Vv,
    #[serde(rename(deserialize = "HH+HV"))]
    HhHv,
    #[serde(rename(deserialize = "VH+VV"))]
    VhVv,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum OrbitDirection {
    Ascending,
    Descending,
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Product::Slc => write!(f, "SLC"),
            Product::Grd => write!(f, "GRD"),
        }
    }
}

impl fmt::Display for SensorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorMode::Iw => write!(f, "IW"),
            SensorMode::Ew => write!(f, "EW"),
        }
    }
}

impl fmt::Display for Polarisation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Polarisation::Hh => write!(f, "HH"),
            Polarisation::Vv => write!(f, "VV"),
            Polarisation::HhHv => write!(f, "HH+HV"),
            Polarisation::VhVv => write!(f, "VH+VV"),
        }
    }
}

impl fmt::Display for OrbitDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrbitDirection::Ascending => write!(f, "Ascending"),
            OrbitDirection::Descending => write!(f, "Descending"),
        }
    }
}

/// Search criteria sent to the scene catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub bbox: Bbox,
    pub product: Product,
    pub mode: SensorMode,
    pub polarisation: Option<Polarisation>,
    pub orbit_number: Option<u32>,
    pub orbit_direction: Option<OrbitDirection>,
}

impl CatalogQuery {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate, bbox: Bbox) -> Self {
        Self {
            start_date,
            end_date,
            bbox,
            product: Product::default(),
            mode: SensorMode::default(),
            polarisation: None,
            orbit_number: None,
            orbit_direction: None,
        }
    }

    /// Search url without paging, parameters in the order the catalog documents them.
    pub fn url(&self, base: &str) -> String {
        let mut url = base.to_string();
        let mut push = |key: &str, value: &str| {
            url.push_str(&format!("&{}={}", key, url_quote(value)));
        };

        push("productType", &self.product.to_string());
        push("sensorMode", &self.mode.to_string());
        push("startDate", &self.start_date.format("%Y-%m-%d").to_string());
        push(
            "completionDate",
            &self.end_date.format("%Y-%m-%d").to_string(),
        );
        if let Some(pol) = self.polarisation {
            push("polarisation", &pol.to_string().replace('+', ","));
        }
        if let Some(orbit) = self.orbit_number {
            push("orbitNumber", &orbit.to_string());
        }
        if let Some(direction) = self.orbit_direction {
            push("orbitDirection", &direction.to_string());
        }
        push("geometry", &self.bbox.to_wkt());

        url.push_str(&format!("&maxRecords={}", PAGE_SIZE));
        url
    }

    /// Url of the 1-based result page `page`.
    pub fn page_url(&self, base: &str, page: u32) -> String {
        let url = self.url(base);
        if page <= 1 {
            url
        } else {
            format!("{}&page={}", url, page)
        }
    }
}

/// Everything except unreserved characters and `/` is percent-encoded.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

fn url_quote(value: &str) -> String {
    utf8_percent_encode(value, QUERY_VALUE).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> CatalogQuery {
        CatalogQuery::new(
            NaiveDate::from_ymd_opt(2018, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2018, 2, 1).unwrap(),
            Bbox::new(130.0, 131.0, -21.0, -20.0).unwrap(),
        )
    }

    #[test]
    fn test_url_quote() {
        assert_eq!(url_quote("VH,VV"), "VH%2CVV");
        assert_eq!(url_quote("POLYGON((1 2))"), "POLYGON%28%281%202%29%29");
        assert_eq!(url_quote("2018-01-01"), "2018-01-01");
        assert_eq!(url_quote("a/b~c"), "a/b~c");
        assert_eq!(url_quote("Zürich"), "Z%C3%BCrich");
    }

    #[test]
    fn test_minimal_query_url() {
        let url = query().url(SARA_SEARCH_URL);
        assert!(url.starts_with(SARA_SEARCH_URL));
        assert!(url.contains("&productType=SLC&sensorMode=IW"));
        assert!(url.contains("&startDate=2018-01-01&completionDate=2018-02-01"));
        assert!(url.contains("&geometry=POLYGON%28%28130%20-20"));
        assert!(url.ends_with("&maxRecords=50"));
        assert!(!url.contains("polarisation"));
        assert!(!url.contains("orbitNumber"));
    }

    #[test]
    fn test_optional_filters() {
        let mut q = query();
        q.polarisation = Some(Polarisation::VhVv);
        q.orbit_number = Some(9);
        q.orbit_direction = Some(OrbitDirection::Descending);
        let url = q.url("base?");
        assert!(url.contains("&polarisation=VH%2CVV"));
        assert!(url.contains("&orbitNumber=9"));
        assert!(url.contains("&orbitDirection=Descending"));
    }

    #[test]
    fn test_page_url() {
        let q = query();
        assert_eq!(q.page_url("base?", 1), q.url("base?"));
        assert!(q.page_url("base?", 3).ends_with("&maxRecords=50&page=3"));
    }
}
