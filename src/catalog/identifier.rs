use chrono::NaiveDateTime;
use std::fmt;
use std::path::Path;

const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Fields encoded in a Sentinel-1 product name, e.g.
/// `S1A_IW_SLC__1SDV_20180101T193217_20180101T193244_019965_02200B_8E03.zip`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneIdentifier {
    pub mission: String,
    pub mode: String,
    pub product: String,
    /// Processing level, class and polarisation, e.g. `1SDV`.
    pub product_class: String,
    pub start: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierError(pub String);

impl fmt::Display for IdentifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid product name: {}", self.0)
    }
}

impl std::error::Error for IdentifierError {}

impl SceneIdentifier {
    /// Parses the file name of `storage_path`, ignoring directories and extension.
    pub fn parse(storage_path: &str) -> Result<Self, IdentifierError> {
        let stem = Path::new(storage_path)
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| IdentifierError(format!("no file name in '{}'", storage_path)))?;

        // The product type field is padded with '_' to four characters, which
        // leaves an empty token for SLC products.
        let tokens: Vec<&str> = stem.split('_').filter(|t| !t.is_empty()).collect();
        if tokens.len() != 9 {
            return Err(IdentifierError(format!(
                "expected 9 fields in '{}', found {}",
                stem,
                tokens.len()
            )));
        }

        let start = parse_timestamp(tokens[4])?;
        parse_timestamp(tokens[5])?;
        if tokens[6].parse::<u32>().is_err() {
            return Err(IdentifierError(format!(
                "bad absolute orbit '{}'",
                tokens[6]
            )));
        }

        Ok(SceneIdentifier {
            mission: tokens[0].to_string(),
            mode: tokens[1].to_string(),
            product: tokens[2].to_string(),
            product_class: tokens[3].to_string(),
            start,
        })
    }

    /// `S1A_IW_SLC_` style prefix, with the product field padded back to four characters.
    pub fn product_prefix(&self) -> String {
        format!("{}_{}_{:_<4}", self.mission, self.mode, self.product)
    }

    pub fn start_token(&self) -> String {
        self.start.format(TIMESTAMP_FORMAT).to_string()
    }
}

fn parse_timestamp(token: &str) -> Result<NaiveDateTime, IdentifierError> {
    NaiveDateTime::parse_from_str(token, TIMESTAMP_FORMAT)
        .map_err(|e| IdentifierError(format!("bad timestamp '{}': {}", token, e)))
}
