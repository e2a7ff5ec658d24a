use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum ConfigError {
    DateOrder,
    Bbox(String),
    Limit(&'static str),
    GptExec(PathBuf),
    ShellWithoutGpt,
    CpuCount(u32),
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::DateOrder => write!(f, "end_date cannot be earlier than start_date"),
            ConfigError::Bbox(e) => write!(f, "Invalid bbox: {}", e),
            ConfigError::Limit(name) => write!(f, "{} must be greater than 0", name),
            ConfigError::GptExec(p) => write!(
                f,
                "GPT executable '{}' does not exist or does not point to an executable named 'gpt'",
                p.display()
            ),
            ConfigError::ShellWithoutGpt => write!(
                f,
                "shell scheduler selected but no gpt_exec provided (no SNAP module to load)"
            ),
            ConfigError::CpuCount(n) => write!(
                f,
                "n_cpus = {} is outside the range the walltime model was fitted on",
                n
            ),
            ConfigError::Io(e) => write!(f, "I/O error: {}", e),
            ConfigError::Json(e) => write!(f, "Failed to parse JSON: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> ConfigError {
        ConfigError::Io(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> ConfigError {
        ConfigError::Json(err)
    }
}
