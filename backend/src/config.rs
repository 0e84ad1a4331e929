//! Runtime configuration from the environment.
//!
//! `.env` is loaded first if present. Unset or unparseable values use the defaults.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_WORKBOOK: &str = "combined_crop_data_citywise.xlsx";
pub const DEFAULT_CSV: &str = "crops.csv";
pub const DEFAULT_STATE_DIR: &str = ".cropdash";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    /// Primary source, usually the city-wise workbook.
    pub workbook: String,
    /// Secondary source, a delimited file.
    pub csv: String,
    /// Where the city selection is stored.
    pub state_dir: PathBuf,
    pub port: u16,
    pub fetch_timeout: Duration,
    /// Fall back to the embedded sample prices when no source yields data.
    pub builtin_fallback: bool,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            workbook: DEFAULT_WORKBOOK.to_string(),
            csv: DEFAULT_CSV.to_string(),
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            port: DEFAULT_PORT,
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            builtin_fallback: true,
        }
    }
}

impl DashboardConfig {
    /// Read `CROPDASH_*` variables.
    pub fn from_env() -> Self {
        // Try loading .env file
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let text = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Self {
            workbook: text("CROPDASH_WORKBOOK").unwrap_or(defaults.workbook),
            csv: text("CROPDASH_CSV").unwrap_or(defaults.csv),
            state_dir: text("CROPDASH_STATE_DIR").map(PathBuf::from).unwrap_or(defaults.state_dir),
            port: text("CROPDASH_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            fetch_timeout: text("CROPDASH_FETCH_TIMEOUT_SECS")
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.fetch_timeout),
            builtin_fallback: text("CROPDASH_BUILTIN_FALLBACK")
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.builtin_fallback),
        }
    }

    pub fn selection_file(&self) -> PathBuf {
        self.state_dir.join("selection.json")
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
