//! Configuration, from a `.env` file and/or environment variables.
//!
//!   - `DATA_DIR` (required) - directory containing `raw/` and `processed/`
//!   - `LOG_DIR` - where logs are written; defaults to `DATA_DIR`
//!   - `GEOCODER_URL` - Nominatim search endpoint
//!   - `GEOCODER_USER_AGENT` - sent with every geocoding request
//!   - `GEOCODER_DELAY_MS` - minimum time between geocoding requests
//!   - `SNAP_RADIUS` - search radius (in map units) when snapping to the road network
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use log::debug;

use crate::pipeline::OutputPaths;
use crate::TmcError;

pub const TMC_DIR: &str = "TURNING MOVEMENT COUNT";
pub const ATR_DIR: &str = "AUTOMATED TRAFFICE RECORDING";
const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org/search";
const DEFAULT_USER_AGENT: &str = "tmc-counts/0.1";
const DEFAULT_GEOCODER_DELAY_MS: u64 = 1000;
const DEFAULT_SNAP_RADIUS: f64 = 20.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub geocoder_url: String,
    pub geocoder_user_agent: String,
    pub geocoder_delay: Duration,
    pub snap_radius: f64,
}

impl Config {
    /// Configuration with defaults for everything but the data directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            log_dir: data_dir.clone(),
            data_dir,
            geocoder_url: DEFAULT_GEOCODER_URL.to_string(),
            geocoder_user_agent: DEFAULT_USER_AGENT.to_string(),
            geocoder_delay: Duration::from_millis(DEFAULT_GEOCODER_DELAY_MS),
            snap_radius: DEFAULT_SNAP_RADIUS,
        }
    }

    /// Load the `.env` file, if any, and read configuration from the environment.
    pub fn from_env() -> Result<Self, TmcError> {
        if let Err(e) = dotenvy::dotenv() {
            debug!("No .env file loaded ({e}); using environment only.");
        }

        let data_dir = env::var("DATA_DIR")
            .map_err(|e| TmcError::Config(format!("unable to load DATA_DIR: {e}")))?;
        let mut config = Config::new(data_dir);

        if let Ok(v) = env::var("LOG_DIR") {
            config.log_dir = v.into();
        }
        if let Ok(v) = env::var("GEOCODER_URL") {
            config.geocoder_url = v;
        }
        if let Ok(v) = env::var("GEOCODER_USER_AGENT") {
            config.geocoder_user_agent = v;
        }
        if let Ok(v) = env::var("GEOCODER_DELAY_MS") {
            let ms = v
                .parse()
                .map_err(|_| TmcError::Config(format!("invalid GEOCODER_DELAY_MS '{v}'")))?;
            config.geocoder_delay = Duration::from_millis(ms);
        }
        if let Ok(v) = env::var("SNAP_RADIUS") {
            config.snap_radius = v
                .parse()
                .map_err(|_| TmcError::Config(format!("invalid SNAP_RADIUS '{v}'")))?;
        }

        Ok(config)
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.data_dir.join("processed")
    }

    /// Directory of TMC workbooks.
    pub fn tmc_dir(&self) -> PathBuf {
        self.raw_dir().join(TMC_DIR)
    }

    /// Directory of ATR reference files.
    pub fn atr_dir(&self) -> PathBuf {
        self.raw_dir().join(ATR_DIR)
    }

    /// The geocoded TMC table, which doubles as the geocoding cache.
    pub fn geocoded_tmcs(&self) -> PathBuf {
        self.processed_dir().join("geocoded_tmcs.csv")
    }

    /// Catalog of ATR files and their locations.
    pub fn atr_catalog(&self) -> PathBuf {
        self.processed_dir().join("geocoded_atrs.csv")
    }

    pub fn intersections_shp(&self) -> PathBuf {
        self.processed_dir().join("maps").join("inters_segments.shp")
    }

    pub fn segments_shp(&self) -> PathBuf {
        self.processed_dir().join("maps").join("inter_and_non_int.shp")
    }

    pub fn snapped_tmcs(&self) -> PathBuf {
        self.processed_dir().join("snapped_tmcs.csv")
    }

    pub fn map_html(&self) -> PathBuf {
        self.processed_dir().join("map.html")
    }

    pub fn outputs(&self) -> OutputPaths {
        let processed = self.processed_dir();
        OutputPaths {
            geocoded_tmcs: self.geocoded_tmcs(),
            all_data: processed.join("all_data.csv"),
            data_info: processed.join("data_info.csv"),
            all_joined: processed.join("all_joined.csv"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_under_data_dir() {
        let config = Config::new("/data");
        assert_eq!(
            config.tmc_dir(),
            PathBuf::from("/data/raw/TURNING MOVEMENT COUNT")
        );
        assert_eq!(
            config.geocoded_tmcs(),
            PathBuf::from("/data/processed/geocoded_tmcs.csv")
        );
        assert_eq!(
            config.outputs().data_info,
            PathBuf::from("/data/processed/data_info.csv")
        );
        assert_eq!(config.log_dir, PathBuf::from("/data"));
    }
}
