//! Geocode the TMC files, normalize their totals, and extract their counts.
//!
//! Reads from `<DATA_DIR>/raw/` and writes to `<DATA_DIR>/processed/`:
//!   - `geocoded_tmcs.csv` - each TMC file with its address, coordinates, date, total, and
//!     normalized total. This also serves as the geocoding cache; when it exists, nothing is
//!     geocoded. Delete it to geocode again.
//!   - `all_data.csv` - hourly counts in each direction for each extracted sheet
//!   - `data_info.csv` - what each extracted sheet is, keyed by the `data_id` of `all_data.csv`
//!   - `all_joined.csv` - the two above, joined
//!
//! The normalization factor is computed from the ATR files listed in
//! `<DATA_DIR>/processed/geocoded_atrs.csv`.
//!
//! See [`Config`] for the environment variables used.
use std::process::ExitCode;

use log::{error, info};

use tmc_counts::config::Config;
use tmc_counts::geocode::NominatimGeocoder;
use tmc_counts::normalize::WorkbookHourlyRates;
use tmc_counts::pipeline;
use tmc_counts::workbook::CalamineReader;
use tmc_counts::{init_logging, TmcError};

const LOG: &str = "parse_tmcs.log";

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(v) => v,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = init_logging(&config.log_dir, LOG) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &Config) -> Result<(), TmcError> {
    let geocoder = NominatimGeocoder::new(
        config.geocoder_url.as_str(),
        &config.geocoder_user_agent,
        config.geocoder_delay,
    )?;
    let rates = WorkbookHourlyRates::new(CalamineReader);

    let summary = pipeline::run(config, &geocoder, &CalamineReader, &rates)?;
    info!(
        "Done: {} files, {} processed, {} missing",
        summary.files, summary.processed, summary.missing
    );
    Ok(())
}
