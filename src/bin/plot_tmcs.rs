//! Plot the geocoded TMCs (yellow) and ATRs (green) on a map, written to
//! `<DATA_DIR>/processed/map.html`.
use std::process::ExitCode;

use log::error;

use tmc_counts::config::Config;
use tmc_counts::map::write_map;
use tmc_counts::normalize::{read_atr_catalog, AtrRecord};
use tmc_counts::tables::{read_csv, TmcRecord};
use tmc_counts::{init_logging, TmcError};

const LOG: &str = "plot_tmcs.log";

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
    let tmcs: Vec<TmcRecord> = read_csv(&config.geocoded_tmcs())?;
    let atrs: Vec<AtrRecord> = read_atr_catalog(&config.atr_catalog())?;
    write_map(&config.map_html(), &tmcs, &atrs)
}
