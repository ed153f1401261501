//! Snap the geocoded TMCs to the nearest intersection and road segment.
//!
//! Run `parse_tmcs` first; this reads `<DATA_DIR>/processed/geocoded_tmcs.csv` and the road
//! network shapefiles in `<DATA_DIR>/processed/maps/`, and writes
//! `<DATA_DIR>/processed/snapped_tmcs.csv`.
use std::process::ExitCode;

use log::{error, info};

use tmc_counts::config::Config;
use tmc_counts::snap::{snap, SegmentIndex};
use tmc_counts::tables::{read_csv, write_csv, TmcRecord};
use tmc_counts::{init_logging, TmcError};

const LOG: &str = "snap_tmcs.log";

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
    let records: Vec<TmcRecord> = read_csv(&config.geocoded_tmcs())?;

    info!("Snapping TMCs to intersections and segments");
    let intersections =
        SegmentIndex::from_shapefile(&config.intersections_shp(), config.snap_radius)?;
    let segments = SegmentIndex::from_shapefile(&config.segments_shp(), config.snap_radius)?;
    let snapped = snap(&records, &intersections, &segments);

    let path = config.snapped_tmcs();
    write_csv(&path, &snapped)?;
    info!("{} snapped TMCs written to {path:?}", snapped.len());
    Ok(())
}
