//! Classify a workbook by the names of its sheets.
//!
//! Format 1 is tested before Format 2; a workbook matching neither is [`SheetFormat::Unclassified`].
//!
//! Other layouts seen in the data but not handled (yet):
//!   - 'Cars' 'Trucks' 'Bikes Peds'
//!   - 'Cars Trucks' 'Bikes Peds'
//!   - 'Cars & Trucks' 'Bikes & Peds'

const MOTORS_PREFIX: &str = "all motors";
const PEDS_PREFIX: &str = "all peds";
const BICYCLES: &str = "bicycles hr.";
const CARS: &str = "cars";
const HEAVY_VEHICLES: &str = "heavy vehicles";
const TRUCKS: &str = "trucks";

/// The layout of a TMC workbook, with the (lower-cased) names of the sheets to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetFormat {
    /// Separate sheets for motors, pedestrians, and bicycles; at least one is present.
    Format1 {
        motors: Option<String>,
        peds: Option<String>,
        bikes: Option<String>,
    },
    /// A cars sheet and a heavy vehicle sheet (plus a peds/bikes sheet, which isn't used).
    Format2 { cars: String, heavy_vehicles: String },
    Unclassified,
}

/// Determine the format from sheet names (case is ignored).
pub fn classify<S: AsRef<str>>(sheet_names: &[S]) -> SheetFormat {
    let names = sheet_names
        .iter()
        .map(|name| name.as_ref().to_lowercase())
        .collect::<Vec<_>>();
    let has = |wanted: &str| names.iter().any(|name| name == wanted);
    let first_starting_with = |prefix: &str| names.iter().find(|name| name.starts_with(prefix));

    let motors = first_starting_with(MOTORS_PREFIX).cloned();
    let peds = first_starting_with(PEDS_PREFIX).cloned();
    let bikes = has(BICYCLES).then(|| BICYCLES.to_string());

    if motors.is_some() || peds.is_some() || bikes.is_some() {
        return SheetFormat::Format1 {
            motors,
            peds,
            bikes,
        };
    }

    let heavy_vehicles = if has(HEAVY_VEHICLES) {
        Some(HEAVY_VEHICLES)
    } else if has(TRUCKS) {
        Some(TRUCKS)
    } else {
        None
    };
    let has_peds_or_bikes = first_starting_with("peds and ").is_some()
        || first_starting_with("bikes").is_some();

    match heavy_vehicles {
        Some(v) if has(CARS) && has_peds_or_bikes => SheetFormat::Format2 {
            cars: CARS.to_string(),
            heavy_vehicles: v.to_string(),
        },
        _ => SheetFormat::Unclassified,
    }
}
