//! Normalize TMC totals using the hourly rates of the 24-hour ATR counts.
//!
//! TMCs only cover 11 hours of the day. The ATRs are pretty consistent, so their per-hour
//! counts are averaged across all ATR files, and the averages for the hours the TMCs cover
//! (7am through 5pm) are summed into a single [`NormalizationFactor`]. A TMC's normalized count
//! is its total divided by that factor.
use std::path::{Path, PathBuf};

use chrono::{NaiveTime, Timelike};
use log::{debug, info, warn};
use serde::Deserialize;

use crate::locate::locate;
use crate::tables::read_csv;
use crate::workbook::{CellValue, WorkbookReader};
use crate::TmcError;

/// First hour of the day covered by a TMC.
pub const FIRST_TMC_HOUR: usize = 7;
/// Number of hours covered by a TMC.
pub const TMC_HOURS: usize = 11;
const HOURS_PER_DAY: usize = 24;

const TIME_FORMATS: [&str; 6] = [
    "%H:%M",
    "%H:%M:%S",
    "%I:%M %p",
    "%I:%M:%S %p",
    "%I:%M%p",
    "%H%M",
];

/// A row of the ATR catalog (`geocoded_atrs.csv`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AtrRecord {
    pub filename: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
}

impl AtrRecord {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some((lat, lng)),
            _ => None,
        }
    }
}

/// Read the ATR catalog.
pub fn read_atr_catalog(path: &Path) -> Result<Vec<AtrRecord>, TmcError> {
    if !path.exists() {
        return Err(TmcError::NormalizationInput(format!(
            "ATR catalog {path:?} not found"
        )));
    }
    read_csv(path)
}

/// Paths of the ATR files named in the catalog.
pub fn atr_files(catalog: &[AtrRecord], atr_dir: &Path) -> Vec<PathBuf> {
    catalog
        .iter()
        .map(|atr| atr_dir.join(&atr.filename))
        .collect()
}

/// Something that can get the counts for each hour, in order, from an ATR file.
pub trait HourlyRates {
    fn hourly_counts(&self, path: &Path) -> Result<Vec<f64>, TmcError>;
}

/// Hourly counts from ATR workbooks.
///
/// The first sheet's grid is [located](crate::locate) like a TMC's. Each row below the header
/// whose first cell is a time is summed across the count columns and added to the count for its
/// hour (e.g. 15-minute periods). The result always has 24 entries, indexed by hour; hours
/// without any rows are 0.
#[derive(Debug, Clone, Default)]
pub struct WorkbookHourlyRates<R> {
    reader: R,
}

impl<R: WorkbookReader> WorkbookHourlyRates<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: WorkbookReader> HourlyRates for WorkbookHourlyRates<R> {
    fn hourly_counts(&self, path: &Path) -> Result<Vec<f64>, TmcError> {
        let workbook = self.reader.open(path)?;
        let Some(sheet) = workbook.sheets().first() else {
            return Err(TmcError::NormalizationInput(format!(
                "{path:?} has no sheets"
            )));
        };
        let location = locate(sheet);

        let mut counts = [0.0; HOURS_PER_DAY];
        let mut seen = [false; HOURS_PER_DAY];
        for row in (location.start_row + 1)..=location.end_row {
            let Some(hour) = hour_of(sheet.cell(row, location.start_column))
                .map(|hour| hour as usize)
                .filter(|hour| *hour < HOURS_PER_DAY)
            else {
                continue;
            };
            counts[hour] += ((location.start_column + 1)..=location.end_column)
                .filter_map(|col| sheet.cell(row, col).number())
                .sum::<f64>();
            seen[hour] = true;
        }

        let missing = (0..HOURS_PER_DAY).filter(|h| !seen[*h]).collect::<Vec<_>>();
        if !missing.is_empty() {
            warn!("{path:?} has no counts for hours {missing:?}");
        }
        debug!("{} hours of counts in {path:?}", HOURS_PER_DAY - missing.len());
        Ok(counts.to_vec())
    }
}

/// The hour of a time cell - either text like "7:00 AM" or "07:15", or an Excel time of day.
pub fn hour_of(cell: &CellValue) -> Option<u32> {
    match cell {
        CellValue::Number(v) if (0.0..1.0).contains(v) => Some((v * 24.0 + 1e-9).floor() as u32),
        CellValue::Number(_) | CellValue::Empty => None,
        CellValue::Text(v) => {
            // Periods may be written as ranges, e.g. "7:00 AM - 8:00 AM".
            let start = v.split('-').next().unwrap_or_default().trim();
            TIME_FORMATS
                .iter()
                .find_map(|format| NaiveTime::parse_from_str(start, format).ok())
                .map(|time| time.hour())
        }
    }
}

/// Average each hour across all files.
///
/// Sequences are zipped, so the result is as long as the shortest one. Each hour's sum is divided
/// by the number of files.
pub fn average_hourly(all_counts: &[Vec<f64>]) -> Vec<f64> {
    let files = all_counts.len();
    let hours = all_counts.iter().map(Vec::len).min().unwrap_or(0);
    (0..hours)
        .map(|hour| all_counts.iter().map(|counts| counts[hour]).sum::<f64>() / files as f64)
        .collect()
}

/// Sum of the averages for the hours covered by a TMC.
pub fn daytime_total(averages: &[f64]) -> f64 {
    averages.iter().skip(FIRST_TMC_HOUR).take(TMC_HOURS).sum()
}

/// The divisor used to normalize every TMC total in a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizationFactor(f64);

impl NormalizationFactor {
    /// Create from an already-computed value, which must be positive.
    pub fn new(value: f64) -> Result<Self, TmcError> {
        if value > 0.0 && value.is_finite() {
            Ok(Self(value))
        } else {
            Err(TmcError::NormalizationInput(format!(
                "factor must be positive, not {value}"
            )))
        }
    }

    /// Compute from the hourly counts of every ATR file.
    pub fn compute(files: &[PathBuf], rates: &dyn HourlyRates) -> Result<Self, TmcError> {
        if files.is_empty() {
            return Err(TmcError::NormalizationInput(
                "no ATR files to compute from".to_string(),
            ));
        }

        let mut all_counts = Vec::with_capacity(files.len());
        for file in files {
            let counts = rates
                .hourly_counts(file)
                .map_err(|e| TmcError::NormalizationInput(format!("{file:?}: {e}")))?;
            all_counts.push(counts);
        }

        let averages = average_hourly(&all_counts);
        let factor = Self::new(daytime_total(&averages))?;
        info!(
            "Normalization factor {} from {} ATR files",
            factor.value(),
            files.len()
        );
        Ok(factor)
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// Normalize a total, truncating toward zero.
    pub fn normalize(&self, total: f64) -> i64 {
        (total / self.0).trunc() as i64
    }
}
