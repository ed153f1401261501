//! Run everything needed to go from raw TMC workbooks to the consolidated tables.
//!
//! A run resolves addresses (or reads them from the cache), computes the normalization factor,
//! and then works through the TMC files one at a time. After each file the geocoded TMC table,
//! now with totals filled in, is written back out, so an interrupted run leaves everything up to
//! the last file on disk. Once every file has been processed the count tables are written.
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::address::{get_geocoded, GeocodedTmcs};
use crate::config::Config;
use crate::extract_from_sheet::{extract_mode_sheet, format2_total, ModeSheet};
use crate::format::{classify, SheetFormat};
use crate::geocode::Geocoder;
use crate::normalize::{atr_files, read_atr_catalog, HourlyRates, NormalizationFactor};
use crate::tables::{join, write_csv, CountRow, DataInfoRecord, TmcRecord};
use crate::workbook::{Workbook, WorkbookReader};
use crate::{ParseProblem, TmcError};

/// Where the tables of a run are written.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPaths {
    pub geocoded_tmcs: PathBuf,
    pub all_data: PathBuf,
    pub data_info: PathBuf,
    pub all_joined: PathBuf,
}

/// What a run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    /// TMC files looked at.
    pub files: usize,
    /// Files in a recognized format.
    pub processed: usize,
    /// Files in an unrecognized format, or whose filenames couldn't be parsed.
    pub missing: usize,
    /// Rows in `all_data`.
    pub count_rows: usize,
    /// Distinct filenames in `data_info`.
    pub distinct_files: usize,
}

/// The tables built up over a run.
#[derive(Debug)]
pub struct RunningTables {
    records: Vec<TmcRecord>,
    all_data: Vec<CountRow>,
    data_info: Vec<DataInfoRecord>,
    last_id: u32,
    processed: usize,
    missing: usize,
    rejected: usize,
    outputs: OutputPaths,
}

impl RunningTables {
    /// Totals left over from an earlier run are cleared.
    pub fn new(mut records: Vec<TmcRecord>, outputs: OutputPaths) -> Self {
        for record in records.iter_mut() {
            record.total = None;
            record.normalized = None;
        }
        Self {
            records,
            all_data: vec![],
            data_info: vec![],
            last_id: 0,
            processed: 0,
            missing: 0,
            rejected: 0,
            outputs,
        }
    }

    pub fn records(&self) -> &[TmcRecord] {
        &self.records
    }

    pub fn all_data(&self) -> &[CountRow] {
        &self.all_data
    }

    pub fn data_info(&self) -> &[DataInfoRecord] {
        &self.data_info
    }

    /// Ids start at 1 and are never reused.
    fn next_id(&mut self) -> u32 {
        self.last_id += 1;
        self.last_id
    }

    /// Add the counts of a sheet taken from the file of record `index`.
    pub fn push_sheet(&mut self, index: usize, sheet: ModeSheet) {
        let id = self.next_id();
        let record = &self.records[index];
        self.data_info.push(DataInfoRecord {
            id,
            address: record.address.clone(),
            date: record.date,
            east: sheet.streets.east,
            south: sheet.streets.south,
            west: sheet.streets.west,
            north: sheet.streets.north,
            data_type: sheet.data_type,
            filename: record.file.clone(),
        });
        self.all_data.extend(sheet.grid.into_rows(id));
    }

    /// Set the total of record `index`, and its normalized total.
    pub fn set_total(&mut self, index: usize, total: f64, factor: &NormalizationFactor) {
        let record = &mut self.records[index];
        record.total = Some(total);
        record.normalized = Some(factor.normalize(total));
    }

    pub fn mark_processed(&mut self) {
        self.processed += 1;
    }

    pub fn mark_missing(&mut self) {
        self.missing += 1;
    }

    /// Count workbooks that were left out before processing began.
    pub fn mark_rejected(&mut self, count: usize) {
        self.rejected += count;
    }

    /// Write the TMC records, as they are so far.
    pub fn flush_records(&self) -> Result<(), TmcError> {
        write_csv(&self.outputs.geocoded_tmcs, &self.records)
    }

    /// Write the count tables and summarize the run.
    pub fn finalize(self) -> Result<RunSummary, TmcError> {
        write_csv(&self.outputs.all_data, &self.all_data)?;
        write_csv(&self.outputs.data_info, &self.data_info)?;
        write_csv(
            &self.outputs.all_joined,
            &join(&self.all_data, &self.data_info),
        )?;

        let summary = RunSummary {
            files: self.records.len() + self.rejected,
            processed: self.processed,
            missing: self.missing + self.rejected,
            count_rows: self.all_data.len(),
            distinct_files: self
                .data_info
                .iter()
                .map(|info| info.filename.as_str())
                .collect::<HashSet<_>>()
                .len(),
        };
        info!(
            "{} count rows from {} files; {} of {} files processed, {} missing",
            summary.count_rows,
            summary.distinct_files,
            summary.processed,
            summary.files,
            summary.missing
        );
        Ok(summary)
    }
}

/// Extract what can be taken from the workbook of record `index` into the running tables.
///
/// Format 1 sheets are taken in the order motors, peds, bicycles, and the record's total is the
/// grand total of the motors sheet. A Format 1 workbook without a motors sheet gets no total.
pub fn process_workbook(
    tables: &mut RunningTables,
    index: usize,
    workbook: &Workbook,
    factor: &NormalizationFactor,
) -> Result<(), TmcError> {
    let file = tables.records[index].file.clone();
    match classify(&workbook.lower_sheet_names()) {
        SheetFormat::Format1 {
            motors,
            peds,
            bikes,
        } => {
            let mut motors_total = None;
            for name in [&motors, &peds, &bikes].into_iter().flatten() {
                let sheet = workbook.sheet_by_lower_name(name).ok_or_else(|| {
                    TmcError::parse(ParseProblem::MissingSheet(name.clone()), &file)
                })?;
                let mode = extract_mode_sheet(sheet)?;
                if Some(name) == motors.as_ref() {
                    motors_total = Some(mode.total);
                }
                tables.push_sheet(index, mode);
            }
            match motors_total {
                Some(total) => tables.set_total(index, total, factor),
                None => debug!("{file} has no motors sheet, so no total"),
            }
            tables.mark_processed();
        }
        SheetFormat::Format2 {
            cars,
            heavy_vehicles,
        } => {
            let total = format2_total(workbook, &cars, &heavy_vehicles)?;
            tables.set_total(index, total, factor);
            tables.mark_processed();
        }
        SheetFormat::Unclassified => {
            warn!("{file} is not in a known format; skipping");
            tables.mark_missing();
        }
    }
    Ok(())
}

/// Process every TMC workbook, writing the tables to `outputs`.
///
/// Workbooks rejected while geocoding count as missing.
pub fn parse_tmcs(
    geocoded: GeocodedTmcs,
    tmc_dir: &Path,
    outputs: &OutputPaths,
    reader: &dyn WorkbookReader,
    factor: &NormalizationFactor,
) -> Result<RunSummary, TmcError> {
    let mut tables = RunningTables::new(geocoded.records, outputs.clone());
    tables.mark_rejected(geocoded.rejected);
    let total_files = tables.records().len();

    for index in 0..total_files {
        let path = tmc_dir.join(&tables.records()[index].file);
        debug!("Processing {path:?} ({} of {total_files})", index + 1);
        let workbook = reader.open(&path)?;
        process_workbook(&mut tables, index, &workbook, factor)?;
        tables.flush_records()?;
    }

    tables.finalize()
}

/// Geocode, normalize, and extract everything under the configured data directory.
pub fn run(
    config: &Config,
    geocoder: &dyn Geocoder,
    reader: &dyn WorkbookReader,
    rates: &dyn HourlyRates,
) -> Result<RunSummary, TmcError> {
    let outputs = config.outputs();
    let tmc_dir = config.tmc_dir();

    let geocoded = get_geocoded(&tmc_dir, &outputs.geocoded_tmcs, geocoder)?;

    let catalog = read_atr_catalog(&config.atr_catalog())?;
    let factor = NormalizationFactor::compute(&atr_files(&catalog, &config.atr_dir()), rates)?;

    parse_tmcs(geocoded, &tmc_dir, &outputs, reader, &factor)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::workbook::{CellValue, Worksheet};

    fn record(file: &str) -> TmcRecord {
        TmcRecord {
            file: file.to_string(),
            address: Some("A ST and B ST Boston, MA".to_string()),
            latitude: None,
            longitude: None,
            date: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap(),
            total: None,
            normalized: None,
        }
    }

    fn outputs(dir: &Path) -> OutputPaths {
        OutputPaths {
            geocoded_tmcs: dir.join("geocoded_tmcs.csv"),
            all_data: dir.join("all_data.csv"),
            data_info: dir.join("data_info.csv"),
            all_joined: dir.join("all_joined.csv"),
        }
    }

    fn mode_sheet(name: &str, total: f64) -> Worksheet {
        let t = |v: &str| CellValue::from(v);
        let n = CellValue::Number;
        Worksheet::new(
            name,
            vec![
                vec![t("Time"), t(""), t(""), t(""), t(""), t("Total")],
                vec![t(""), t("B ST"), t("A ST"), t("B ST"), t("A ST")],
                vec![t(""), t("Thru"), t("Thru"), t("Thru"), t("Thru")],
                vec![t("07:00"), n(1.0), n(2.0), n(3.0), n(4.0), n(10.0)],
                vec![t("08:00"), n(5.0), n(6.0), n(7.0), n(8.0), n(26.0)],
                vec![t("Total"), n(6.0), n(8.0), n(10.0), n(12.0), n(total)],
            ],
        )
    }

    #[test]
    fn ids_are_shared_by_data_info_and_counts() {
        let dir = tempfile::tempdir().unwrap();
        let mut tables = RunningTables::new(
            vec![record("1_2_A-ST,-B-ST_20150101.XLS")],
            outputs(dir.path()),
        );
        let workbook = Workbook::new(vec![
            mode_sheet("All Motors Hr.", 36.0),
            mode_sheet("All Peds Hr.", 5.0),
        ]);
        let factor = NormalizationFactor::new(2.0).unwrap();
        process_workbook(&mut tables, 0, &workbook, &factor).unwrap();

        let ids = tables.data_info().iter().map(|i| i.id).collect::<Vec<_>>();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(tables.data_info()[0].data_type, "motors");
        assert_eq!(tables.data_info()[1].data_type, "peds");
        assert_eq!(tables.data_info()[0].east, "B ST");
        // the row just above the totals is not part of the grid
        let data_ids = tables.all_data().iter().map(|row| row.data_id).collect::<Vec<_>>();
        assert_eq!(data_ids, vec![1, 2]);
        assert_eq!(tables.all_data()[0].times, "07:00");

        // the total comes from the motors sheet only
        assert_eq!(tables.records()[0].total, Some(36.0));
        assert_eq!(tables.records()[0].normalized, Some(18));
    }

    #[test]
    fn no_motors_sheet_means_no_total() {
        let dir = tempfile::tempdir().unwrap();
        let mut tables = RunningTables::new(
            vec![record("1_2_A-ST,-B-ST_20150101.XLS")],
            outputs(dir.path()),
        );
        let workbook = Workbook::new(vec![mode_sheet("All Peds Hr.", 5.0)]);
        let factor = NormalizationFactor::new(2.0).unwrap();
        process_workbook(&mut tables, 0, &workbook, &factor).unwrap();

        assert_eq!(tables.data_info().len(), 1);
        assert_eq!(tables.records()[0].total, None);
        assert_eq!(tables.records()[0].normalized, None);
    }

    #[test]
    fn unclassified_workbook_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let mut tables = RunningTables::new(
            vec![record("1_2_A-ST,-B-ST_20150101.XLS")],
            outputs(dir.path()),
        );
        let workbook = Workbook::new(vec![Worksheet::new("Cars", vec![])]);
        let factor = NormalizationFactor::new(2.0).unwrap();
        process_workbook(&mut tables, 0, &workbook, &factor).unwrap();

        let summary = tables.finalize().unwrap();
        assert_eq!(summary.missing, 1);
        assert_eq!(summary.processed, 0);
        assert_eq!(summary.count_rows, 0);
        assert!(dir.path().join("all_joined.csv").exists());
    }

    #[test]
    fn totals_from_an_earlier_run_are_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let mut stale = record("1_2_A-ST,-B-ST_20150101.XLS");
        stale.total = Some(500.0);
        stale.normalized = Some(3);
        let mut tables = RunningTables::new(vec![stale], outputs(dir.path()));
        let workbook = Workbook::new(vec![Worksheet::new("Cars", vec![])]);
        let factor = NormalizationFactor::new(2.0).unwrap();
        process_workbook(&mut tables, 0, &workbook, &factor).unwrap();

        assert_eq!(tables.records()[0].total, None);
        assert_eq!(tables.records()[0].normalized, None);
    }

    #[test]
    fn rejected_files_are_missing() {
        let dir = tempfile::tempdir().unwrap();
        let mut tables = RunningTables::new(vec![], outputs(dir.path()));
        tables.mark_rejected(2);
        let summary = tables.finalize().unwrap();
        assert_eq!(summary.files, 2);
        assert_eq!(summary.missing, 2);
        assert_eq!(summary.processed, 0);
    }
}
