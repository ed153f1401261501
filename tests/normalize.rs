use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use tmc_counts::normalize::{
    average_hourly, daytime_total, HourlyRates, NormalizationFactor, WorkbookHourlyRates,
};
use tmc_counts::workbook::{CellValue, Workbook, WorkbookReader, Worksheet};
use tmc_counts::TmcError;

// Hourly counts looked up by path.
struct MockRates(HashMap<PathBuf, Vec<f64>>);

impl HourlyRates for MockRates {
    fn hourly_counts(&self, path: &Path) -> Result<Vec<f64>, TmcError> {
        self.0.get(path).cloned().ok_or_else(|| {
            TmcError::CannotOpenFile(io::Error::new(io::ErrorKind::NotFound, "no such ATR"))
        })
    }
}

struct SingleWorkbook(Workbook);

impl WorkbookReader for SingleWorkbook {
    fn open(&self, _path: &Path) -> Result<Workbook, TmcError> {
        Ok(self.0.clone())
    }
}

fn hours(from: u32) -> Vec<f64> {
    (from..from + 24).map(f64::from).collect()
}

#[test]
fn averages_of_two_files() {
    let averages = average_hourly(&[hours(1), hours(3)]);
    assert_eq!(averages, hours(2));
    assert_eq!(daytime_total(&averages), 154.0);
}

#[test]
fn factor_from_atr_files() {
    let rates = MockRates(HashMap::from([
        (PathBuf::from("atr/a.xls"), hours(1)),
        (PathBuf::from("atr/b.xls"), hours(3)),
    ]));
    let files = vec![PathBuf::from("atr/a.xls"), PathBuf::from("atr/b.xls")];
    let factor = NormalizationFactor::compute(&files, &rates).unwrap();
    assert_eq!(factor.value(), 154.0);
    assert_eq!(factor.normalize(1540.0), 10);
}

#[test]
fn no_atr_files_errs() {
    let rates = MockRates(HashMap::new());
    assert!(matches!(
        NormalizationFactor::compute(&[], &rates),
        Err(TmcError::NormalizationInput(_))
    ));
}

#[test]
fn unreadable_atr_file_errs() {
    let rates = MockRates(HashMap::from([(PathBuf::from("atr/a.xls"), hours(1))]));
    let files = vec![PathBuf::from("atr/a.xls"), PathBuf::from("atr/missing.xls")];
    assert!(matches!(
        NormalizationFactor::compute(&files, &rates),
        Err(TmcError::NormalizationInput(_))
    ));
}

#[test]
fn all_zero_counts_errs() {
    let rates = MockRates(HashMap::from([(PathBuf::from("atr/a.xls"), vec![0.0; 24])]));
    assert!(NormalizationFactor::compute(&[PathBuf::from("atr/a.xls")], &rates).is_err());
}

#[test]
fn hourly_counts_from_atr_workbook() {
    let t = |v: &str| CellValue::from(v);
    let n = CellValue::Number;

    let mut rows = vec![vec![t("Time"), t("NB"), t("SB"), t("Total")]];
    for hour in 0..24 {
        rows.push(vec![t(&format!("{hour:02}:00")), n(1.0), n(2.0), n(3.0)]);
        rows.push(vec![t(&format!("{hour:02}:30")), n(1.0), n(1.0), n(2.0)]);
    }
    rows.push(vec![t("Total"), n(48.0), n(72.0), n(120.0)]);
    let workbook = Workbook::new(vec![Worksheet::new("ATR", rows)]);

    let rates = WorkbookHourlyRates::new(SingleWorkbook(workbook));
    let counts = rates.hourly_counts(Path::new("atr.xls")).unwrap();
    assert_eq!(counts, vec![5.0; 24]);
}

#[test]
fn hourly_counts_are_indexed_by_hour() {
    let t = |v: &str| CellValue::from(v);
    let n = CellValue::Number;

    // No row for 03:00.
    let mut rows = vec![vec![t("Time"), t("NB"), t("SB"), t("Total")]];
    for hour in (0..24).filter(|hour| *hour != 3) {
        let count = f64::from(hour);
        rows.push(vec![t(&format!("{hour:02}:00")), n(count), n(0.0), n(count)]);
    }
    rows.push(vec![t("Total"), n(0.0), n(0.0), n(0.0)]);
    let workbook = Workbook::new(vec![Worksheet::new("ATR", rows)]);

    let rates = WorkbookHourlyRates::new(SingleWorkbook(workbook));
    let counts = rates.hourly_counts(Path::new("atr.xls")).unwrap();
    assert_eq!(counts.len(), 24);
    assert_eq!(counts[3], 0.0);
    assert_eq!(counts[4], 4.0);
    assert_eq!(counts[7], 7.0);
    assert_eq!(counts[17], 17.0);
    assert_eq!(counts[23], 23.0);
}
