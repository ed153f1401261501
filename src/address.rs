//! Get the intersection and date of a TMC from its filename, and geocode the intersection.
//!
//! Geocoded results are cached in `geocoded_tmcs.csv`. If that file exists, it is used as-is
//! and nothing is geocoded; delete it to geocode again.
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use chrono::NaiveDate;
use log::{info, warn};
use regex::Regex;

use crate::geocode::Geocoder;
use crate::tables::{read_csv, write_csv, TmcRecord};
use crate::{ParseProblem, TmcError};

const CITY: &str = "Boston, MA";

/// Layouts tried, in order, when parsing the date at the end of a filename.
const DATE_FORMATS: [&str; 14] = [
    "%Y%m%d",
    "%Y-%m-%d",
    "%Y.%m.%d",
    "%m%d%Y",
    "%m-%d-%Y",
    "%m/%d/%Y",
    "%m.%d.%Y",
    "%m-%d-%y",
    "%m/%d/%y",
    "%d-%b-%Y",
    "%d %b %Y",
    "%b %d %Y",
    "%B %d %Y",
    "%B %d, %Y",
];

static EXTENSION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\.xlsx?$").unwrap());

/// An intersection, as resolved by the geocoder.
///
/// All fields are `None` when the filename doesn't name two streets or geocoding fails.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResolvedAddress {
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Get the street names from a filename, e.g. `6822_86_BERKELEY-ST,-NEWBURY-ST_20150101.XLS`
/// gives `["BERKELEY ST", "NEWBURY ST"]`.
pub fn parse_streets(filename: &str) -> Result<Vec<String>, TmcError> {
    let intersection = filename
        .split('_')
        .nth(2)
        .ok_or_else(|| TmcError::parse(ParseProblem::TooFewParts, filename))?;

    Ok(intersection
        .split(',')
        .map(|street| {
            let street = street.replace('-', " ");
            match street.strip_prefix(' ') {
                Some(v) => v.to_string(),
                None => street,
            }
        })
        .collect())
}

/// The query sent to the geocoder, if there are at least two streets.
pub fn geocode_query(streets: &[String]) -> Option<String> {
    match streets {
        [first, second, ..] => Some(format!("{first} and {second} {CITY}")),
        _ => None,
    }
}

/// Resolve the intersection named in a filename.
///
/// A failed or unmatched geocode is logged and results in no coordinates, rather than an error.
pub fn find_address(filename: &str, geocoder: &dyn Geocoder) -> Result<ResolvedAddress, TmcError> {
    let streets = parse_streets(filename)?;
    let Some(query) = geocode_query(&streets) else {
        warn!("{filename}: fewer than two streets found, not geocoded");
        return Ok(ResolvedAddress::default());
    };

    match geocoder.geocode(&query) {
        Ok(Some(v)) => Ok(ResolvedAddress {
            address: Some(v.address.unwrap_or(query)),
            latitude: Some(v.latitude),
            longitude: Some(v.longitude),
        }),
        Ok(None) => {
            warn!("{filename}: no geocoding match for '{query}'");
            Ok(ResolvedAddress::default())
        }
        Err(e) => {
            warn!("{filename}: geocoding '{query}' failed: {e}");
            Ok(ResolvedAddress::default())
        }
    }
}

/// Get the date from the last underscore-separated part of a filename.
pub fn find_date(filename: &str) -> Result<NaiveDate, TmcError> {
    let stem = EXTENSION.replace(filename, "");
    let date = stem.rsplit('_').next().unwrap_or_default().trim();

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date, format).ok())
        .ok_or_else(|| TmcError::parse(ParseProblem::InvalidDate(date.to_string()), filename))
}

/// Names of the TMC workbooks in a directory, sorted.
pub fn list_tmc_files(dir: &Path) -> Result<Vec<String>, TmcError> {
    let mut filenames = vec![];
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let is_workbook = path.extension().is_some_and(|ext| {
            ext.eq_ignore_ascii_case("xls") || ext.eq_ignore_ascii_case("xlsx")
        });
        if !is_workbook {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|v| v.to_str()) {
            filenames.push(name.to_string());
        }
    }
    filenames.sort();
    Ok(filenames)
}

/// The geocoded TMCs, and how many workbooks were left out because their filenames couldn't be
/// parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedTmcs {
    pub records: Vec<TmcRecord>,
    pub rejected: usize,
}

/// Get the geocoded TMCs, from the cache if it exists, otherwise by geocoding every workbook in
/// `tmc_dir` and writing the cache.
///
/// A workbook whose filename doesn't give an intersection and a date is logged and left out;
/// it doesn't stop the others from being geocoded.
pub fn get_geocoded(
    tmc_dir: &Path,
    cache: &Path,
    geocoder: &dyn Geocoder,
) -> Result<GeocodedTmcs, TmcError> {
    if cache.exists() {
        info!("Reading geocoded TMCs from {cache:?}");
        let records: Vec<TmcRecord> = read_csv(cache)?;
        let rejected = check_cache_complete(&records, tmc_dir);
        info!("Read in data from {} records", records.len());
        return Ok(GeocodedTmcs { records, rejected });
    }

    info!("No geocoded TMCs found, generating");
    let mut records = vec![];
    let mut rejected = 0;
    for filename in list_tmc_files(tmc_dir)? {
        match tmc_record(filename, geocoder) {
            Ok(v) => records.push(v),
            Err(e @ TmcError::Parse { .. }) => {
                warn!("Skipping {e}");
                rejected += 1;
            }
            Err(e) => return Err(e),
        }
    }
    write_csv(cache, &records)?;
    info!(
        "Geocoded {} TMCs ({rejected} skipped), written to {cache:?}",
        records.len()
    );
    Ok(GeocodedTmcs { records, rejected })
}

fn tmc_record(filename: String, geocoder: &dyn Geocoder) -> Result<TmcRecord, TmcError> {
    // Check the date first, so a file that will be skipped isn't geocoded.
    let date = find_date(&filename)?;
    let resolved = find_address(&filename, geocoder)?;
    Ok(TmcRecord {
        file: filename,
        address: resolved.address,
        latitude: resolved.latitude,
        longitude: resolved.longitude,
        date,
        total: None,
        normalized: None,
    })
}

/// The cache is trusted as-is, but warn when it doesn't cover the same number of files as are
/// in the TMC directory. Returns the number of workbooks whose filenames can't be parsed.
fn check_cache_complete(records: &[TmcRecord], tmc_dir: &Path) -> usize {
    let files = match list_tmc_files(tmc_dir) {
        Ok(v) => v,
        Err(e) => {
            warn!("Unable to check geocoded TMC cache against {tmc_dir:?}: {e}");
            return 0;
        }
    };
    let rejected = files
        .iter()
        .filter(|filename| parse_streets(filename).is_err() || find_date(filename).is_err())
        .count();
    if files.len() - rejected != records.len() {
        warn!(
            "Geocoded TMC cache has {} records but {tmc_dir:?} has {} usable workbooks; \
            delete the cache to regenerate it",
            records.len(),
            files.len() - rejected
        );
    }
    rejected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streets_have_hyphens_and_leading_space_replaced() {
        let streets = parse_streets("7538_1378_ARLINGTON-ST, -BOYLSTON-ST_20150311.XLS").unwrap();
        // only one leading space is stripped
        assert_eq!(streets, vec!["ARLINGTON ST", " BOYLSTON ST"]);
    }

    #[test]
    fn too_few_parts_errs() {
        assert!(matches!(
            parse_streets("6822_86.XLS"),
            Err(TmcError::Parse {
                problem: ParseProblem::TooFewParts,
                ..
            })
        ));
    }

    #[test]
    fn one_street_has_no_query() {
        let streets = parse_streets("1_2_MASSACHUSETTS-AVE_20150101.XLS").unwrap();
        assert_eq!(geocode_query(&streets), None);
    }

    #[test]
    fn only_first_two_streets_are_queried() {
        let streets = vec!["A ST".to_string(), "B ST".to_string(), "C ST".to_string()];
        assert_eq!(
            geocode_query(&streets),
            Some("A ST and B ST Boston, MA".to_string())
        );
    }

    #[test]
    fn dates_in_several_layouts() {
        let expected = NaiveDate::from_ymd_opt(2015, 3, 11).unwrap();
        for filename in [
            "1_2_A-ST,-B-ST_20150311.XLS",
            "1_2_A-ST,-B-ST_2015-03-11.xls",
            "1_2_A-ST,-B-ST_03-11-2015.XLS",
            "1_2_A-ST,-B-ST_11-Mar-2015.XLS",
            "1_2_A-ST,-B-ST_March 11 2015.XLSX",
        ] {
            assert_eq!(find_date(filename).unwrap(), expected, "{filename}");
        }
    }

    #[test]
    fn bad_date_errs() {
        assert!(matches!(
            find_date("1_2_A-ST,-B-ST_SOMETIME.XLS"),
            Err(TmcError::Parse {
                problem: ParseProblem::InvalidDate(_),
                ..
            })
        ));
    }
}
