//! The tables written to (and read from) CSV.
//!
//!   - [`TmcRecord`] - one row per TMC file (`geocoded_tmcs.csv`)
//!   - [`CountRow`] - one row per time period of an extracted sheet (`all_data.csv`)
//!   - [`DataInfoRecord`] - one row per extracted sheet (`data_info.csv`)
//!   - [`JoinedRow`] - [`CountRow`] joined to its [`DataInfoRecord`] (`all_joined.csv`)
use std::fs::{self, File};
use std::path::Path;

use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::TmcError;

/// A TMC file, where it is, and (once processed) its total and normalized counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TmcRecord {
    #[serde(rename = "File")]
    pub file: String,
    #[serde(rename = "Address")]
    pub address: Option<String>,
    #[serde(rename = "Latitude")]
    pub latitude: Option<f64>,
    #[serde(rename = "Longitude")]
    pub longitude: Option<f64>,
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Total", default)]
    pub total: Option<f64>,
    #[serde(rename = "Normalized", default)]
    pub normalized: Option<i64>,
}

impl TmcRecord {
    /// Coordinates as (latitude, longitude), if the address was geocoded.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some((lat, lng)),
            _ => None,
        }
    }
}

/// Counts in each direction for one time period of a sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountRow {
    pub times: String,
    pub east: Option<f64>,
    pub south: Option<f64>,
    pub west: Option<f64>,
    pub north: Option<f64>,
    pub data_id: u32,
}

/// Description of an extracted sheet; `id` is referenced by [`CountRow::data_id`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataInfoRecord {
    pub id: u32,
    pub address: Option<String>,
    pub date: NaiveDate,
    /// Street name on the east leg of the intersection.
    pub east: String,
    pub south: String,
    pub west: String,
    pub north: String,
    /// Kind of traffic counted - motors, peds, bicycles.
    pub data_type: String,
    pub filename: String,
}

/// A count row with the description of its sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedRow {
    pub times: String,
    pub east: Option<f64>,
    pub south: Option<f64>,
    pub west: Option<f64>,
    pub north: Option<f64>,
    pub data_id: u32,
    pub id: u32,
    pub address: Option<String>,
    pub date: NaiveDate,
    pub east_street: String,
    pub south_street: String,
    pub west_street: String,
    pub north_street: String,
    pub data_type: String,
    pub filename: String,
}

impl JoinedRow {
    pub fn new(count: &CountRow, info: &DataInfoRecord) -> Self {
        Self {
            times: count.times.clone(),
            east: count.east,
            south: count.south,
            west: count.west,
            north: count.north,
            data_id: count.data_id,
            id: info.id,
            address: info.address.clone(),
            date: info.date,
            east_street: info.east.clone(),
            south_street: info.south.clone(),
            west_street: info.west.clone(),
            north_street: info.north.clone(),
            data_type: info.data_type.clone(),
            filename: info.filename.clone(),
        }
    }
}

/// Inner join of count rows to data info records on `data_id` = `id`.
pub fn join(counts: &[CountRow], info: &[DataInfoRecord]) -> Vec<JoinedRow> {
    counts
        .iter()
        .flat_map(|count| {
            info.iter()
                .filter(move |i| i.id == count.data_id)
                .map(move |i| JoinedRow::new(count, i))
        })
        .collect()
}

/// Read every record of a CSV file with a header row.
pub fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, TmcError> {
    let file = File::open(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file);
    let mut records = vec![];
    for result in rdr.deserialize() {
        records.push(result?);
    }
    Ok(records)
}

/// Write records to a CSV file (with header), replacing anything already there.
pub fn write_csv<T: Serialize>(path: &Path, records: &[T]) -> Result<(), TmcError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut wtr = csv::Writer::from_path(path)?;
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(id: u32, data_type: &str) -> DataInfoRecord {
        DataInfoRecord {
            id,
            address: Some("BERKELEY ST and NEWBURY ST Boston, MA".to_string()),
            date: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap(),
            east: "NEWBURY ST".to_string(),
            south: "BERKELEY ST".to_string(),
            west: "NEWBURY ST".to_string(),
            north: "BERKELEY ST".to_string(),
            data_type: data_type.to_string(),
            filename: "6822_86_BERKELEY-ST,-NEWBURY-ST_20150101.XLS".to_string(),
        }
    }

    fn count(data_id: u32, times: &str) -> CountRow {
        CountRow {
            times: times.to_string(),
            east: Some(1.0),
            south: Some(2.0),
            west: None,
            north: Some(4.0),
            data_id,
        }
    }

    #[test]
    fn join_matches_data_id_to_id() {
        let counts = vec![count(1, "07:00"), count(2, "07:00"), count(3, "07:00")];
        let info = vec![info(1, "motors"), info(2, "peds")];
        let joined = join(&counts, &info);
        assert_eq!(joined.len(), 2);
        assert_eq!(joined[0].data_type, "motors");
        assert_eq!(joined[1].data_type, "peds");
        assert!(joined.iter().all(|row| row.id == row.data_id));
    }

    #[test]
    fn tmc_record_reads_without_total_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geocoded_tmcs.csv");
        fs::write(
            &path,
            "File,Address,Latitude,Longitude,Date\n\
             \"a_b_C-ST,-D-ST_20150101.XLS\",\"C ST and D ST Boston, MA\",42.35,-71.07,2015-01-01\n\
             x_y_Z_20150102.XLS,,,,2015-01-02\n",
        )
        .unwrap();
        let records: Vec<TmcRecord> = read_csv(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].coordinates(), Some((42.35, -71.07)));
        assert_eq!(records[0].total, None);
        assert_eq!(records[1].address, None);
        assert_eq!(records[1].coordinates(), None);
    }

    #[test]
    fn tmc_records_survive_a_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed").join("geocoded_tmcs.csv");
        let records = vec![TmcRecord {
            file: "6822_86_BERKELEY-ST,-NEWBURY-ST_20150101.XLS".to_string(),
            address: Some("BERKELEY ST and NEWBURY ST Boston, MA".to_string()),
            latitude: Some(42.35),
            longitude: Some(-71.07),
            date: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap(),
            total: Some(1540.0),
            normalized: Some(10),
        }];
        write_csv(&path, &records).unwrap();
        let read: Vec<TmcRecord> = read_csv(&path).unwrap();
        assert_eq!(read, records);
    }
}
