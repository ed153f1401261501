//! Spreadsheet cells, sheets, and workbooks, independent of the file format they came from.
//!
//! Cell coordinates are absolute: row 0/column 0 is A1 even when the underlying file's used
//! range starts further down or to the right.
use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader};

use crate::TmcError;

static EMPTY: CellValue = CellValue::Empty;

/// The value of a single cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
}

impl CellValue {
    /// The cell as text; whole numbers are written without a decimal point.
    pub fn text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(v) => v.clone(),
            CellValue::Number(v) if v.fract() == 0.0 && v.abs() < 1e15 => {
                format!("{}", *v as i64)
            }
            CellValue::Number(v) => v.to_string(),
        }
    }

    /// The cell as a number, if it is one or is text that parses as one.
    pub fn number(&self) -> Option<f64> {
        match self {
            CellValue::Empty => None,
            CellValue::Text(v) => v.trim().parse().ok(),
            CellValue::Number(v) => Some(*v),
        }
    }

    /// True for empty cells and empty strings.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(v) => v.is_empty(),
            CellValue::Number(_) => false,
        }
    }
}

impl From<&Data> for CellValue {
    fn from(data: &Data) -> Self {
        match data {
            Data::Int(v) => CellValue::Number(*v as f64),
            Data::Float(v) => CellValue::Number(*v),
            Data::String(v) => CellValue::Text(v.clone()),
            Data::Bool(v) => CellValue::Number(if *v { 1.0 } else { 0.0 }),
            Data::DateTime(v) => CellValue::Number(v.as_f64()),
            Data::DateTimeIso(v) | Data::DurationIso(v) => CellValue::Text(v.clone()),
            Data::Error(_) | Data::Empty => CellValue::Empty,
        }
    }
}

impl From<&str> for CellValue {
    fn from(v: &str) -> Self {
        if v.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(v.to_string())
        }
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        CellValue::Number(v)
    }
}

/// A single worksheet.
#[derive(Debug, Clone, PartialEq)]
pub struct Worksheet {
    name: String,
    rows: Vec<Vec<CellValue>>,
    ncols: usize,
}

impl Worksheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let ncols = rows.iter().map(|row| row.len()).max().unwrap_or(0);
        Self {
            name: name.into(),
            rows,
            ncols,
        }
    }

    /// Create from a calamine range, padding so that coordinates are absolute.
    pub fn from_range(name: impl Into<String>, range: &Range<Data>) -> Self {
        let (row_offset, col_offset) = range
            .start()
            .map_or((0, 0), |(r, c)| (r as usize, c as usize));

        let mut rows = vec![Vec::new(); row_offset];
        for row in range.rows() {
            let mut cells = vec![CellValue::Empty; col_offset];
            cells.extend(row.iter().map(CellValue::from));
            rows.push(cells);
        }
        Self::new(name, rows)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// The cell at `row`/`col`; anything outside the sheet is empty.
    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY)
    }

    /// Cells of column `col` from `start_row` up to, but not including, `end_row`.
    pub fn col_values(&self, col: usize, start_row: usize, end_row: usize) -> Vec<&CellValue> {
        (start_row..end_row).map(|row| self.cell(row, col)).collect()
    }
}

/// All worksheets of a file, in file order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Workbook {
    sheets: Vec<Worksheet>,
}

impl Workbook {
    pub fn new(sheets: Vec<Worksheet>) -> Self {
        Self { sheets }
    }

    pub fn sheets(&self) -> &[Worksheet] {
        &self.sheets
    }

    /// Lower-cased sheet names, which is how sheets are classified and looked up.
    pub fn lower_sheet_names(&self) -> Vec<String> {
        self.sheets
            .iter()
            .map(|sheet| sheet.name().to_lowercase())
            .collect()
    }

    /// Find a sheet by its lower-cased name.
    pub fn sheet_by_lower_name(&self, name: &str) -> Option<&Worksheet> {
        self.sheets
            .iter()
            .find(|sheet| sheet.name().to_lowercase() == name)
    }
}

/// Something that can load a workbook from a path.
pub trait WorkbookReader {
    fn open(&self, path: &Path) -> Result<Workbook, TmcError>;
}

/// Reads .xls, .xlsx, and .ods files.
#[derive(Debug, Clone, Copy, Default)]
pub struct CalamineReader;

impl WorkbookReader for CalamineReader {
    fn open(&self, path: &Path) -> Result<Workbook, TmcError> {
        let mut workbook = open_workbook_auto(path)?;
        let mut sheets = vec![];
        for name in workbook.sheet_names() {
            let range = workbook.worksheet_range(&name)?;
            sheets.push(Worksheet::from_range(name, &range));
        }
        Ok(Workbook::new(sheets))
    }
}
