//! Find where the count grid is in a sheet.
//!
//! The grid starts at the cell containing "time" (its header), and ends just before the
//! "total" row (when "tot" appears in the first column) or the "total" column (when it appears
//! anywhere else).
//!
//! Every cell is visited, column by column and top to bottom within each column. When more than
//! one cell matches, the last one visited wins.
use crate::workbook::Worksheet;
use crate::{ParseProblem, TmcError};

/// Bounding box of the count grid. End row and column are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLocation {
    pub start_column: usize,
    pub start_row: usize,
    pub end_column: usize,
    pub end_row: usize,
}

/// Locate the grid, falling back to the defaults for whatever markers are missing.
pub fn locate(sheet: &Worksheet) -> GridLocation {
    scan(sheet).0
}

/// Locate the grid, erring if there is no "time" header to start it from.
pub fn try_locate(sheet: &Worksheet) -> Result<GridLocation, TmcError> {
    match scan(sheet) {
        (location, true) => Ok(location),
        (_, false) => Err(TmcError::parse(
            ParseProblem::MissingTimeMarker {
                sheet: sheet.name().to_string(),
            },
            sheet.name(),
        )),
    }
}

fn scan(sheet: &Worksheet) -> (GridLocation, bool) {
    let mut location = GridLocation {
        start_column: 0,
        start_row: 0,
        end_column: sheet.ncols().saturating_sub(2),
        end_row: sheet.nrows().saturating_sub(2),
    };
    let mut found_time = false;

    for col in 0..sheet.ncols() {
        for row in 0..sheet.nrows() {
            let value = sheet.cell(row, col).text().to_lowercase();
            if value.contains("time") {
                location.start_column = col;
                location.start_row = row;
                found_time = true;
            }
            if value.contains("tot") {
                if col == 0 {
                    location.end_row = row.saturating_sub(1);
                } else {
                    location.end_column = col - 1;
                }
            }
        }
    }
    (location, found_time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::CellValue;

    fn sheet_with(cells: &[(usize, usize, &str)], nrows: usize, ncols: usize) -> Worksheet {
        let mut rows = vec![vec![CellValue::Empty; ncols]; nrows];
        for (row, col, text) in cells {
            rows[*row][*col] = CellValue::from(*text);
        }
        Worksheet::new("test", rows)
    }

    #[test]
    fn defaults_when_no_markers() {
        let sheet = sheet_with(&[], 10, 8);
        assert_eq!(
            locate(&sheet),
            GridLocation {
                start_column: 0,
                start_row: 0,
                end_column: 6,
                end_row: 8,
            }
        );
        assert!(try_locate(&sheet).is_err());
    }

    #[test]
    fn tiny_sheet_does_not_underflow() {
        let sheet = sheet_with(&[(0, 0, "Total")], 1, 1);
        let location = locate(&sheet);
        assert_eq!(location.end_row, 0);
        assert_eq!(location.end_column, 0);
    }

    #[test]
    fn last_time_marker_wins_in_column_major_order() {
        // (5, 0) is visited before (1, 2) because the scan is column by column.
        let sheet = sheet_with(&[(5, 0, "time"), (1, 2, "Start Time")], 10, 8);
        let location = locate(&sheet);
        assert_eq!(location.start_row, 1);
        assert_eq!(location.start_column, 2);
    }
}
