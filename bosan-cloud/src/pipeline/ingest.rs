//! Spreadsheet ingest
//!
//! Turns an uploaded workbook into validated rows. The grid abstraction
//! keeps row validation testable without binary workbook fixtures: the
//! handler calls [`read_grid`] on the upload, tests build grids directly.
//!
//! Row numbers in every error message refer to the spreadsheet as the
//! uploader sees it: row 1 is the header, the first data row is row 2.

use calamine::{Data, Reader, open_workbook_auto_from_rs};

use shared::models::member::EMAIL_RE;
use shared::util::current_year;
use shared::{AppError, ErrorCode};

/// Column headers every import sheet must carry.
pub const REQUIRED_HEADERS: [&str; 4] = ["callUpNumber", "name", "fullName", "email"];

/// One spreadsheet cell, decoupled from the workbook parser.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Cell {
    /// Render the cell as trimmed text; blank cells yield `None`.
    /// Whole numbers render without a decimal point, so a numeric-typed
    /// call-up column imports as `131`, not `131.0`.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) => {
                let t = s.trim();
                (!t.is_empty()).then(|| t.to_string())
            }
            Cell::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    Some(format!("{}", *n as i64))
                } else {
                    Some(n.to_string())
                }
            }
            Cell::Bool(b) => Some(b.to_string()),
        }
    }

    /// Interpret the cell as a number, accepting numeric text.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty | Data::Error(_) => Cell::Empty,
            Data::String(s) => Cell::Text(s.clone()),
            Data::Float(f) => Cell::Number(*f),
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Bool(b) => Cell::Bool(*b),
            Data::DateTime(dt) => Cell::Number(dt.as_f64()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        }
    }
}

/// Ingest failures that abort the whole import.
#[derive(Debug, thiserror::Error)]
pub enum SheetError {
    #[error("Invalid file type - Please upload an Excel file")]
    UnsupportedFileType { file_name: String },
    #[error("Unable to read spreadsheet: {0}")]
    Unreadable(String),
    #[error("Spreadsheet file appears to be empty")]
    EmptyInput { rows_found: usize },
    #[error("Missing required columns in spreadsheet: {}", missing.join(", "))]
    MissingColumns {
        missing: Vec<String>,
        found: Vec<String>,
    },
    #[error("No valid rows found after validation")]
    NoValidRows { errors: Vec<String> },
}

impl From<SheetError> for AppError {
    fn from(err: SheetError) -> Self {
        match err {
            SheetError::UnsupportedFileType { file_name } => {
                AppError::new(ErrorCode::UnsupportedFileType)
                    .with_detail("receivedFile", file_name)
                    .with_hint("Please upload an Excel file (.xlsx or .xls)")
            }
            SheetError::Unreadable(msg) => {
                AppError::with_message(ErrorCode::InvalidFormat, msg)
                    .with_hint("Please ensure the file is a valid Excel workbook and try again")
            }
            SheetError::EmptyInput { rows_found } => AppError::new(ErrorCode::SpreadsheetEmpty)
                .with_detail("rowsFound", rows_found)
                .with_hint("Please ensure the file contains data rows below the header row"),
            SheetError::MissingColumns { missing, found } => {
                AppError::with_message(
                    ErrorCode::MissingColumns,
                    format!("Missing required columns in spreadsheet: {}", missing.join(", ")),
                )
                .with_detail("missingColumns", missing)
                .with_detail("foundColumns", found)
                .with_hint(format!("Required columns: {}", REQUIRED_HEADERS.join(", ")))
            }
            SheetError::NoValidRows { errors } => {
                let total = errors.len();
                let sample: Vec<String> = errors.into_iter().take(10).collect();
                AppError::new(ErrorCode::NoValidRows)
                    .with_detail("validationErrors", sample)
                    .with_detail("totalErrors", total)
            }
        }
    }
}

/// A data row as read from the sheet, before validation.
///
/// Rows without a call-up number never get this far: they are dropped
/// during parsing, not reported as validation errors.
#[derive(Debug, Clone)]
pub struct RawRow {
    /// 1-based spreadsheet row number (header is row 1).
    pub row_number: usize,
    pub call_up_number: String,
    pub name: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub legacy_id: Option<String>,
    pub elevation_year: Option<Cell>,
    pub debit_balance: Option<Cell>,
}

/// A row that passed validation.
#[derive(Debug, Clone)]
pub struct ValidRow {
    pub row_number: usize,
    pub call_up_number: String,
    pub name: String,
    pub full_name: String,
    pub email: String,
    pub legacy_id: Option<String>,
    pub elevation_year: Option<i32>,
    pub debit_balance: Option<f64>,
}

/// Decode an uploaded workbook into a cell grid.
///
/// Only the first worksheet is read.
pub fn read_grid(bytes: &[u8], file_name: &str) -> Result<Vec<Vec<Cell>>, SheetError> {
    let lower = file_name.to_lowercase();
    if !lower.ends_with(".xlsx") && !lower.ends_with(".xls") {
        return Err(SheetError::UnsupportedFileType {
            file_name: file_name.to_string(),
        });
    }

    let cursor = std::io::Cursor::new(bytes.to_vec());
    let mut workbook =
        open_workbook_auto_from_rs(cursor).map_err(|e| SheetError::Unreadable(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or(SheetError::EmptyInput { rows_found: 0 })?
        .map_err(|e| SheetError::Unreadable(e.to_string()))?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(Cell::from).collect())
        .collect())
}

/// Map the header row and extract data rows. Rows that are entirely
/// blank, or that carry no call-up number at all, are dropped; everything
/// else is kept for validation.
pub fn parse_rows(grid: &[Vec<Cell>]) -> Result<Vec<RawRow>, SheetError> {
    let Some(header_row) = grid.first() else {
        return Err(SheetError::EmptyInput { rows_found: 0 });
    };

    let headers: Vec<Option<String>> = header_row.iter().map(Cell::as_text).collect();
    let col = |name: &str| {
        headers
            .iter()
            .position(|h| h.as_deref() == Some(name))
    };

    let missing: Vec<String> = REQUIRED_HEADERS
        .iter()
        .filter(|name| col(name).is_none())
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(SheetError::MissingColumns {
            missing,
            found: headers.iter().flatten().cloned().collect(),
        });
    }

    let call_up_col = col("callUpNumber").unwrap();
    let name_col = col("name").unwrap();
    let full_name_col = col("fullName").unwrap();
    let email_col = col("email").unwrap();
    // Older export sheets carry the legacy identifier under a bare `id`
    // header; accept both spellings.
    let legacy_col = col("legacyId").or_else(|| col("id"));
    let year_col = col("elevationYear");
    let balance_col = col("debitBalance");

    let cell = |row: &[Cell], idx: usize| row.get(idx).cloned().unwrap_or(Cell::Empty);
    let opt_cell = |row: &[Cell], idx: Option<usize>| {
        idx.map(|i| cell(row, i)).filter(|c| !c.is_blank())
    };

    let rows: Vec<RawRow> = grid[1..]
        .iter()
        .enumerate()
        .filter(|(_, row)| row.iter().any(|c| !c.is_blank()))
        .filter_map(|(i, row)| {
            let call_up_number = cell(row, call_up_col).as_text()?;
            Some(RawRow {
                row_number: i + 2,
                call_up_number,
                name: cell(row, name_col).as_text(),
                full_name: cell(row, full_name_col).as_text(),
                email: cell(row, email_col).as_text(),
                legacy_id: legacy_col.and_then(|c| cell(row, c).as_text()),
                elevation_year: opt_cell(row, year_col),
                debit_balance: opt_cell(row, balance_col),
            })
        })
        .collect();

    if rows.is_empty() {
        return Err(SheetError::EmptyInput {
            rows_found: grid.len().saturating_sub(1),
        });
    }

    Ok(rows)
}

/// Validate rows field by field.
///
/// Returns the surviving rows together with the per-row error messages for
/// the rest; fails only when nothing survives.
pub fn validate_rows(rows: Vec<RawRow>) -> Result<(Vec<ValidRow>, Vec<String>), SheetError> {
    let year_ceiling = current_year();
    let mut valid = Vec::new();
    let mut errors = Vec::new();

    for row in rows {
        let n = row.row_number;
        let mut row_errors = Vec::new();

        if row.name.is_none() {
            row_errors.push(format!("Row {n}: Name is required"));
        }
        if row.full_name.is_none() {
            row_errors.push(format!("Row {n}: Full Name is required"));
        }
        match &row.email {
            None => row_errors.push(format!("Row {n}: Email is required")),
            Some(email) if !EMAIL_RE.is_match(email) => {
                row_errors.push(format!("Row {n}: Invalid email format"));
            }
            Some(_) => {}
        }

        let elevation_year = match &row.elevation_year {
            None => None,
            Some(cell) => match cell.as_number() {
                Some(y) if y.fract() == 0.0 && (1900.0..=f64::from(year_ceiling)).contains(&y) => {
                    Some(y as i32)
                }
                _ => {
                    row_errors.push(format!("Row {n}: Invalid elevation year"));
                    None
                }
            },
        };

        let debit_balance = match &row.debit_balance {
            None => None,
            Some(cell) => match cell.as_number() {
                Some(b) if b >= 0.0 => Some(b),
                _ => {
                    row_errors.push(format!("Row {n}: Debit balance cannot be negative"));
                    None
                }
            },
        };

        if row_errors.is_empty() {
            valid.push(ValidRow {
                row_number: n,
                call_up_number: row.call_up_number,
                name: row.name.unwrap(),
                full_name: row.full_name.unwrap(),
                email: row.email.unwrap(),
                legacy_id: row.legacy_id,
                elevation_year,
                debit_balance,
            });
        } else {
            errors.extend(row_errors);
        }
    }

    if valid.is_empty() {
        return Err(SheetError::NoValidRows { errors });
    }

    Ok((valid, errors))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> Cell {
        Cell::Text(s.into())
    }

    fn header() -> Vec<Cell> {
        vec![
            t("callUpNumber"),
            t("name"),
            t("fullName"),
            t("email"),
            t("elevationYear"),
            t("debitBalance"),
        ]
    }

    fn data_row(call_up: &str, name: &str, email: &str) -> Vec<Cell> {
        vec![
            t(call_up),
            t(name),
            t(&format!("{name}, SAN")),
            t(email),
            Cell::Number(2004.0),
            Cell::Number(0.0),
        ]
    }

    #[test]
    fn test_numeric_cells_render_without_decimals() {
        assert_eq!(Cell::Number(131.0).as_text().as_deref(), Some("131"));
        assert_eq!(Cell::Number(131.5).as_text().as_deref(), Some("131.5"));
        assert_eq!(Cell::Text("  padded  ".into()).as_text().as_deref(), Some("padded"));
        assert_eq!(Cell::Text("   ".into()).as_text(), None);
    }

    #[test]
    fn test_missing_columns_rejected() {
        let grid = vec![vec![t("callUpNumber"), t("name"), t("email")]];
        match parse_rows(&grid) {
            Err(SheetError::MissingColumns { missing, .. }) => {
                assert_eq!(missing, vec!["fullName".to_string()]);
            }
            other => panic!("expected MissingColumns, got {other:?}"),
        }
    }

    #[test]
    fn test_header_only_sheet_is_empty() {
        let grid = vec![header()];
        assert!(matches!(
            parse_rows(&grid),
            Err(SheetError::EmptyInput { rows_found: 0 })
        ));
    }

    #[test]
    fn test_blank_rows_dropped_but_numbering_preserved() {
        let grid = vec![
            header(),
            data_row("131", "A. Bello", "a@example.org"),
            vec![Cell::Empty, t("  "), Cell::Empty],
            data_row("132", "B. Okoro", "b@example.org"),
        ];
        let rows = parse_rows(&grid).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].row_number, 2);
        // The blank row still occupies row 3 in the sheet.
        assert_eq!(rows[1].row_number, 4);
    }

    #[test]
    fn test_rows_without_call_up_number_are_dropped() {
        let mut no_call_up = data_row("", "B. Okoro", "b@example.org");
        no_call_up[0] = Cell::Empty;
        let grid = vec![
            header(),
            data_row("131", "A. Bello", "a@example.org"),
            no_call_up,
        ];
        let rows = parse_rows(&grid).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].call_up_number, "131");
    }

    #[test]
    fn test_sheet_with_no_call_up_numbers_is_empty() {
        let mut no_call_up = data_row("", "B. Okoro", "b@example.org");
        no_call_up[0] = t("  ");
        let grid = vec![header(), no_call_up];
        assert!(matches!(
            parse_rows(&grid),
            Err(SheetError::EmptyInput { rows_found: 1 })
        ));
    }

    #[test]
    fn test_bare_id_header_maps_to_legacy_id() {
        let grid = vec![
            vec![t("id"), t("callUpNumber"), t("name"), t("fullName"), t("email")],
            vec![
                t("L-77"),
                t("131"),
                t("A. Bello"),
                t("Abubakar Bello, SAN"),
                t("a@example.org"),
            ],
        ];
        let rows = parse_rows(&grid).unwrap();
        assert_eq!(rows[0].legacy_id.as_deref(), Some("L-77"));
    }

    #[test]
    fn test_validation_messages_carry_row_numbers() {
        let grid = vec![
            header(),
            data_row("131", "A. Bello", "a@example.org"),
            data_row("132", "B. Okoro", "not-an-email"),
            vec![t("133"), Cell::Empty, t("C. Musa, SAN"), t("c@example.org")],
        ];
        let rows = parse_rows(&grid).unwrap();
        let (valid, errors) = validate_rows(rows).unwrap();
        assert_eq!(valid.len(), 1);
        assert_eq!(
            errors,
            vec![
                "Row 3: Invalid email format".to_string(),
                "Row 4: Name is required".to_string(),
            ]
        );
    }

    #[test]
    fn test_elevation_year_bounds() {
        let mut future = data_row("131", "A. Bello", "a@example.org");
        future[4] = Cell::Number(f64::from(current_year() + 1));
        let mut text_year = data_row("132", "B. Okoro", "b@example.org");
        text_year[4] = t("two thousand");
        let ok = data_row("133", "C. Musa", "c@example.org");

        let grid = vec![header(), future, text_year, ok];
        let (valid, errors) = validate_rows(parse_rows(&grid).unwrap()).unwrap();
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].call_up_number, "133");
        assert_eq!(
            errors,
            vec![
                "Row 2: Invalid elevation year".to_string(),
                "Row 3: Invalid elevation year".to_string(),
            ]
        );
    }

    #[test]
    fn test_negative_balance_rejected() {
        let mut bad = data_row("131", "A. Bello", "a@example.org");
        bad[5] = Cell::Number(-25.0);
        let grid = vec![header(), bad, data_row("132", "B. Okoro", "b@example.org")];
        let (valid, errors) = validate_rows(parse_rows(&grid).unwrap()).unwrap();
        assert_eq!(valid.len(), 1);
        assert_eq!(
            errors,
            vec!["Row 2: Debit balance cannot be negative".to_string()]
        );
    }

    #[test]
    fn test_all_rows_invalid_fails() {
        let grid = vec![header(), data_row("131", "A. Bello", "broken")];
        let rows = parse_rows(&grid).unwrap();
        match validate_rows(rows) {
            Err(SheetError::NoValidRows { errors }) => {
                assert_eq!(errors.len(), 1);
            }
            other => panic!("expected NoValidRows, got {other:?}"),
        }
    }

    #[test]
    fn test_unsupported_extension() {
        assert!(matches!(
            read_grid(b"not a workbook", "members.csv"),
            Err(SheetError::UnsupportedFileType { .. })
        ));
    }

    #[test]
    fn test_garbage_xlsx_is_unreadable() {
        assert!(matches!(
            read_grid(b"definitely not a zip archive", "members.xlsx"),
            Err(SheetError::Unreadable(_))
        ));
    }
}
