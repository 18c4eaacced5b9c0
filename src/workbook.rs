use std::io::Cursor;

use calamine::{Data, Reader};

use crate::error::ParseError;

/// A single worksheet as a grid of cells. Row 0 is the first non-empty row
/// calamine reports for the sheet; `origin` is that row's 0-based index in
/// the worksheet.
#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<Data>>,
    pub origin: usize,
}

impl Sheet {
    pub fn new(name: &str, rows: Vec<Vec<Data>>) -> Self {
        Self {
            name: name.to_string(),
            rows,
            origin: 0,
        }
    }

    /// Locate a named column in `header`, comparing trimmed cell text.
    pub fn column(&self, header: &[Data], column: &str) -> Result<usize, ParseError> {
        header
            .iter()
            .position(|cell| cell_text(cell).trim() == column)
            .ok_or_else(|| ParseError::MissingColumn {
                sheet: self.name.clone(),
                column: column.to_string(),
            })
    }
}

/// In-memory spreadsheet, loaded once per upload.
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn from_sheets(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }

    /// Load an xlsx/xls/ods file from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ParseError> {
        let cursor = Cursor::new(bytes.to_vec());
        let mut workbook = calamine::open_workbook_auto_from_rs(cursor)
            .map_err(|e| ParseError::Unreadable(e.to_string()))?;

        let mut sheets = Vec::new();
        for name in workbook.sheet_names() {
            let range = workbook
                .worksheet_range(&name)
                .map_err(|e| ParseError::Unreadable(format!("{name}: {e}")))?;
            let rows = range.rows().map(|r| r.to_vec()).collect();
            let origin = range.start().map(|(row, _)| row as usize).unwrap_or(0);
            sheets.push(Sheet {
                origin,
                ..Sheet::new(&name, rows)
            });
        }
        Ok(Self::from_sheets(sheets))
    }

    /// Exact name first, then a case-insensitive match.
    pub fn sheet(&self, name: &str) -> Result<&Sheet, ParseError> {
        self.sheets
            .iter()
            .find(|s| s.name == name)
            .or_else(|| self.sheets.iter().find(|s| s.name.eq_ignore_ascii_case(name)))
            .ok_or_else(|| ParseError::MissingSheet(name.to_string()))
    }
}

pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn is_blank_row(row: &[Data]) -> bool {
    row.iter().all(|c| match c {
        Data::Empty => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    })
}
