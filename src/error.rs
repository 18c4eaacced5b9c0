use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarketbookError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("{0}")]
    Parse(#[from] ParseError),

    #[error("No store account assigned to {0}")]
    MissingAssignment(String),

    #[error("Could not save {store_account_id} on {date}: {reason}")]
    Persistence {
        store_account_id: String,
        date: chrono::NaiveDate,
        reason: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Settings error: {0}")]
    Settings(String),
}

/// Structural problems with an uploaded spreadsheet. Any of these empties the
/// file's result; sibling files in the same batch are unaffected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unsupported platform: {0}")]
    UnknownPlatform(String),

    #[error("Unreadable spreadsheet: {0}")]
    Unreadable(String),

    #[error("Sheet '{0}' not found")]
    MissingSheet(String),

    #[error("No header row containing '{marker}' in sheet '{sheet}'")]
    MissingHeader { sheet: String, marker: String },

    #[error("Column '{column}' not found in sheet '{sheet}'")]
    MissingColumn { sheet: String, column: String },
}

/// A single cell that could not be read as a date or an amount.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("row {row}: cannot read '{column}' from {value:?}")]
pub struct CoercionError {
    pub row: usize,
    pub column: String,
    pub value: String,
}

pub type Result<T> = std::result::Result<T, MarketbookError>;
