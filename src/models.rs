use std::path::Path;

use chrono::NaiveDate;

use crate::error::{CoercionError, Result};
use crate::platforms::Platform;

/// One uploaded spreadsheet, held in memory for the duration of a batch.
#[derive(Debug, Clone)]
pub struct RawUpload {
    pub file_name: String,
    pub content: Vec<u8>,
    pub platform_tag: String,
}

impl RawUpload {
    pub fn from_path(path: &Path, platform_tag: &str) -> Result<Self> {
        let content = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        Ok(Self {
            file_name,
            content,
            platform_tag: platform_tag.to_string(),
        })
    }
}

/// The store + sub-account a file's income belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreIdentity {
    pub store_name: String,
    pub account_name: String,
}

impl StoreIdentity {
    pub fn new(store_name: &str, account_name: &str) -> Self {
        Self {
            store_name: store_name.trim().to_string(),
            account_name: account_name.trim().to_string(),
        }
    }

    pub fn store_account_id(&self) -> String {
        format!("{}_{}", self.store_name, self.account_name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub date: NaiveDate,
    pub net_income: f64,
}

#[derive(Debug, Clone)]
pub struct ProcessedFile {
    pub file_name: String,
    pub platform: Platform,
    pub store: StoreIdentity,
    pub store_account_id: String,
    pub rows: Vec<NormalizedRow>,
    pub coercions: Vec<CoercionError>,
    pub checksum: String,
}

impl ProcessedFile {
    pub fn total(&self) -> f64 {
        self.rows.iter().map(|r| r.net_income).sum()
    }

    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.rows.first()?.date;
        let last = self.rows.last()?.date;
        Some((first, last))
    }
}

/// Flattened, store-tagged row ready for upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomeRow {
    pub store_account_id: String,
    pub store_name: String,
    pub account_name: String,
    pub date: NaiveDate,
    pub net_income: f64,
}

#[derive(Debug, Clone)]
pub struct IncomeRecord {
    pub unique_id: String,
    pub tenant: String,
    pub date: NaiveDate,
    pub store_account_id: String,
    pub store_name: String,
    pub account_name: String,
    pub net_income: f64,
}

#[derive(Debug, Clone)]
pub struct UploadRecord {
    pub file_name: String,
    pub platform: String,
    pub store_account_id: String,
    pub record_count: i64,
    pub date_range_start: Option<NaiveDate>,
    pub date_range_end: Option<NaiveDate>,
    pub checksum: String,
    pub uploaded_at: String,
}
