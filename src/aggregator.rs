use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use sha2::{Digest, Sha256};

use crate::error::{MarketbookError, ParseError, Result};
use crate::models::{IncomeRow, ProcessedFile, RawUpload, StoreIdentity};
use crate::platforms::Platform;
use crate::workbook::Workbook;

/// A file that produced no rows, and why.
#[derive(Debug)]
pub struct FileWarning {
    pub file_name: String,
    pub error: MarketbookError,
}

#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub files: Vec<ProcessedFile>,
    pub warnings: Vec<FileWarning>,
}

impl BatchOutcome {
    /// Flatten all processed files into one row per (store account, date).
    /// Files for the same store with overlapping dates are summed.
    pub fn income_rows(&self) -> Vec<IncomeRow> {
        let mut merged: BTreeMap<(String, NaiveDate), IncomeRow> = BTreeMap::new();
        for file in &self.files {
            for row in &file.rows {
                merged
                    .entry((file.store_account_id.clone(), row.date))
                    .and_modify(|r| r.net_income += row.net_income)
                    .or_insert_with(|| IncomeRow {
                        store_account_id: file.store_account_id.clone(),
                        store_name: file.store.store_name.clone(),
                        account_name: file.store.account_name.clone(),
                        date: row.date,
                        net_income: row.net_income,
                    });
            }
        }
        merged.into_values().collect()
    }
}

pub fn compute_checksum(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Parse every upload against its assigned store. A failing file becomes a
/// warning; the rest of the batch carries on.
pub fn process_batch(
    uploads: &[RawUpload],
    assignments: &HashMap<String, StoreIdentity>,
    platform_override: Option<&str>,
) -> BatchOutcome {
    process_batch_with(uploads, assignments, platform_override, |upload| {
        Workbook::from_bytes(&upload.content)
    })
}

pub fn process_batch_with<F>(
    uploads: &[RawUpload],
    assignments: &HashMap<String, StoreIdentity>,
    platform_override: Option<&str>,
    load: F,
) -> BatchOutcome
where
    F: Fn(&RawUpload) -> std::result::Result<Workbook, ParseError>,
{
    let mut outcome = BatchOutcome::default();
    for upload in uploads {
        let store = assignments.get(&upload.file_name);
        match process_file(upload, store, platform_override, &load) {
            Ok(file) => {
                tracing::info!(
                    file = %file.file_name,
                    platform = file.platform.key(),
                    store = %file.store_account_id,
                    days = file.rows.len(),
                    coerced = file.coercions.len(),
                    "processed upload"
                );
                outcome.files.push(file);
            }
            Err(error) => {
                tracing::warn!(file = %upload.file_name, "skipped upload: {error}");
                outcome.warnings.push(FileWarning {
                    file_name: upload.file_name.clone(),
                    error,
                });
            }
        }
    }
    outcome
}

fn process_file<F>(
    upload: &RawUpload,
    store: Option<&StoreIdentity>,
    platform_override: Option<&str>,
    load: &F,
) -> Result<ProcessedFile>
where
    F: Fn(&RawUpload) -> std::result::Result<Workbook, ParseError>,
{
    let store = store.ok_or_else(|| MarketbookError::MissingAssignment(upload.file_name.clone()))?;
    let platform = Platform::from_tag(platform_override.unwrap_or(upload.platform_tag.as_str()))?;
    let workbook = load(upload)?;
    let parsed = platform.parse(&workbook)?;

    Ok(ProcessedFile {
        file_name: upload.file_name.clone(),
        platform,
        store: store.clone(),
        store_account_id: store.store_account_id(),
        rows: parsed.rows,
        coercions: parsed.coercions,
        checksum: compute_checksum(&upload.content),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::Sheet;
    use calamine::Data;

    fn s(v: &str) -> Data {
        Data::String(v.to_string())
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn upload(name: &str, tag: &str) -> RawUpload {
        RawUpload {
            file_name: name.to_string(),
            content: name.as_bytes().to_vec(),
            platform_tag: tag.to_string(),
        }
    }

    fn tiktok(rows: &[(&str, f64)]) -> Workbook {
        let mut grid = vec![vec![s("Order settled time(UTC)"), s("Total settlement amount")]];
        for (date, amount) in rows {
            grid.push(vec![s(date), Data::Float(*amount)]);
        }
        Workbook::from_sheets(vec![Sheet::new("Order details", grid)])
    }

    fn loader(
        books: Vec<(&'static str, Workbook)>,
    ) -> impl Fn(&RawUpload) -> std::result::Result<Workbook, ParseError> {
        let books: HashMap<&'static str, Workbook> = books.into_iter().collect();
        move |u: &RawUpload| {
            books
                .get(u.file_name.as_str())
                .cloned()
                .ok_or_else(|| ParseError::Unreadable(u.file_name.clone()))
        }
    }

    fn assign(pairs: &[(&str, &str, &str)]) -> HashMap<String, StoreIdentity> {
        pairs
            .iter()
            .map(|(file, store, account)| (file.to_string(), StoreIdentity::new(store, account)))
            .collect()
    }

    #[test]
    fn test_same_store_files_sum_per_date() {
        let uploads = vec![upload("week1.xlsx", "tiktok"), upload("week2.xlsx", "tiktok")];
        let load = loader(vec![
            ("week1.xlsx", tiktok(&[("2024-01-01", 100.0), ("2024-01-02", 10.0)])),
            ("week2.xlsx", tiktok(&[("2024-01-02", 5.0), ("2024-01-03", 1.0)])),
        ]);
        let assignments = assign(&[
            ("week1.xlsx", "tiktok", "main"),
            ("week2.xlsx", "tiktok", "main"),
        ]);
        let outcome = process_batch_with(&uploads, &assignments, None, load);
        assert!(outcome.warnings.is_empty());
        assert_eq!(outcome.files.len(), 2);

        let rows = outcome.income_rows();
        let summary: Vec<(NaiveDate, f64)> = rows.iter().map(|r| (r.date, r.net_income)).collect();
        assert_eq!(
            summary,
            vec![(d(2024, 1, 1), 100.0), (d(2024, 1, 2), 15.0), (d(2024, 1, 3), 1.0)]
        );
        assert!(rows.iter().all(|r| r.store_account_id == "tiktok_main"));
    }

    #[test]
    fn test_different_stores_stay_separate() {
        let uploads = vec![upload("a.xlsx", "tiktok"), upload("b.xlsx", "tiktok")];
        let load = loader(vec![
            ("a.xlsx", tiktok(&[("2024-01-01", 100.0)])),
            ("b.xlsx", tiktok(&[("2024-01-01", 7.0)])),
        ]);
        let assignments = assign(&[("a.xlsx", "tiktok", "one"), ("b.xlsx", "tiktok", "two")]);
        let rows = process_batch_with(&uploads, &assignments, None, load).income_rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].store_account_id, "tiktok_one");
        assert_eq!(rows[0].account_name, "one");
        assert_eq!(rows[1].net_income, 7.0);
    }

    #[test]
    fn test_missing_assignment_does_not_block_siblings() {
        let uploads = vec![upload("orphan.xlsx", "tiktok"), upload("ok.xlsx", "tiktok")];
        let load = loader(vec![
            ("orphan.xlsx", tiktok(&[("2024-01-01", 1.0)])),
            ("ok.xlsx", tiktok(&[("2024-01-01", 2.0)])),
        ]);
        let assignments = assign(&[("ok.xlsx", "tiktok", "main")]);
        let outcome = process_batch_with(&uploads, &assignments, None, load);
        assert_eq!(outcome.files.len(), 1);
        assert_eq!(outcome.files[0].file_name, "ok.xlsx");
        assert_eq!(outcome.warnings.len(), 1);
        assert!(matches!(
            &outcome.warnings[0].error,
            MarketbookError::MissingAssignment(f) if f == "orphan.xlsx"
        ));
    }

    #[test]
    fn test_unknown_platform_is_a_parse_warning() {
        let uploads = vec![upload("lazada.xlsx", "Lazada"), upload("ok.xlsx", "TikTok")];
        let load = loader(vec![
            ("lazada.xlsx", tiktok(&[("2024-01-01", 1.0)])),
            ("ok.xlsx", tiktok(&[("2024-01-01", 2.0)])),
        ]);
        let assignments = assign(&[
            ("lazada.xlsx", "Lazada", "main"),
            ("ok.xlsx", "TikTok", "main"),
        ]);
        let outcome = process_batch_with(&uploads, &assignments, None, load);
        assert_eq!(outcome.files.len(), 1);
        assert!(matches!(
            &outcome.warnings[0].error,
            MarketbookError::Parse(ParseError::UnknownPlatform(tag)) if tag == "Lazada"
        ));
    }

    #[test]
    fn test_platform_override_wins_over_upload_tag() {
        let uploads = vec![upload("report.xlsx", "My Shop")];
        let load = loader(vec![("report.xlsx", tiktok(&[("2024-01-01", 3.0)]))]);
        let assignments = assign(&[("report.xlsx", "My Shop", "main")]);
        let outcome = process_batch_with(&uploads, &assignments, Some("tiktok"), load);
        assert_eq!(outcome.files.len(), 1);
        assert_eq!(outcome.files[0].platform, Platform::TikTok);
        assert_eq!(outcome.files[0].store_account_id, "My Shop_main");
    }

    #[test]
    fn test_structural_mismatch_is_a_warning() {
        let uploads = vec![upload("shopee.xlsx", "shopee")];
        let load = loader(vec![("shopee.xlsx", tiktok(&[("2024-01-01", 3.0)]))]);
        let assignments = assign(&[("shopee.xlsx", "shopee", "main")]);
        let outcome = process_batch_with(&uploads, &assignments, None, load);
        assert!(outcome.files.is_empty());
        assert!(matches!(
            &outcome.warnings[0].error,
            MarketbookError::Parse(ParseError::MissingSheet(sheet)) if sheet == "Income"
        ));
        assert!(outcome.income_rows().is_empty());
    }

    #[test]
    fn test_unreadable_bytes_are_a_warning() {
        let uploads = vec![upload("broken.xlsx", "shopee")];
        let assignments = assign(&[("broken.xlsx", "shopee", "main")]);
        let outcome = process_batch(&uploads, &assignments, None);
        assert!(matches!(
            &outcome.warnings[0].error,
            MarketbookError::Parse(ParseError::Unreadable(_))
        ));
    }

    #[test]
    fn test_checksum_is_stable() {
        assert_eq!(compute_checksum(b"abc"), compute_checksum(b"abc"));
        assert_eq!(compute_checksum(b"abc").len(), 64);
    }
}
