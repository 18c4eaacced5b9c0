use rusqlite::{Connection, OptionalExtension};

use crate::aggregator::{BatchOutcome, FileWarning};
use crate::error::{MarketbookError, Result};
use crate::models::{IncomeRow, ProcessedFile, UploadRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Updated,
}

/// Destination for normalized income. Keyed by (tenant, date, store account):
/// a second write for the same key replaces the amount.
pub trait IncomeSink {
    fn upsert(&mut self, tenant: &str, row: &IncomeRow) -> Result<Upsert>;
}

pub struct SqliteIncomeStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteIncomeStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl IncomeSink for SqliteIncomeStore<'_> {
    fn upsert(&mut self, tenant: &str, row: &IncomeRow) -> Result<Upsert> {
        let existing: Option<String> = self
            .conn
            .query_row(
                "SELECT unique_id FROM income_data WHERE username = ?1 AND date = ?2 AND store_account_id = ?3",
                rusqlite::params![tenant, row.date, row.store_account_id],
                |r| r.get(0),
            )
            .optional()?;

        match existing {
            Some(unique_id) => {
                self.conn.execute(
                    "UPDATE income_data SET net_income = ?1, updated_at = datetime('now') WHERE unique_id = ?2",
                    rusqlite::params![row.net_income, unique_id],
                )?;
                Ok(Upsert::Updated)
            }
            None => {
                self.conn.execute(
                    "INSERT INTO income_data (unique_id, username, date, store_account_id, store_name, account_name, net_income) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    rusqlite::params![
                        uuid::Uuid::new_v4().to_string(),
                        tenant,
                        row.date,
                        row.store_account_id,
                        row.store_name,
                        row.account_name,
                        row.net_income,
                    ],
                )?;
                Ok(Upsert::Inserted)
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct SaveSummary {
    pub inserted: usize,
    pub updated: usize,
    /// One `MarketbookError::Persistence` per row that could not be saved.
    pub failures: Vec<MarketbookError>,
    pub unlogged: Vec<FileWarning>,
}

impl SaveSummary {
    pub fn saved(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Upsert each row on its own. A failed row is recorded and the rest still
/// go through; there is no transaction around the batch.
pub fn save_rows<S: IncomeSink + ?Sized>(sink: &mut S, tenant: &str, rows: &[IncomeRow]) -> SaveSummary {
    let mut summary = SaveSummary::default();
    for row in rows {
        match sink.upsert(tenant, row) {
            Ok(Upsert::Inserted) => summary.inserted += 1,
            Ok(Upsert::Updated) => summary.updated += 1,
            Err(e) => {
                tracing::warn!(store = %row.store_account_id, date = %row.date, "upsert failed: {e}");
                summary.failures.push(MarketbookError::Persistence {
                    store_account_id: row.store_account_id.clone(),
                    date: row.date,
                    reason: e.to_string(),
                });
            }
        }
    }
    summary
}

/// Save a processed batch for `tenant` and record each file in the upload log.
pub fn save_batch(conn: &Connection, tenant: &str, outcome: &BatchOutcome) -> SaveSummary {
    let rows = outcome.income_rows();
    let mut store = SqliteIncomeStore::new(conn);
    let mut summary = save_rows(&mut store, tenant, &rows);

    for file in &outcome.files {
        if let Err(error) = log_upload(conn, tenant, file) {
            tracing::warn!(file = %file.file_name, "could not record upload: {error}");
            summary.unlogged.push(FileWarning {
                file_name: file.file_name.clone(),
                error,
            });
        }
    }
    tracing::info!(
        tenant,
        inserted = summary.inserted,
        updated = summary.updated,
        failed = summary.failures.len(),
        "saved batch"
    );
    summary
}

pub fn log_upload(conn: &Connection, tenant: &str, file: &ProcessedFile) -> Result<()> {
    let range = file.date_range();
    conn.execute(
        "INSERT INTO uploads (username, file_name, platform, store_account_id, record_count, date_range_start, date_range_end, checksum) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            tenant,
            file.file_name,
            file.platform.key(),
            file.store_account_id,
            file.rows.len() as i64,
            range.map(|r| r.0),
            range.map(|r| r.1),
            file.checksum,
        ],
    )?;
    Ok(())
}

pub fn list_uploads(conn: &Connection, tenant: &str, limit: usize) -> Result<Vec<UploadRecord>> {
    let mut stmt = conn.prepare(
        "SELECT file_name, platform, store_account_id, record_count, date_range_start, date_range_end, checksum, uploaded_at \
         FROM uploads WHERE username = ?1 ORDER BY uploaded_at DESC, id DESC LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(rusqlite::params![tenant, limit as i64], |row| {
            Ok(UploadRecord {
                file_name: row.get(0)?,
                platform: row.get(1)?,
                store_account_id: row.get(2)?,
                record_count: row.get(3)?,
                date_range_start: row.get(4)?,
                date_range_end: row.get(5)?,
                checksum: row.get(6)?,
                uploaded_at: row.get(7)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use crate::db::{get_connection, init_db};
    use crate::models::{NormalizedRow, StoreIdentity};
    use crate::platforms::Platform;

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn row(store: &str, day: u32, amount: f64) -> IncomeRow {
        IncomeRow {
            store_account_id: format!("{store}_main"),
            store_name: store.to_string(),
            account_name: "main".to_string(),
            date: d(day),
            net_income: amount,
        }
    }

    fn stored(conn: &Connection, tenant: &str) -> Vec<(NaiveDate, String, f64)> {
        conn.prepare(
            "SELECT date, store_account_id, net_income FROM income_data WHERE username = ?1 ORDER BY date, store_account_id",
        )
        .unwrap()
        .query_map([tenant], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))
        .unwrap()
        .collect::<std::result::Result<Vec<_>, _>>()
        .unwrap()
    }

    /// Records rows in memory and refuses one date.
    struct FlakySink {
        refuse: NaiveDate,
        rows: Vec<IncomeRow>,
    }

    impl IncomeSink for FlakySink {
        fn upsert(&mut self, _tenant: &str, row: &IncomeRow) -> Result<Upsert> {
            if row.date == self.refuse {
                return Err(MarketbookError::Io(std::io::Error::other("disk full")));
            }
            self.rows.push(row.clone());
            Ok(Upsert::Inserted)
        }
    }

    #[test]
    fn test_upsert_inserts_then_overwrites() {
        let (_dir, conn) = test_db();
        let mut store = SqliteIncomeStore::new(&conn);
        assert_eq!(store.upsert("alice", &row("shopee", 1, 100.0)).unwrap(), Upsert::Inserted);
        assert_eq!(store.upsert("alice", &row("shopee", 1, 100.0)).unwrap(), Upsert::Updated);
        assert_eq!(store.upsert("alice", &row("shopee", 1, 80.0)).unwrap(), Upsert::Updated);
        assert_eq!(stored(&conn, "alice"), vec![(d(1), "shopee_main".to_string(), 80.0)]);
    }

    #[test]
    fn test_upsert_is_scoped_by_tenant() {
        let (_dir, conn) = test_db();
        let mut store = SqliteIncomeStore::new(&conn);
        store.upsert("alice", &row("shopee", 1, 100.0)).unwrap();
        assert_eq!(store.upsert("bob", &row("shopee", 1, 5.0)).unwrap(), Upsert::Inserted);
        assert_eq!(stored(&conn, "alice")[0].2, 100.0);
        assert_eq!(stored(&conn, "bob")[0].2, 5.0);
    }

    #[test]
    fn test_save_rows_continues_after_failure() {
        let mut sink = FlakySink { refuse: d(2), rows: Vec::new() };
        let rows = vec![row("tiktok", 1, 1.0), row("tiktok", 2, 2.0), row("tiktok", 3, 3.0)];
        let summary = save_rows(&mut sink, "alice", &rows);
        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.failures.len(), 1);
        match &summary.failures[0] {
            MarketbookError::Persistence { store_account_id, date, reason } => {
                assert_eq!(store_account_id, "tiktok_main");
                assert_eq!(*date, d(2));
                assert!(reason.contains("disk full"));
            }
            other => panic!("unexpected failure: {other}"),
        }
        assert_eq!(sink.rows.len(), 2);
        assert_eq!(sink.rows[1].date, d(3));
    }

    fn processed(name: &str, rows: &[(u32, f64)]) -> ProcessedFile {
        ProcessedFile {
            file_name: name.to_string(),
            platform: Platform::Shopee,
            store: StoreIdentity::new("shopee", "main"),
            store_account_id: "shopee_main".to_string(),
            rows: rows
                .iter()
                .map(|(day, amount)| NormalizedRow { date: d(*day), net_income: *amount })
                .collect(),
            coercions: Vec::new(),
            checksum: "abc123".to_string(),
        }
    }

    #[test]
    fn test_save_batch_twice_does_not_duplicate() {
        let (_dir, conn) = test_db();
        let outcome = BatchOutcome {
            files: vec![processed("a.xlsx", &[(1, 10.0), (2, 20.0)]), processed("b.xlsx", &[(2, 5.0)])],
            warnings: Vec::new(),
        };

        let first = save_batch(&conn, "alice", &outcome);
        assert_eq!((first.inserted, first.updated), (2, 0));
        let second = save_batch(&conn, "alice", &outcome);
        assert_eq!((second.inserted, second.updated), (0, 2));
        assert!(second.failures.is_empty());

        assert_eq!(
            stored(&conn, "alice"),
            vec![
                (d(1), "shopee_main".to_string(), 10.0),
                (d(2), "shopee_main".to_string(), 25.0),
            ]
        );
    }

    #[test]
    fn test_save_batch_logs_uploads() {
        let (_dir, conn) = test_db();
        let outcome = BatchOutcome {
            files: vec![processed("a.xlsx", &[(3, 1.0), (9, 2.0)]), processed("empty.xlsx", &[])],
            warnings: Vec::new(),
        };
        let summary = save_batch(&conn, "alice", &outcome);
        assert!(summary.unlogged.is_empty());

        let uploads = list_uploads(&conn, "alice", 10).unwrap();
        assert_eq!(uploads.len(), 2);
        let a = uploads.iter().find(|u| u.file_name == "a.xlsx").unwrap();
        assert_eq!(a.record_count, 2);
        assert_eq!(a.date_range_start, Some(d(3)));
        assert_eq!(a.date_range_end, Some(d(9)));
        assert_eq!(a.platform, "shopee");
        let empty = uploads.iter().find(|u| u.file_name == "empty.xlsx").unwrap();
        assert_eq!(empty.date_range_start, None);
        assert!(list_uploads(&conn, "bob", 10).unwrap().is_empty());
    }
}
