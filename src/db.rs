use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;

pub const DB_FILE: &str = "marketbook.db";

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS income_data (
    unique_id TEXT PRIMARY KEY,
    username TEXT NOT NULL,
    date TEXT NOT NULL,
    store_account_id TEXT NOT NULL,
    store_name TEXT NOT NULL,
    account_name TEXT NOT NULL,
    net_income REAL NOT NULL,
    updated_at TEXT DEFAULT (datetime('now')),
    UNIQUE (username, date, store_account_id)
);

CREATE INDEX IF NOT EXISTS idx_income_user_date ON income_data (username, date);

CREATE TABLE IF NOT EXISTS uploads (
    id INTEGER PRIMARY KEY,
    username TEXT NOT NULL,
    file_name TEXT NOT NULL,
    platform TEXT NOT NULL,
    store_account_id TEXT NOT NULL,
    record_count INTEGER NOT NULL,
    date_range_start TEXT,
    date_range_end TEXT,
    checksum TEXT NOT NULL,
    uploaded_at TEXT DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_uploads_user ON uploads (username, uploaded_at);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}
