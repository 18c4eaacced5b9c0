pub mod export;
pub mod history;
pub mod import;
pub mod init;
pub mod report;
pub mod status;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rusqlite::Connection;

use crate::db::get_connection;
use crate::error::{MarketbookError, Result};
use crate::settings::db_path;

pub(crate) fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| MarketbookError::InvalidInput(format!("expected a date as YYYY-MM-DD, got '{value}'")))
}

pub(crate) fn parse_date_opt(value: Option<&str>) -> Result<Option<NaiveDate>> {
    value.map(parse_date).transpose()
}

/// First day of a `YYYY-MM` month.
pub(crate) fn parse_month(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{}-01", value.trim()), "%Y-%m-%d")
        .map_err(|_| MarketbookError::InvalidInput(format!("expected a month as YYYY-MM, got '{value}'")))
}

/// Open the configured database, refusing to create one outside `init`.
pub(crate) fn open_db() -> Result<Connection> {
    let path = db_path();
    if !path.exists() {
        return Err(MarketbookError::Settings(format!(
            "No database found at {}. Run `marketbook init` first.",
            path.display()
        )));
    }
    get_connection(&path)
}

#[derive(Parser)]
#[command(
    name = "marketbook",
    about = "Normalize marketplace settlement spreadsheets into daily store income."
)]
pub struct Cli {
    /// Tenant the command acts for (default: the one saved by `init`)
    #[arg(long, global = true)]
    pub tenant: Option<String>,

    /// Log more to stderr (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory, save the tenant and initialize the database.
    Init {
        /// Path for marketbook data (default: ~/Documents/marketbook)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Parse settlement spreadsheets and save daily income per store.
    Import {
        /// Shopee, Tokopedia or TikTok settlement files (.xlsx/.xls)
        #[arg(required = true)]
        files: Vec<String>,
        /// Store for one file: FILE=STORE/ACCOUNT (repeatable)
        #[arg(long = "assign", value_name = "FILE=STORE/ACCOUNT")]
        assign: Vec<String>,
        /// Store name for files without an --assign
        #[arg(long, requires = "account")]
        store: Option<String>,
        /// Account name for files without an --assign
        #[arg(long, requires = "store")]
        account: Option<String>,
        /// Platform for every file: shopee, tokopedia, tiktok (default: the store name)
        #[arg(long)]
        platform: Option<String>,
        /// Parse and summarize without saving
        #[arg(long = "dry-run")]
        dry_run: bool,
    },
    /// Income reports.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    /// Export income records to CSV.
    Export {
        /// Output file path
        #[arg(long)]
        output: String,
        /// Filter by store account id (STORE_ACCOUNT)
        #[arg(long)]
        store: Option<String>,
        /// Start date: YYYY-MM-DD
        #[arg(long = "from")]
        from_date: Option<String>,
        /// End date: YYYY-MM-DD
        #[arg(long = "to")]
        to_date: Option<String>,
    },
    /// Show settings, database summary and recent uploads.
    Status,
    /// List uploaded files, newest first.
    History {
        /// Number of uploads to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Net income per day across all stores.
    Total {
        /// Start date: YYYY-MM-DD
        #[arg(long = "from")]
        from_date: String,
        /// End date: YYYY-MM-DD
        #[arg(long = "to")]
        to_date: String,
    },
    /// Net income per day per store.
    Stores {
        #[arg(long = "from")]
        from_date: String,
        #[arg(long = "to")]
        to_date: String,
        /// Store account id to include (repeatable; default: all)
        #[arg(long = "store")]
        stores: Vec<String>,
    },
    /// Each store's month against another month.
    Monthly {
        /// Month: YYYY-MM
        #[arg(long)]
        month: String,
        /// Month to compare against (default: the month before)
        #[arg(long)]
        compare: Option<String>,
    },
    /// Each store's day against the day before.
    Daily {
        /// Day: YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
    },
    /// Each store's day against the same day 30 days earlier.
    Today {
        /// Day: YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
    },
    /// Each store's quarter against the quarter before.
    Quarterly {
        /// Year, e.g. 2024
        #[arg(long)]
        year: i32,
        /// Quarter: 1-4
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=4))]
        quarter: u32,
    },
    /// Income per month and per quarter of a year.
    Yearly {
        /// Year, e.g. 2024
        #[arg(long)]
        year: i32,
    },
    /// Every stored income record.
    Income {
        /// Filter by store account id
        #[arg(long)]
        store: Option<String>,
        /// Newest first
        #[arg(long)]
        desc: bool,
    },
    /// Stored date range and store accounts.
    Range,
}
