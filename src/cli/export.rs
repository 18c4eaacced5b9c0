use std::path::PathBuf;

use crate::cli::{open_db, parse_date_opt};
use crate::error::Result;
use crate::reports::get_income_records;

pub struct ExportArgs {
    pub output: String,
    pub store: Option<String>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
}

pub fn run(args: ExportArgs, tenant: &str) -> Result<()> {
    let conn = open_db()?;
    let records = get_income_records(
        &conn,
        tenant,
        args.store.as_deref(),
        parse_date_opt(args.from_date.as_deref())?,
        parse_date_opt(args.to_date.as_deref())?,
        false,
    )?;

    let path = PathBuf::from(&args.output);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record([
        "unique_id",
        "username",
        "date",
        "store_account_id",
        "store_name",
        "account_name",
        "net_income",
    ])?;
    for r in &records {
        writer.write_record([
            r.unique_id.clone(),
            r.tenant.clone(),
            r.date.to_string(),
            r.store_account_id.clone(),
            r.store_name.clone(),
            r.account_name.clone(),
            format!("{:.2}", r.net_income),
        ])?;
    }
    writer.flush()?;

    println!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}
