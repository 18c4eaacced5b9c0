use comfy_table::{Cell, Table};

use crate::cli::open_db;
use crate::error::Result;
use crate::models::UploadRecord;
use crate::store::list_uploads;

pub(crate) fn uploads_table(uploads: &[UploadRecord]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Uploaded", "File", "Platform", "Store", "Days", "Range", "Checksum"]);
    for u in uploads {
        let range = match (u.date_range_start, u.date_range_end) {
            (Some(start), Some(end)) => format!("{start} to {end}"),
            _ => "-".to_string(),
        };
        table.add_row(vec![
            Cell::new(&u.uploaded_at),
            Cell::new(&u.file_name),
            Cell::new(&u.platform),
            Cell::new(&u.store_account_id),
            Cell::new(u.record_count),
            Cell::new(range),
            Cell::new(u.checksum.get(..12).unwrap_or(&u.checksum)),
        ]);
    }
    table
}

pub fn run(tenant: &str, limit: usize) -> Result<()> {
    let conn = open_db()?;
    let uploads = list_uploads(&conn, tenant, limit)?;
    if uploads.is_empty() {
        println!("No uploads yet for {tenant}.");
        return Ok(());
    }
    println!("Upload History\n{}", uploads_table(&uploads));
    Ok(())
}
