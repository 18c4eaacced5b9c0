use crate::db::get_connection;
use crate::error::Result;
use crate::reports::{count_records, get_date_range, get_store_ids};
use crate::settings::{db_path, load_settings, resolve_tenant};
use crate::store::list_uploads;

pub fn run(tenant: Option<&str>) -> Result<()> {
    let settings = load_settings();
    let db_path = db_path();
    let tenant = resolve_tenant(tenant).ok();

    println!("Tenant:     {}", tenant.as_deref().unwrap_or("(not set)"));
    println!("Data dir:   {}", settings.data_dir);
    println!("Database:   {}", db_path.display());

    if !db_path.exists() {
        println!();
        println!("Database not found. Run `marketbook init` to set up.");
        return Ok(());
    }
    let Some(tenant) = tenant else {
        return Ok(());
    };

    let conn = get_connection(&db_path)?;
    let records = count_records(&conn, &tenant)?;
    let stores = get_store_ids(&conn, &tenant)?;

    println!();
    println!("Records:    {records}");
    println!("Stores:     {}", stores.len());
    if let Some((first, last)) = get_date_range(&conn, &tenant)? {
        println!("Dates:      {first} to {last}");
    }

    let recent = list_uploads(&conn, &tenant, 5)?;
    if !recent.is_empty() {
        println!("\nRecent Uploads\n{}", super::history::uploads_table(&recent));
    }
    Ok(())
}
