use std::path::PathBuf;

use crate::db::{get_connection, init_db, DB_FILE};
use crate::error::Result;
use crate::settings::{load_settings, save_settings, shellexpand_path};

pub fn run(data_dir: Option<String>, tenant: Option<String>) -> Result<()> {
    let mut settings = load_settings();
    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    }
    if let Some(tenant) = tenant {
        settings.tenant = tenant.trim().to_string();
    }

    let dir = PathBuf::from(&settings.data_dir);
    std::fs::create_dir_all(&dir)?;
    let db_path = dir.join(DB_FILE);
    let conn = get_connection(&db_path)?;
    init_db(&conn)?;
    save_settings(&settings)?;

    tracing::info!(path = %db_path.display(), "initialized database");
    println!("Database ready at {}", db_path.display());
    if settings.tenant.is_empty() {
        println!("No tenant saved yet. Pass --tenant to each command or re-run `marketbook init --tenant <name>`.");
    } else {
        println!("Tenant: {}", settings.tenant);
    }
    Ok(())
}
