use std::collections::HashMap;
use std::path::Path;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::aggregator::{process_batch, BatchOutcome, FileWarning};
use crate::cli::open_db;
use crate::error::{MarketbookError, ParseError, Result};
use crate::fmt::money;
use crate::models::{RawUpload, StoreIdentity};
use crate::settings::resolve_tenant;
use crate::store::save_batch;

pub struct ImportArgs {
    pub files: Vec<String>,
    pub assign: Vec<String>,
    pub store: Option<String>,
    pub account: Option<String>,
    pub platform: Option<String>,
    pub dry_run: bool,
}

fn file_key(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
        .to_string()
}

/// Parse `FILE=STORE/ACCOUNT`. The file is matched by name, so a path works too.
pub(crate) fn parse_assignment(arg: &str) -> Result<(String, StoreIdentity)> {
    let invalid = || MarketbookError::InvalidInput(format!("--assign expects FILE=STORE/ACCOUNT, got '{arg}'"));
    let (file, target) = arg.rsplit_once('=').ok_or_else(invalid)?;
    let (store, account) = target.split_once('/').ok_or_else(invalid)?;
    let identity = StoreIdentity::new(store, account);
    if file.trim().is_empty() || identity.store_name.is_empty() || identity.account_name.is_empty() {
        return Err(invalid());
    }
    Ok((file_key(file.trim()), identity))
}

/// Explicit `--assign` entries win; `--store/--account` covers the rest.
pub(crate) fn build_assignments(
    files: &[String],
    assign: &[String],
    default: Option<StoreIdentity>,
) -> Result<HashMap<String, StoreIdentity>> {
    let mut assignments = HashMap::new();
    for arg in assign {
        let (file, identity) = parse_assignment(arg)?;
        assignments.insert(file, identity);
    }
    if let Some(default) = default {
        for file in files {
            assignments.entry(file_key(file)).or_insert_with(|| default.clone());
        }
    }
    Ok(assignments)
}

/// Read every file; one that cannot be read is skipped with a warning.
pub(crate) fn read_uploads(
    files: &[String],
    assignments: &HashMap<String, StoreIdentity>,
) -> (Vec<RawUpload>, Vec<FileWarning>) {
    let mut uploads = Vec::new();
    let mut warnings = Vec::new();
    for file in files {
        let key = file_key(file);
        // The store name doubles as the platform tag unless --platform is given.
        let tag = assignments
            .get(&key)
            .map(|s| s.store_name.as_str())
            .unwrap_or_default();
        match RawUpload::from_path(Path::new(file), tag) {
            Ok(upload) => uploads.push(upload),
            Err(e) => {
                tracing::warn!(file = %file, error = %e, "cannot read file");
                warnings.push(FileWarning {
                    file_name: key,
                    error: ParseError::Unreadable(e.to_string()).into(),
                });
            }
        }
    }
    (uploads, warnings)
}

pub fn run(args: ImportArgs, tenant: Option<&str>) -> Result<()> {
    // Resolve where rows go before reading anything.
    let target = if args.dry_run {
        None
    } else {
        Some((resolve_tenant(tenant)?, open_db()?))
    };

    let default = match (&args.store, &args.account) {
        (Some(store), Some(account)) => Some(StoreIdentity::new(store, account)),
        _ => None,
    };
    let assignments = build_assignments(&args.files, &args.assign, default)?;

    let (uploads, unread) = read_uploads(&args.files, &assignments);
    let mut outcome = process_batch(&uploads, &assignments, args.platform.as_deref());
    outcome.warnings.extend(unread);
    print_outcome(&outcome);

    let Some((tenant, conn)) = target else {
        println!("\n{}", "Dry run: nothing saved.".dimmed());
        return Ok(());
    };
    if outcome.files.is_empty() {
        println!("\nNo files parsed; nothing to save.");
        return Ok(());
    }

    let summary = save_batch(&conn, &tenant, &outcome);
    println!(
        "\n{} saved ({} inserted, {} updated), {} failed",
        summary.saved(),
        summary.inserted,
        summary.updated,
        summary.failures.len()
    );
    for failure in &summary.failures {
        println!("  {} {failure}", "✗".red());
    }
    for warning in &summary.unlogged {
        println!("  {} {}: {}", "!".yellow(), warning.file_name, warning.error);
    }
    Ok(())
}

fn print_outcome(outcome: &BatchOutcome) {
    if !outcome.files.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["File", "Platform", "Store", "Days", "From", "To", "Net Income", "Issues"]);
        for file in &outcome.files {
            let (from, to) = file
                .date_range()
                .map(|(a, b)| (a.to_string(), b.to_string()))
                .unwrap_or_default();
            table.add_row(vec![
                Cell::new(&file.file_name),
                Cell::new(file.platform.name()),
                Cell::new(&file.store_account_id),
                Cell::new(file.rows.len()),
                Cell::new(from),
                Cell::new(to),
                Cell::new(money(file.total())),
                Cell::new(file.coercions.len()),
            ]);
        }
        println!("{table}");

        for file in outcome.files.iter().filter(|f| !f.coercions.is_empty()) {
            println!("\n{} {}", "Unreadable cells in".yellow(), file.file_name.yellow());
            for issue in &file.coercions {
                println!("  {issue}");
            }
        }
    }

    if !outcome.warnings.is_empty() {
        println!("\n{}", "Skipped files".yellow().bold());
        for warning in &outcome.warnings {
            println!("  {} {}: {}", "!".yellow(), warning.file_name, warning.error);
        }
    }
}
