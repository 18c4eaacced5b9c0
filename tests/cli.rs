use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn marketbook(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("marketbook").unwrap();
    cmd.env("HOME", home).env_remove("MARKETBOOK_LOG");
    cmd
}

fn initialized(tenant: &str) -> TempDir {
    let home = tempfile::tempdir().unwrap();
    let data_dir = home.path().join("data");
    marketbook(home.path())
        .args(["init", "--data-dir", data_dir.to_str().unwrap(), "--tenant", tenant])
        .assert()
        .success()
        .stdout(predicate::str::contains("Database ready"))
        .stdout(predicate::str::contains(format!("Tenant: {tenant}")));
    home
}

#[test]
fn help_lists_commands() {
    let home = tempfile::tempdir().unwrap();
    marketbook(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("import"))
        .stdout(predicate::str::contains("report"))
        .stdout(predicate::str::contains("history"));
}

#[test]
fn init_creates_database_and_saves_settings() {
    let home = initialized("alice");
    assert!(home.path().join("data").join("marketbook.db").exists());
    let settings = std::fs::read_to_string(home.path().join(".config/marketbook/settings.json")).unwrap();
    assert!(settings.contains("\"tenant\": \"alice\""));
}

#[test]
fn reports_on_empty_database() {
    let home = initialized("alice");
    marketbook(home.path())
        .args(["report", "range"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No income records for alice"));
    marketbook(home.path())
        .args(["report", "monthly", "--month", "2024-02"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2024-01"));
    marketbook(home.path())
        .args(["history"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No uploads yet"));
}

#[test]
fn report_without_tenant_fails() {
    let home = tempfile::tempdir().unwrap();
    marketbook(home.path())
        .args(["report", "range"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No tenant set"));
}

#[test]
fn report_without_database_fails() {
    let home = tempfile::tempdir().unwrap();
    marketbook(home.path())
        .args(["--tenant", "alice", "report", "income"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("marketbook init"));
}

#[test]
fn bad_date_is_rejected() {
    let home = initialized("alice");
    marketbook(home.path())
        .args(["report", "total", "--from", "01/02/2024", "--to", "2024-02-29"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("YYYY-MM-DD"));
}

#[test]
fn dry_run_import_reports_skipped_files() {
    let home = tempfile::tempdir().unwrap();
    let broken = home.path().join("broken.xlsx");
    let unassigned = home.path().join("orphan.xlsx");
    std::fs::write(&broken, b"not a spreadsheet").unwrap();
    std::fs::write(&unassigned, b"not a spreadsheet either").unwrap();

    let assign = format!("{}=shopee/main", broken.display());
    marketbook(home.path())
        .args(["import", "--dry-run", "--assign", &assign])
        .arg(&broken)
        .arg(&unassigned)
        .assert()
        .success()
        .stdout(predicate::str::contains("Skipped files"))
        .stdout(predicate::str::contains("broken.xlsx: Unreadable spreadsheet"))
        .stdout(predicate::str::contains("No store account assigned to orphan.xlsx"))
        .stdout(predicate::str::contains("Dry run"));
}

#[test]
fn unknown_platform_is_a_file_warning() {
    let home = initialized("alice");
    let file = home.path().join("lazada.xlsx");
    std::fs::write(&file, b"anything").unwrap();
    marketbook(home.path())
        .args(["import", "--store", "lazada", "--account", "main"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Unsupported platform: lazada"))
        .stdout(predicate::str::contains("nothing to save"));
}

#[test]
fn export_writes_csv_header() {
    let home = initialized("alice");
    let out = home.path().join("out").join("income.csv");
    marketbook(home.path())
        .args(["export", "--output", out.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 0 records"));
    let csv = std::fs::read_to_string(&out).unwrap();
    assert!(csv.starts_with("unique_id,username,date,store_account_id"));
}

/// A one-row TikTok settlement export: 2024-01-05, 100.5, plus an unreadable amount.
fn write_tiktok_xlsx(path: &Path) {
    use rust_xlsxwriter::{Format, Workbook};

    let mut wb = Workbook::new();
    let datetime = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");
    let ws = wb.add_worksheet();
    ws.set_name("Order details").unwrap();
    ws.write_string(0, 0, "Order settled time(UTC)").unwrap();
    ws.write_string(0, 1, "Total settlement amount").unwrap();
    ws.write_number_with_format(1, 0, 45296.4375, &datetime).unwrap();
    ws.write_number(1, 1, 100.5).unwrap();
    ws.write_number_with_format(2, 0, 45296.75, &datetime).unwrap();
    ws.write_string(2, 1, "abc").unwrap();
    wb.save(path).unwrap();
}

#[test]
fn missing_file_does_not_stop_the_batch() {
    let home = tempfile::tempdir().unwrap();
    let present = home.path().join("present.xlsx");
    write_tiktok_xlsx(&present);

    marketbook(home.path())
        .args(["import", "--dry-run", "--store", "tiktok", "--account", "main"])
        .arg(&present)
        .arg(home.path().join("missing.xlsx"))
        .assert()
        .success()
        .stdout(predicate::str::contains("present.xlsx"))
        .stdout(predicate::str::contains("2024-01-05"))
        .stdout(predicate::str::contains("missing.xlsx: Unreadable spreadsheet"))
        .stdout(predicate::str::contains("Dry run"));
}

#[test]
fn reimport_updates_instead_of_duplicating() {
    let home = initialized("alice");
    let file = home.path().join("tiktok-jan.xlsx");
    write_tiktok_xlsx(&file);

    marketbook(home.path())
        .args(["import", "--store", "tiktok", "--account", "main"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Unreadable cells in tiktok-jan.xlsx"))
        .stdout(predicate::str::contains("row 3"))
        .stdout(predicate::str::contains("1 saved (1 inserted, 0 updated), 0 failed"));
    marketbook(home.path())
        .args(["report", "income"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tiktok"))
        .stdout(predicate::str::contains("1 records"));

    marketbook(home.path())
        .args(["import", "--store", "tiktok", "--account", "main"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 saved (0 inserted, 1 updated), 0 failed"));
    marketbook(home.path())
        .args(["report", "income"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 records"));
    marketbook(home.path())
        .args(["history"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tiktok-jan.xlsx"));
}

#[test]
fn quarterly_report_labels_previous_year() {
    let home = initialized("alice");
    marketbook(home.path())
        .args(["report", "quarterly", "--year", "2024", "--quarter", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Q1 2024"))
        .stdout(predicate::str::contains("Q4 2023"));
    marketbook(home.path())
        .args(["report", "yearly", "--year", "2024"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No income recorded in 2024"));
}
