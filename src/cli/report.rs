use chrono::NaiveDate;
use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::{open_db, parse_date, parse_date_opt, parse_month};
use crate::error::Result;
use crate::fmt::{money, pct, pct_change};
use crate::reports::{self, ComparisonReport};

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn signed_money(val: f64) -> String {
    let text = money(val);
    if val > 0.0 {
        format!("+{text}").green().to_string()
    } else if val < 0.0 {
        text.red().to_string()
    } else {
        text
    }
}

pub fn total(tenant: &str, from_date: &str, to_date: &str) -> Result<()> {
    let conn = open_db()?;
    let report = reports::get_total_income(&conn, tenant, parse_date(from_date)?, parse_date(to_date)?)?;

    let mut table = Table::new();
    table.set_header(vec!["Date", "Net Income"]);
    for day in &report.days {
        table.add_row(vec![Cell::new(day.date), Cell::new(money(day.net_income))]);
    }
    table.add_row(vec![Cell::new("Total".bold()), Cell::new(money(report.total).bold())]);

    println!("Total Income {from_date} to {to_date}\n{table}");
    Ok(())
}

pub fn stores(tenant: &str, from_date: &str, to_date: &str, stores: &[String]) -> Result<()> {
    let conn = open_db()?;
    let rows = reports::get_store_income(&conn, tenant, parse_date(from_date)?, parse_date(to_date)?, stores)?;

    if rows.is_empty() {
        println!("No income recorded for {from_date} to {to_date}.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Date", "Store", "Net Income"]);
    for row in &rows {
        table.add_row(vec![
            Cell::new(row.date),
            Cell::new(&row.store_account_id),
            Cell::new(money(row.net_income)),
        ]);
    }
    println!("Income by Store {from_date} to {to_date}\n{table}");
    Ok(())
}

fn print_comparison(title: &str, report: &ComparisonReport) {
    if report.rows.is_empty() {
        println!(
            "No income recorded for {} or {}.",
            report.current_label, report.previous_label
        );
        return;
    }

    let mut table = Table::new();
    table.set_header(vec![
        "Store".to_string(),
        "Account".to_string(),
        report.current_label.clone(),
        report.previous_label.clone(),
        "Difference".to_string(),
        "Difference %".to_string(),
    ]);
    for row in &report.rows {
        table.add_row(vec![
            Cell::new(&row.store_name),
            Cell::new(&row.account_name),
            Cell::new(money(row.current)),
            Cell::new(money(row.previous)),
            Cell::new(signed_money(row.diff)),
            Cell::new(pct(row.diff_pct)),
        ]);
    }
    let diff = report.current_total - report.previous_total;
    table.add_row(vec![
        Cell::new("Total".bold()),
        Cell::new(""),
        Cell::new(money(report.current_total)),
        Cell::new(money(report.previous_total)),
        Cell::new(signed_money(diff)),
        Cell::new(pct(pct_change(report.current_total, report.previous_total))),
    ]);
    println!("{title}\n{table}");
}

pub fn monthly(tenant: &str, month: &str, compare: Option<&str>) -> Result<()> {
    let conn = open_db()?;
    let month = parse_month(month)?;
    let compare = compare.map(parse_month).transpose()?;
    let report = reports::get_monthly_comparison(&conn, tenant, month, compare)?;
    print_comparison("Monthly Income", &report);
    Ok(())
}

pub fn daily(tenant: &str, date: Option<&str>) -> Result<()> {
    let conn = open_db()?;
    let day = parse_date_opt(date)?.unwrap_or_else(today);
    let report = reports::get_day_comparison(&conn, tenant, day, 1)?;
    print_comparison("Daily Income", &report);
    Ok(())
}

pub fn today_vs_last_month(tenant: &str, date: Option<&str>) -> Result<()> {
    let conn = open_db()?;
    let day = parse_date_opt(date)?.unwrap_or_else(today);
    let report = reports::get_today_comparison(&conn, tenant, day)?;
    print_comparison("Income vs 30 Days Earlier", &report);
    Ok(())
}

pub fn quarterly(tenant: &str, year: i32, quarter: u32) -> Result<()> {
    let conn = open_db()?;
    let report = reports::get_quarterly_comparison(&conn, tenant, year, quarter)?;
    print_comparison("Quarterly Income", &report);
    Ok(())
}

pub fn yearly(tenant: &str, year: i32) -> Result<()> {
    let conn = open_db()?;
    let months = reports::get_monthly_totals(&conn, tenant, year)?;
    if months.is_empty() {
        println!("No income recorded in {year}.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Month", "Net Income"]);
    for m in &months {
        table.add_row(vec![Cell::new(m.month.format("%B")), Cell::new(money(m.net_income))]);
    }
    let total: f64 = months.iter().map(|m| m.net_income).sum();
    table.add_row(vec![Cell::new("Total".bold()), Cell::new(money(total).bold())]);
    println!("Monthly Income {year}\n{table}");

    let quarters = reports::get_quarterly_totals(&conn, tenant, year, today())?;
    if !quarters.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Quarter", "Net Income"]);
        for q in &quarters {
            table.add_row(vec![Cell::new(format!("Q{}", q.quarter)), Cell::new(money(q.net_income))]);
        }
        println!("\nQuarterly Income {year}\n{table}");
    }
    Ok(())
}

pub fn income(tenant: &str, store: Option<&str>, desc: bool) -> Result<()> {
    let conn = open_db()?;
    let records = reports::get_income_records(&conn, tenant, store, None, None, desc)?;

    if records.is_empty() {
        println!("No income records.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Date", "Store", "Account", "Net Income"]);
    for r in &records {
        table.add_row(vec![
            Cell::new(r.date),
            Cell::new(&r.store_name),
            Cell::new(&r.account_name),
            Cell::new(money(r.net_income)),
        ]);
    }
    let total: f64 = records.iter().map(|r| r.net_income).sum();
    println!("Income Records\n{table}");
    println!("{} records, total {}", records.len(), money(total));
    Ok(())
}

pub fn range(tenant: &str) -> Result<()> {
    let conn = open_db()?;
    match reports::get_date_range(&conn, tenant)? {
        Some((first, last)) => println!("Dates:   {first} to {last}"),
        None => {
            println!("No income records for {tenant}.");
            return Ok(());
        }
    }
    let stores = reports::get_store_ids(&conn, tenant)?;
    println!("Stores:  {}", stores.len());
    for store in &stores {
        println!("  {store}");
    }
    Ok(())
}
