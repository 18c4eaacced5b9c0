use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, Duration, Months, NaiveDate};
use rusqlite::Connection;

use crate::error::{MarketbookError, Result};
use crate::fmt::pct_change;
use crate::models::IncomeRecord;

// ---------------------------------------------------------------------------
// Date filter helper
// ---------------------------------------------------------------------------

/// Inclusive date window. Both ends or neither.
fn date_filter(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<Option<(NaiveDate, NaiveDate)>> {
    match (from, to) {
        (Some(from), Some(to)) if from > to => Err(MarketbookError::InvalidInput(format!(
            "--from {from} is after --to {to}"
        ))),
        (Some(from), Some(to)) => Ok(Some((from, to))),
        (Some(_), None) => Err(MarketbookError::InvalidInput(
            "--from requires --to (both date boundaries must be specified)".to_string(),
        )),
        (None, Some(_)) => Err(MarketbookError::InvalidInput(
            "--to requires --from (both date boundaries must be specified)".to_string(),
        )),
        (None, None) => Ok(None),
    }
}

pub fn month_bounds(month: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = month.with_day(1).unwrap_or(month);
    let next = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    };
    let last = next.and_then(|n| n.pred_opt()).unwrap_or(first);
    (first, last)
}

pub fn previous_month(month: NaiveDate) -> NaiveDate {
    let (first, _) = month_bounds(month);
    first.pred_opt().map(|d| month_bounds(d).0).unwrap_or(first)
}

pub fn quarter_of(date: NaiveDate) -> u32 {
    (date.month() - 1) / 3 + 1
}

/// First and last day of quarter `quarter` (1-4) of `year`.
pub fn quarter_bounds(year: i32, quarter: u32) -> Result<(NaiveDate, NaiveDate)> {
    let invalid = || MarketbookError::InvalidInput(format!("no quarter {quarter} in {year}"));
    if !(1..=4).contains(&quarter) {
        return Err(invalid());
    }
    let first = NaiveDate::from_ymd_opt(year, (quarter - 1) * 3 + 1, 1).ok_or_else(invalid)?;
    let last = first
        .checked_add_months(Months::new(3))
        .and_then(|d| d.pred_opt())
        .ok_or_else(invalid)?;
    Ok((first, last))
}

/// Q1 steps back to Q4 of the year before.
pub fn previous_quarter(year: i32, quarter: u32) -> (i32, u32) {
    if quarter <= 1 {
        (year - 1, 4)
    } else {
        (year, quarter - 1)
    }
}

fn year_bounds(year: i32) -> Result<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, 1, 1);
    let last = NaiveDate::from_ymd_opt(year, 12, 31);
    first
        .zip(last)
        .ok_or_else(|| MarketbookError::InvalidInput(format!("year {year} is out of range")))
}

// ---------------------------------------------------------------------------
// Overview
// ---------------------------------------------------------------------------

pub fn get_date_range(conn: &Connection, tenant: &str) -> Result<Option<(NaiveDate, NaiveDate)>> {
    let (min, max): (Option<NaiveDate>, Option<NaiveDate>) = conn.query_row(
        "SELECT MIN(date), MAX(date) FROM income_data WHERE username = ?1",
        [tenant],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(min.zip(max))
}

pub fn get_store_ids(conn: &Connection, tenant: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT store_account_id FROM income_data WHERE username = ?1 ORDER BY store_account_id",
    )?;
    let ids = stmt
        .query_map([tenant], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(ids)
}

pub fn count_records(conn: &Connection, tenant: &str) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT count(*) FROM income_data WHERE username = ?1",
        [tenant],
        |r| r.get(0),
    )?)
}

// ---------------------------------------------------------------------------
// Total income per day
// ---------------------------------------------------------------------------

pub struct DailyTotal {
    pub date: NaiveDate,
    pub net_income: f64,
}

pub struct TotalIncomeReport {
    pub days: Vec<DailyTotal>,
    pub total: f64,
}

pub fn get_total_income(
    conn: &Connection,
    tenant: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<TotalIncomeReport> {
    let (from, to) = date_filter(Some(from), Some(to))?.unwrap_or((from, to));
    let mut stmt = conn.prepare(
        "SELECT date, SUM(net_income) FROM income_data \
         WHERE username = ?1 AND date BETWEEN ?2 AND ?3 \
         GROUP BY date ORDER BY date",
    )?;
    let days: Vec<DailyTotal> = stmt
        .query_map(rusqlite::params![tenant, from, to], |row| {
            Ok(DailyTotal {
                date: row.get(0)?,
                net_income: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let total = days.iter().map(|d| d.net_income).sum();
    Ok(TotalIncomeReport { days, total })
}

// ---------------------------------------------------------------------------
// Income per day per store
// ---------------------------------------------------------------------------

pub struct StoreDailyTotal {
    pub date: NaiveDate,
    pub store_account_id: String,
    pub net_income: f64,
}

pub fn get_store_income(
    conn: &Connection,
    tenant: &str,
    from: NaiveDate,
    to: NaiveDate,
    store_ids: &[String],
) -> Result<Vec<StoreDailyTotal>> {
    let (from, to) = date_filter(Some(from), Some(to))?.unwrap_or((from, to));

    let mut params: Vec<String> = vec![tenant.to_string(), from.to_string(), to.to_string()];
    let store_clause = if store_ids.is_empty() {
        String::new()
    } else {
        let placeholders: Vec<String> = store_ids
            .iter()
            .map(|id| {
                params.push(id.clone());
                format!("?{}", params.len())
            })
            .collect();
        format!(" AND store_account_id IN ({})", placeholders.join(", "))
    };

    let sql = format!(
        "SELECT date, store_account_id, SUM(net_income) FROM income_data \
         WHERE username = ?1 AND date BETWEEN ?2 AND ?3{store_clause} \
         GROUP BY date, store_account_id ORDER BY date, store_account_id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let param_values: Vec<&dyn rusqlite::types::ToSql> = params
        .iter()
        .map(|p| p as &dyn rusqlite::types::ToSql)
        .collect();
    let rows = stmt
        .query_map(param_values.as_slice(), |row| {
            Ok(StoreDailyTotal {
                date: row.get(0)?,
                store_account_id: row.get(1)?,
                net_income: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Period comparison (month vs month, day vs day)
// ---------------------------------------------------------------------------

pub struct ComparisonRow {
    pub store_name: String,
    pub account_name: String,
    pub current: f64,
    pub previous: f64,
    pub diff: f64,
    pub diff_pct: f64,
}

pub struct ComparisonReport {
    pub current_label: String,
    pub previous_label: String,
    pub rows: Vec<ComparisonRow>,
    pub current_total: f64,
    pub previous_total: f64,
}

struct StoreTotal {
    store_name: String,
    account_name: String,
    total: f64,
}

fn totals_by_store(
    conn: &Connection,
    tenant: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<BTreeMap<String, StoreTotal>> {
    let mut stmt = conn.prepare(
        "SELECT store_account_id, store_name, account_name, SUM(net_income) FROM income_data \
         WHERE username = ?1 AND date BETWEEN ?2 AND ?3 \
         GROUP BY store_account_id, store_name, account_name",
    )?;
    let raw: Vec<(String, String, String, f64)> = stmt
        .query_map(rusqlite::params![tenant, from, to], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut totals: BTreeMap<String, StoreTotal> = BTreeMap::new();
    for (id, store_name, account_name, total) in raw {
        totals
            .entry(id)
            .and_modify(|t| t.total += total)
            .or_insert(StoreTotal {
                store_name,
                account_name,
                total,
            });
    }
    Ok(totals)
}

/// Full outer join of two periods by store account. Unless `keep_idle` is
/// set, stores that are zero in both periods are dropped.
fn compare_periods(
    conn: &Connection,
    tenant: &str,
    current: (NaiveDate, NaiveDate),
    previous: (NaiveDate, NaiveDate),
    keep_idle: bool,
) -> Result<Vec<ComparisonRow>> {
    let mut cur = totals_by_store(conn, tenant, current.0, current.1)?;
    let mut prev = totals_by_store(conn, tenant, previous.0, previous.1)?;

    let ids: BTreeSet<String> = cur.keys().chain(prev.keys()).cloned().collect();
    let mut rows = Vec::new();
    for id in ids {
        let c = cur.remove(&id);
        let p = prev.remove(&id);
        let current_total = c.as_ref().map(|t| t.total).unwrap_or(0.0);
        let previous_total = p.as_ref().map(|t| t.total).unwrap_or(0.0);
        if !keep_idle && current_total == 0.0 && previous_total == 0.0 {
            continue;
        }
        let Some(names) = c.or(p) else { continue };
        rows.push(ComparisonRow {
            store_name: names.store_name,
            account_name: names.account_name,
            current: current_total,
            previous: previous_total,
            diff: current_total - previous_total,
            diff_pct: pct_change(current_total, previous_total),
        });
    }
    Ok(rows)
}

fn comparison_report(rows: Vec<ComparisonRow>, current_label: String, previous_label: String) -> ComparisonReport {
    let current_total = rows.iter().map(|r| r.current).sum();
    let previous_total = rows.iter().map(|r| r.previous).sum();
    ComparisonReport {
        current_label,
        previous_label,
        rows,
        current_total,
        previous_total,
    }
}

/// Each store's total for `month` against `compare` (default: the month before).
pub fn get_monthly_comparison(
    conn: &Connection,
    tenant: &str,
    month: NaiveDate,
    compare: Option<NaiveDate>,
) -> Result<ComparisonReport> {
    let compare = compare.unwrap_or_else(|| previous_month(month));
    let rows = compare_periods(conn, tenant, month_bounds(month), month_bounds(compare), false)?;
    Ok(comparison_report(
        rows,
        month.format("%Y-%m").to_string(),
        compare.format("%Y-%m").to_string(),
    ))
}

fn day_comparison(
    conn: &Connection,
    tenant: &str,
    day: NaiveDate,
    days_back: i64,
    keep_idle: bool,
) -> Result<ComparisonReport> {
    let against = day - Duration::days(days_back);
    let rows = compare_periods(conn, tenant, (day, day), (against, against), keep_idle)?;
    Ok(comparison_report(rows, day.to_string(), against.to_string()))
}

/// Each store's income on `day` against the same store `days_back` days earlier.
pub fn get_day_comparison(
    conn: &Connection,
    tenant: &str,
    day: NaiveDate,
    days_back: i64,
) -> Result<ComparisonReport> {
    day_comparison(conn, tenant, day, days_back, false)
}

/// `day` against 30 days earlier. Every store with a record on either day is
/// listed, including ones at zero on both.
pub fn get_today_comparison(conn: &Connection, tenant: &str, day: NaiveDate) -> Result<ComparisonReport> {
    day_comparison(conn, tenant, day, 30, true)
}

/// Each store's quarter against the quarter before. Stores at zero in both
/// quarters stay listed.
pub fn get_quarterly_comparison(
    conn: &Connection,
    tenant: &str,
    year: i32,
    quarter: u32,
) -> Result<ComparisonReport> {
    let current = quarter_bounds(year, quarter)?;
    let (prev_year, prev_quarter) = previous_quarter(year, quarter);
    let previous = quarter_bounds(prev_year, prev_quarter)?;
    let rows = compare_periods(conn, tenant, current, previous, true)?;
    Ok(comparison_report(
        rows,
        format!("Q{quarter} {year}"),
        format!("Q{prev_quarter} {prev_year}"),
    ))
}

// ---------------------------------------------------------------------------
// Year overview
// ---------------------------------------------------------------------------

pub struct MonthTotal {
    /// First day of the month.
    pub month: NaiveDate,
    pub net_income: f64,
}

pub struct QuarterTotal {
    pub quarter: u32,
    pub net_income: f64,
}

/// Income per month of `year`, months without records omitted.
pub fn get_monthly_totals(conn: &Connection, tenant: &str, year: i32) -> Result<Vec<MonthTotal>> {
    let (from, to) = year_bounds(year)?;
    let mut stmt = conn.prepare(
        "SELECT CAST(strftime('%m', date) AS INTEGER) AS month, SUM(net_income) FROM income_data \
         WHERE username = ?1 AND date BETWEEN ?2 AND ?3 \
         GROUP BY month ORDER BY month",
    )?;
    let raw: Vec<(u32, f64)> = stmt
        .query_map(rusqlite::params![tenant, from, to], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(raw
        .into_iter()
        .filter_map(|(month, net_income)| {
            NaiveDate::from_ymd_opt(year, month, 1).map(|month| MonthTotal { month, net_income })
        })
        .collect())
}

/// Income per quarter of `year`. For the year of `today` only quarters up to
/// the one containing the date a month before `today` are included, so a
/// quarter that has barely started is left out.
pub fn get_quarterly_totals(
    conn: &Connection,
    tenant: &str,
    year: i32,
    today: NaiveDate,
) -> Result<Vec<QuarterTotal>> {
    let (from, to) = year_bounds(year)?;
    let last_quarter = if year == today.year() {
        today
            .checked_sub_months(Months::new(1))
            .map(quarter_of)
            .unwrap_or(4)
    } else {
        4
    };
    let mut stmt = conn.prepare(
        "SELECT (CAST(strftime('%m', date) AS INTEGER) + 2) / 3 AS quarter, SUM(net_income) \
         FROM income_data WHERE username = ?1 AND date BETWEEN ?2 AND ?3 \
         GROUP BY quarter HAVING quarter <= ?4 ORDER BY quarter",
    )?;
    let totals = stmt
        .query_map(rusqlite::params![tenant, from, to, last_quarter], |row| {
            Ok(QuarterTotal {
                quarter: row.get(0)?,
                net_income: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(totals)
}

// ---------------------------------------------------------------------------
// Income records
// ---------------------------------------------------------------------------

pub fn get_income_records(
    conn: &Connection,
    tenant: &str,
    store: Option<&str>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    descending: bool,
) -> Result<Vec<IncomeRecord>> {
    let mut sql = String::from(
        "SELECT unique_id, username, date, store_account_id, store_name, account_name, net_income \
         FROM income_data WHERE username = ?1",
    );
    let mut params: Vec<String> = vec![tenant.to_string()];

    if let Some((from, to)) = date_filter(from, to)? {
        params.push(from.to_string());
        params.push(to.to_string());
        sql.push_str(&format!(" AND date BETWEEN ?{} AND ?{}", params.len() - 1, params.len()));
    }
    if let Some(store) = store {
        params.push(store.to_string());
        sql.push_str(&format!(" AND store_account_id = ?{}", params.len()));
    }
    let order = if descending { "DESC" } else { "ASC" };
    sql.push_str(&format!(" ORDER BY date {order}, store_account_id"));

    let mut stmt = conn.prepare(&sql)?;
    let param_values: Vec<&dyn rusqlite::types::ToSql> = params
        .iter()
        .map(|p| p as &dyn rusqlite::types::ToSql)
        .collect();
    let records = stmt
        .query_map(param_values.as_slice(), |row| {
            Ok(IncomeRecord {
                unique_id: row.get(0)?,
                tenant: row.get(1)?,
                date: row.get(2)?,
                store_account_id: row.get(3)?,
                store_name: row.get(4)?,
                account_name: row.get(5)?,
                net_income: row.get(6)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(records)
}
