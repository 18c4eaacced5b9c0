use std::collections::BTreeMap;

use calamine::Data;
use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{CoercionError, ParseError};
use crate::models::NormalizedRow;
use crate::workbook::{cell_text, is_blank_row, Sheet, Workbook};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%d-%m-%Y %H:%M:%S",
];

// Day-first: settlement reports come from Indonesian storefronts.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y"];

/// Parse a settlement amount. Thousands separators, currency markers and
/// parenthesized negatives are accepted; anything else is `None`.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let s: String = raw
        .replace("Rp", "")
        .replace("IDR", "")
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    if s.is_empty() {
        return None;
    }
    let (negative, body) = match s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, s.as_str()),
    };
    let value: f64 = body.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if negative { -value } else { value })
}

pub fn parse_date_text(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(d);
        }
    }
    None
}

pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    // Excel epoch is 1899-12-30 (accounting for the 1900 leap year bug)
    if !(1.0..3_000_000.0).contains(&serial) {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_signed(chrono::Duration::days(serial.floor() as i64))
}

pub fn cell_date(cell: &Data) -> Option<NaiveDate> {
    match cell {
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.date())
            .or_else(|| excel_serial_to_date(dt.as_f64())),
        Data::Float(f) => excel_serial_to_date(*f),
        Data::Int(i) => excel_serial_to_date(*i as f64),
        Data::String(s) | Data::DateTimeIso(s) => parse_date_text(s),
        _ => None,
    }
}

pub fn cell_amount(cell: &Data) -> Option<f64> {
    match cell {
        Data::Float(f) if f.is_finite() => Some(*f),
        Data::Int(i) => Some(*i as f64),
        Data::String(s) => parse_amount(s),
        _ => None,
    }
}

static EMPTY_CELL: Data = Data::Empty;

fn is_empty_cell(cell: &Data) -> bool {
    match cell {
        Data::Empty => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Records row-level coercion failures while a sheet is being read.
struct Coercions {
    /// Worksheet row of the sheet's first grid row.
    origin: usize,
    issues: Vec<CoercionError>,
}

impl Coercions {
    fn new(sheet: &Sheet) -> Self {
        Self {
            origin: sheet.origin,
            issues: Vec::new(),
        }
    }

    fn note(&mut self, row: usize, column: &str, cell: &Data) {
        let err = CoercionError {
            row: self.origin + row + 1,
            column: column.to_string(),
            value: cell_text(cell),
        };
        tracing::debug!("{err}");
        self.issues.push(err);
    }

    /// Blank cells are silently absent; non-blank unreadable cells are noted.
    fn date(&mut self, row: &[Data], idx: usize, row_no: usize, column: &str) -> Option<NaiveDate> {
        let cell = row.get(idx).unwrap_or(&EMPTY_CELL);
        let date = cell_date(cell);
        if date.is_none() && !is_empty_cell(cell) {
            self.note(row_no, column, cell);
        }
        date
    }

    fn amount(&mut self, row: &[Data], idx: usize, row_no: usize, column: &str) -> Option<f64> {
        let cell = row.get(idx).unwrap_or(&EMPTY_CELL);
        let amount = cell_amount(cell);
        if amount.is_none() && !is_empty_cell(cell) {
            self.note(row_no, column, cell);
        }
        amount
    }
}

/// Parser output: one row per date in ascending order, plus the cells that
/// were dropped from the sums.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedSheet {
    pub rows: Vec<NormalizedRow>,
    pub coercions: Vec<CoercionError>,
}

fn finish(by_date: BTreeMap<NaiveDate, f64>, coercions: Coercions) -> ParsedSheet {
    ParsedSheet {
        rows: by_date
            .into_iter()
            .map(|(date, net_income)| NormalizedRow { date, net_income })
            .collect(),
        coercions: coercions.issues,
    }
}

/// Group the rows below `header_idx` by date, summing one amount column.
/// A row with a readable date but an unreadable amount still yields its date.
fn sum_by_date(
    sheet: &Sheet,
    header_idx: usize,
    date_column: &str,
    amount_column: &str,
) -> Result<ParsedSheet, ParseError> {
    let header = sheet.rows.get(header_idx).map(Vec::as_slice).unwrap_or(&[]);
    let date_col = sheet.column(header, date_column)?;
    let amount_col = sheet.column(header, amount_column)?;

    let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    let mut coercions = Coercions::new(sheet);
    for (row_no, row) in sheet.rows.iter().enumerate().skip(header_idx + 1) {
        if is_blank_row(row) {
            continue;
        }
        let Some(date) = coercions.date(row, date_col, row_no, date_column) else {
            continue;
        };
        let amount = coercions.amount(row, amount_col, row_no, amount_column);
        *by_date.entry(date).or_default() += amount.unwrap_or(0.0);
    }
    Ok(finish(by_date, coercions))
}

// ---------------------------------------------------------------------------
// Platforms: closed set, dispatched by tag
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Shopee,
    Tokopedia,
    TikTok,
}

impl Platform {
    pub const ALL: &'static [Platform] = &[Platform::Shopee, Platform::Tokopedia, Platform::TikTok];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Shopee => "shopee",
            Self::Tokopedia => "tokopedia",
            Self::TikTok => "tiktok",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Shopee => "Shopee",
            Self::Tokopedia => "Tokopedia",
            Self::TikTok => "TikTok Shop",
        }
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::Shopee => &["shopee"],
            Self::Tokopedia => &["tokopedia"],
            Self::TikTok => &["tiktok", "tiktok shop", "tiktokshop"],
        }
    }

    pub fn sheet_name(&self) -> &'static str {
        match self {
            Self::Shopee => SHOPEE_SHEET,
            Self::Tokopedia => TOKOPEDIA_SHEET,
            Self::TikTok => TIKTOK_SHEET,
        }
    }

    pub fn from_tag(tag: &str) -> Result<Platform, ParseError> {
        let needle = tag.trim().to_lowercase();
        Self::ALL
            .iter()
            .find(|p| p.aliases().contains(&needle.as_str()))
            .copied()
            .ok_or_else(|| ParseError::UnknownPlatform(tag.trim().to_string()))
    }

    pub fn parse(&self, workbook: &Workbook) -> Result<ParsedSheet, ParseError> {
        let sheet = workbook.sheet(self.sheet_name())?;
        match self {
            Self::Shopee => parse_shopee(sheet),
            Self::Tokopedia => parse_tokopedia(sheet),
            Self::TikTok => parse_tiktok(sheet),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Shopee: header row located by marker cell
// ---------------------------------------------------------------------------

const SHOPEE_SHEET: &str = "Income";
const SHOPEE_HEADER_MARKER: &str = "No. Pesanan";
const SHOPEE_DATE: &str = "Tanggal Dana Dilepaskan";
const SHOPEE_AMOUNT: &str = "Total Penghasilan";

fn parse_shopee(sheet: &Sheet) -> Result<ParsedSheet, ParseError> {
    let header_idx = sheet
        .rows
        .iter()
        .position(|row| row.iter().any(|c| cell_text(c).contains(SHOPEE_HEADER_MARKER)))
        .ok_or_else(|| ParseError::MissingHeader {
            sheet: sheet.name.clone(),
            marker: SHOPEE_HEADER_MARKER.to_string(),
        })?;
    sum_by_date(sheet, header_idx, SHOPEE_DATE, SHOPEE_AMOUNT)
}

// ---------------------------------------------------------------------------
// Tokopedia: two commission categories, gross minus both fees
// ---------------------------------------------------------------------------

const TOKOPEDIA_SHEET: &str = "Commission Report";
const TOKOPEDIA_CATEGORY: &str = "Commission Name";
const TOKOPEDIA_DATE: &str = "Finish Date";
const TOKOPEDIA_GROSS: &str = "Total Product Amount";
const TOKOPEDIA_FEE: &str = "Service Fee Gross";
const TOKOPEDIA_SERVICE_FEE: &str = "Biaya Layanan Power Merchant";
const TOKOPEDIA_SHIPPING_FEE: &str = "Biaya Layanan Bebas Ongkir Power Merchant";

#[derive(Debug, Default)]
struct CommissionTotals {
    gross: f64,
    service_fee: f64,
    shipping_fee: f64,
}

fn parse_tokopedia(sheet: &Sheet) -> Result<ParsedSheet, ParseError> {
    let header = sheet.rows.first().map(Vec::as_slice).unwrap_or(&[]);
    let category_col = sheet.column(header, TOKOPEDIA_CATEGORY)?;
    let date_col = sheet.column(header, TOKOPEDIA_DATE)?;
    let gross_col = sheet.column(header, TOKOPEDIA_GROSS)?;
    let fee_col = sheet.column(header, TOKOPEDIA_FEE)?;

    let mut by_date: BTreeMap<NaiveDate, CommissionTotals> = BTreeMap::new();
    let mut coercions = Coercions::new(sheet);
    for (row_no, row) in sheet.rows.iter().enumerate().skip(1) {
        let category = row.get(category_col).map(cell_text).unwrap_or_default();
        let is_service = match category.trim() {
            TOKOPEDIA_SERVICE_FEE => true,
            TOKOPEDIA_SHIPPING_FEE => false,
            _ => continue,
        };
        let Some(date) = coercions.date(row, date_col, row_no, TOKOPEDIA_DATE) else {
            continue;
        };
        let fee = coercions.amount(row, fee_col, row_no, TOKOPEDIA_FEE).unwrap_or(0.0);
        let totals = by_date.entry(date).or_default();
        if is_service {
            totals.gross += coercions
                .amount(row, gross_col, row_no, TOKOPEDIA_GROSS)
                .unwrap_or(0.0);
            totals.service_fee += fee;
        } else {
            totals.shipping_fee += fee;
        }
    }

    let net = by_date
        .into_iter()
        .map(|(date, t)| (date, t.gross - t.service_fee - t.shipping_fee))
        .collect();
    Ok(finish(net, coercions))
}

// ---------------------------------------------------------------------------
// TikTok Shop: single fixed sheet
// ---------------------------------------------------------------------------

const TIKTOK_SHEET: &str = "Order details";
const TIKTOK_DATE: &str = "Order settled time(UTC)";
const TIKTOK_AMOUNT: &str = "Total settlement amount";

fn parse_tiktok(sheet: &Sheet) -> Result<ParsedSheet, ParseError> {
    sum_by_date(sheet, 0, TIKTOK_DATE, TIKTOK_AMOUNT)
}
