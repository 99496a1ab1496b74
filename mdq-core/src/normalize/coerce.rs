//! Value coercion: numbers, dates, quarters, currencies, frequencies.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::HashMap;

use crate::domain::{CurrencyCode, Frequency, RawValue};

/// Built-in free-text currency spellings.
pub const CURRENCY_SPELLINGS: &[(&str, &str)] = &[
    ("US DOLLAR", "USD"),
    ("US$", "USD"),
    ("$", "USD"),
    ("DOLLAR", "USD"),
    ("EURO", "EUR"),
    ("€", "EUR"),
    ("POUND", "GBP"),
    ("£", "GBP"),
    ("YEN", "JPY"),
    ("¥", "JPY"),
    ("RAND", "ZAR"),
    ("R", "ZAR"),
    ("YUAN", "CNY"),
    ("AUSTRALIAN DOLLAR", "AUD"),
    ("CANADIAN DOLLAR", "CAD"),
    ("SWISS FRANC", "CHF"),
    ("INDIAN RUPEE", "INR"),
    ("BRAZILIAN REAL", "BRL"),
    ("RUSSIAN RUBLE", "RUB"),
    ("MEXICAN PESO", "MXN"),
    ("SOUTH KOREAN WON", "KRW"),
    ("SINGAPORE DOLLAR", "SGD"),
    ("SOUTH AFRICAN RAND", "ZAR"),
];

/// Built-in frequency spellings.
pub const FREQUENCY_SPELLINGS: &[(&str, Frequency)] = &[
    ("Q", Frequency::Quarterly),
    ("QTR", Frequency::Quarterly),
    ("QUARTER", Frequency::Quarterly),
    ("QUARTERLY", Frequency::Quarterly),
    ("A", Frequency::Annual),
    ("Y", Frequency::Annual),
    ("ANNUAL", Frequency::Annual),
    ("ANNUALLY", Frequency::Annual),
    ("YEARLY", Frequency::Annual),
    ("S", Frequency::SemiAnnual),
    ("SA", Frequency::SemiAnnual),
    ("SEMI", Frequency::SemiAnnual),
    ("SEMI-ANNUAL", Frequency::SemiAnnual),
    ("SEMIANNUAL", Frequency::SemiAnnual),
    ("SEMI_ANNUAL", Frequency::SemiAnnual),
    ("M", Frequency::Monthly),
    ("MONTH", Frequency::Monthly),
    ("MONTHLY", Frequency::Monthly),
    ("SP", Frequency::Special),
    ("SPECIAL", Frequency::Special),
    ("EXTRA", Frequency::Special),
    ("I", Frequency::Irregular),
    ("IRR", Frequency::Irregular),
    ("IRREGULAR", Frequency::Irregular),
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%Y%m%d"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

pub fn currency_table() -> HashMap<String, CurrencyCode> {
    CURRENCY_SPELLINGS
        .iter()
        .filter_map(|(spelling, code)| Some((spelling.to_string(), CurrencyCode::parse(code)?)))
        .collect()
}

pub fn frequency_table() -> HashMap<String, Frequency> {
    FREQUENCY_SPELLINGS
        .iter()
        .map(|(spelling, freq)| (spelling.to_string(), *freq))
        .collect()
}

/// Lookup key for currency and frequency tables.
pub fn spelling_key(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Parse a numeric cell. Text may carry thousands separators.
pub fn parse_number(raw: &RawValue) -> Option<f64> {
    match raw {
        RawValue::Number(v) if v.is_finite() => Some(*v),
        RawValue::Text(s) => {
            let cleaned: String = s.trim().chars().filter(|c| *c != ',' && *c != '_').collect();
            cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
        }
        _ => None,
    }
}

/// Parse an integral cell; fractional numbers are rejected.
pub fn parse_integer(raw: &RawValue) -> Option<i64> {
    let v = parse_number(raw)?;
    if v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}

/// Parse a date, accepting the usual provider spellings and timestamps.
pub fn parse_date(raw: &RawValue) -> Option<NaiveDate> {
    let text = match raw {
        RawValue::Text(s) => s.trim().to_string(),
        RawValue::Number(v) if v.fract() == 0.0 => format!("{}", *v as i64),
        _ => return None,
    };
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(&text, fmt) {
            return Some(d);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&text, fmt) {
            return Some(dt.date());
        }
    }
    DateTime::parse_from_rfc3339(&text).ok().map(|dt| dt.date_naive())
}

/// Parse a fiscal quarter: `1`..`4`, `Q1`, `QTR1`, `QUARTER1`.
pub fn parse_quarter(raw: &RawValue) -> Option<i64> {
    let q = match raw {
        RawValue::Text(s) => {
            let upper = s.trim().to_ascii_uppercase();
            let digits = upper
                .strip_prefix("QUARTER")
                .or_else(|| upper.strip_prefix("QTR"))
                .or_else(|| upper.strip_prefix('Q'))
                .unwrap_or(&upper);
            parse_integer(&RawValue::Text(digits.trim().to_string()))?
        }
        other => parse_integer(other)?,
    };
    (1..=4).contains(&q).then_some(q)
}
