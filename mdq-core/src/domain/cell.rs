//! Cell values, before and after normalization.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A provider cell as it arrives, before any coercion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Null,
    Number(f64),
    Text(String),
}

impl RawValue {
    pub fn is_null(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Number(v) => v.is_nan(),
            Self::Text(s) => s.trim().is_empty(),
        }
    }
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<&str> for RawValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for RawValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Number(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Three-letter ISO-4217-like currency code, always upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Accepts exactly three ASCII letters, in any case.
    pub fn parse(code: &str) -> Option<Self> {
        let code = code.trim();
        if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
            Some(Self(code.to_ascii_uppercase()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Closed enumeration of dividend payment frequencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Quarterly,
    Annual,
    SemiAnnual,
    Monthly,
    Special,
    Irregular,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quarterly => "quarterly",
            Self::Annual => "annual",
            Self::SemiAnnual => "semi_annual",
            Self::Monthly => "monthly",
            Self::Special => "special",
            Self::Irregular => "irregular",
        }
    }

    /// Canonical name lookup, ignoring case and surrounding whitespace.
    pub fn from_canonical(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quarterly" => Some(Self::Quarterly),
            "annual" => Some(Self::Annual),
            "semi_annual" => Some(Self::SemiAnnual),
            "monthly" => Some(Self::Monthly),
            "special" => Some(Self::Special),
            "irregular" => Some(Self::Irregular),
            _ => None,
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One canonical value.
///
/// `Missing` is the explicit null marker: canonical records never omit a
/// schema field. `Invalid` keeps the provider's raw text when coercion
/// failed, so nothing is discarded silently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Cell {
    Missing,
    Number(f64),
    Integer(i64),
    Date(NaiveDate),
    Text(String),
    Currency(CurrencyCode),
    Frequency(Frequency),
    Invalid { raw: String, reason: String },
}

impl Cell {
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid { .. })
    }

    /// A value that is neither missing nor invalid.
    pub fn is_valid(&self) -> bool {
        !self.is_missing() && !self.is_invalid()
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) if v.is_finite() => Some(*v),
            Self::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Comparable text form used to build reconciliation keys.
    pub fn key_text(&self) -> String {
        match self {
            Self::Missing => String::new(),
            Self::Number(v) => format!("{v}"),
            Self::Integer(v) => v.to_string(),
            Self::Date(d) => d.format("%Y-%m-%d").to_string(),
            Self::Text(s) => s.clone(),
            Self::Currency(c) => c.to_string(),
            Self::Frequency(f) => f.to_string(),
            Self::Invalid { raw, .. } => raw.clone(),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key_text())
    }
}
