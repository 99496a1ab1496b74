//! Data types and their closed canonical schemas.
//!
//! Every canonical field name lives in [`FieldName`]. A [`DataType`] owns a
//! fixed slice of those fields; nothing about the schema is discovered from
//! the rows at runtime.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigurationError;

/// The recognized kinds of financial time-series record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Price,
    Dividend,
    Earnings,
}

impl DataType {
    pub const ALL: [DataType; 3] = [DataType::Price, DataType::Dividend, DataType::Earnings];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Dividend => "dividend",
            Self::Earnings => "earnings",
        }
    }

    /// Every canonical field of this type, required fields first.
    pub fn schema(&self) -> &'static [FieldName] {
        use FieldName::*;
        match self {
            Self::Price => &[
                Date, Symbol, Open, High, Low, Close, Volume, AdjClose, Exchange, AssetType,
                Currency,
            ],
            Self::Dividend => &[
                Symbol,
                ExDate,
                DividendAmount,
                PaymentDate,
                DeclarationDate,
                RecordDate,
                Frequency,
                Currency,
                Exchange,
            ],
            Self::Earnings => &[
                Symbol,
                ReportDate,
                Eps,
                FiscalYear,
                FiscalQuarter,
                ExpectedEps,
                SurprisePct,
                Revenue,
                QuarterEndDate,
                Currency,
                Market,
            ],
        }
    }

    /// Fields a well-formed record of this type must carry a value for.
    pub fn required(&self) -> &'static [FieldName] {
        use FieldName::*;
        match self {
            Self::Price => &[Date, Symbol, Open, High, Low, Close],
            Self::Dividend => &[Symbol, ExDate, DividendAmount],
            Self::Earnings => &[Symbol, ReportDate, Eps],
        }
    }

    pub fn contains(&self, field: FieldName) -> bool {
        self.schema().contains(&field)
    }

    /// The field that orders records of one symbol in time.
    pub fn time_field(&self) -> FieldName {
        match self {
            Self::Price => FieldName::Date,
            Self::Dividend => FieldName::ExDate,
            Self::Earnings => FieldName::ReportDate,
        }
    }

    /// Resolve a column name against this type's schema.
    pub fn resolve_column(&self, column: &str) -> Result<FieldName, ConfigurationError> {
        FieldName::from_str(column)
            .ok()
            .filter(|f| self.contains(*f))
            .ok_or_else(|| ConfigurationError::UnknownColumn {
                column: column.to_string(),
                data_type: *self,
            })
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "price" => Ok(Self::Price),
            "dividend" => Ok(Self::Dividend),
            "earnings" => Ok(Self::Earnings),
            _ => Err(ConfigurationError::UnknownDataType(s.to_string())),
        }
    }
}

/// How a canonical field's values are coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Number,
    Integer,
    Date,
    Text,
    Symbol,
    Currency,
    Frequency,
}

impl FieldKind {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Number | Self::Integer)
    }
}

/// Every canonical field across all data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    Date,
    Symbol,
    Open,
    High,
    Low,
    Close,
    Volume,
    AdjClose,
    Exchange,
    AssetType,
    Currency,
    ExDate,
    PaymentDate,
    DeclarationDate,
    RecordDate,
    DividendAmount,
    Frequency,
    ReportDate,
    QuarterEndDate,
    FiscalYear,
    FiscalQuarter,
    Eps,
    ExpectedEps,
    SurprisePct,
    Revenue,
    Market,
}

impl FieldName {
    pub const ALL: [FieldName; 26] = [
        Self::Date,
        Self::Symbol,
        Self::Open,
        Self::High,
        Self::Low,
        Self::Close,
        Self::Volume,
        Self::AdjClose,
        Self::Exchange,
        Self::AssetType,
        Self::Currency,
        Self::ExDate,
        Self::PaymentDate,
        Self::DeclarationDate,
        Self::RecordDate,
        Self::DividendAmount,
        Self::Frequency,
        Self::ReportDate,
        Self::QuarterEndDate,
        Self::FiscalYear,
        Self::FiscalQuarter,
        Self::Eps,
        Self::ExpectedEps,
        Self::SurprisePct,
        Self::Revenue,
        Self::Market,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Symbol => "symbol",
            Self::Open => "open",
            Self::High => "high",
            Self::Low => "low",
            Self::Close => "close",
            Self::Volume => "volume",
            Self::AdjClose => "adj_close",
            Self::Exchange => "exchange",
            Self::AssetType => "asset_type",
            Self::Currency => "currency",
            Self::ExDate => "ex_date",
            Self::PaymentDate => "payment_date",
            Self::DeclarationDate => "declaration_date",
            Self::RecordDate => "record_date",
            Self::DividendAmount => "dividend_amount",
            Self::Frequency => "frequency",
            Self::ReportDate => "report_date",
            Self::QuarterEndDate => "quarter_end_date",
            Self::FiscalYear => "fiscal_year",
            Self::FiscalQuarter => "fiscal_quarter",
            Self::Eps => "eps",
            Self::ExpectedEps => "expected_eps",
            Self::SurprisePct => "surprise_pct",
            Self::Revenue => "revenue",
            Self::Market => "market",
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Open
            | Self::High
            | Self::Low
            | Self::Close
            | Self::Volume
            | Self::AdjClose
            | Self::DividendAmount
            | Self::Eps
            | Self::ExpectedEps
            | Self::SurprisePct
            | Self::Revenue => FieldKind::Number,
            Self::FiscalYear | Self::FiscalQuarter => FieldKind::Integer,
            Self::Date
            | Self::ExDate
            | Self::PaymentDate
            | Self::DeclarationDate
            | Self::RecordDate
            | Self::ReportDate
            | Self::QuarterEndDate => FieldKind::Date,
            Self::Symbol => FieldKind::Symbol,
            Self::Currency => FieldKind::Currency,
            Self::Frequency => FieldKind::Frequency,
            Self::Exchange | Self::AssetType | Self::Market => FieldKind::Text,
        }
    }

    /// Fields whose values can never legitimately be negative.
    pub fn is_non_negative(&self) -> bool {
        matches!(self, Self::DividendAmount | Self::Volume)
    }

    /// Tolerance class used when the column has no tolerance of its own.
    pub fn tolerance_class(&self) -> &'static str {
        match self {
            Self::Volume => "volume",
            Self::Eps | Self::ExpectedEps => "eps",
            Self::Revenue => "revenue",
            _ => "price",
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldName {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == wanted)
            .ok_or_else(|| ConfigurationError::UnknownField(s.to_string()))
    }
}
