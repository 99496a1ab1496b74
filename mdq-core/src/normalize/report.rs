//! Standardization report types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::{DataType, FieldName};

/// What went wrong with one provider cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    UnparseableNumber,
    UnparseableDate,
    UnmappedCurrency,
    UnmappedFrequency,
    OutOfRange,
    SignViolation,
    DuplicateField,
}

/// A non-fatal normalization problem. The record is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Zero-based row index within the batch.
    pub row: usize,
    pub field: String,
    pub kind: IssueKind,
    pub raw: String,
}

/// Per canonical field counts across the batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldCounts {
    pub present: usize,
    pub missing: usize,
    pub invalid: usize,
    /// Cells rewritten to a canonical spelling.
    pub converted: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldCompliance {
    /// Provider name → canonical name, for every alias that fired.
    pub renamed_fields: BTreeMap<String, FieldName>,
    /// Required fields absent from every record.
    pub missing_required_fields: Vec<FieldName>,
    pub unmapped_fields: Vec<String>,
    pub fields: BTreeMap<FieldName, FieldCounts>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrencyCompliance {
    pub standardized: usize,
    pub already_canonical: usize,
    /// Raw spellings no table entry covered.
    pub unmapped: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateCompliance {
    pub parsed: usize,
    pub unparseable: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardizationReport {
    pub data_type: DataType,
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub record_count: usize,
    pub issues_fixed: usize,
    pub field_compliance: FieldCompliance,
    pub currency_compliance: BTreeMap<FieldName, CurrencyCompliance>,
    pub date_compliance: BTreeMap<FieldName, DateCompliance>,
    pub issues: Vec<ValidationIssue>,
}

impl StandardizationReport {
    pub fn new(data_type: DataType, source: &str) -> Self {
        Self {
            data_type,
            source: source.to_string(),
            timestamp: Utc::now(),
            record_count: 0,
            issues_fixed: 0,
            field_compliance: FieldCompliance::default(),
            currency_compliance: BTreeMap::new(),
            date_compliance: BTreeMap::new(),
            issues: Vec::new(),
        }
    }

    pub fn issues_of(&self, kind: IssueKind) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(move |i| i.kind == kind)
    }

    pub(crate) fn record_issue(&mut self, row: usize, field: &str, kind: IssueKind, raw: String) {
        self.issues.push(ValidationIssue {
            row,
            field: field.to_string(),
            kind,
            raw,
        });
        self.issues_fixed += 1;
    }
}
