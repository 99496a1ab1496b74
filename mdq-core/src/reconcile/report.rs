//! Reconciliation outputs: merged rows and the discrepancy report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::{CanonicalRecord, Cell, FieldName};

/// A matched value pair whose relative difference exceeded tolerance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationDiscrepancy {
    pub key: String,
    pub primary_value: f64,
    pub secondary_value: f64,
    pub difference_pct: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnDiscrepancies {
    pub count: usize,
    /// Mean relative difference over the discrepancies below.
    pub average_difference: f64,
    pub max_difference: f64,
    pub details: Vec<ReconciliationDiscrepancy>,
}

impl ColumnDiscrepancies {
    pub(crate) fn push(&mut self, detail: ReconciliationDiscrepancy) {
        self.max_difference = self.max_difference.max(detail.difference_pct);
        self.details.push(detail);
        self.count = self.details.len();
        self.average_difference =
            self.details.iter().map(|d| d.difference_pct).sum::<f64>() / self.count as f64;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub timestamp: DateTime<Utc>,
    pub total_records: usize,
    pub matched_records: usize,
    pub missing_in_secondary: usize,
    pub discrepancies: BTreeMap<FieldName, ColumnDiscrepancies>,
}

impl ReconciliationReport {
    pub fn discrepancy_count(&self) -> usize {
        self.discrepancies.values().map(|d| d.count).sum()
    }
}

/// Two-source outcome for one value column of one row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnOutcome {
    pub reconciled: bool,
    pub discrepancy: bool,
    /// The secondary's value, kept for audit.
    pub secondary: Option<f64>,
}

/// One primary row after two-source reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledRow {
    pub key: String,
    /// The primary record, back-filled where only the secondary had a value.
    pub record: CanonicalRecord,
    pub matched: bool,
    pub columns: BTreeMap<FieldName, ColumnOutcome>,
    pub reconciled_at: DateTime<Utc>,
    pub source_count: usize,
}

impl ReconciledRow {
    pub fn outcome(&self, column: FieldName) -> ColumnOutcome {
        self.columns.get(&column).copied().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationType {
    MultiSource,
    SingleSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusValue {
    pub value: Cell,
    /// Always within [0, 1].
    pub confidence: f64,
}

/// One entity after N-source consensus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusRecord {
    pub key: String,
    pub key_cells: BTreeMap<FieldName, Cell>,
    /// The first contributing record with value columns replaced by consensus.
    pub record: CanonicalRecord,
    pub source_count: usize,
    /// Indices into the input batch list, ascending.
    pub source_ids: Vec<usize>,
    pub values: BTreeMap<FieldName, ConsensusValue>,
    pub reconciled_at: DateTime<Utc>,
    pub reconciliation_type: ReconciliationType,
}

impl ConsensusRecord {
    pub fn value(&self, column: FieldName) -> Option<&ConsensusValue> {
        self.values.get(&column)
    }
}
