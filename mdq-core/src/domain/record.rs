//! Raw and canonical records, and the batches that carry them between stages.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::cell::{Cell, RawValue};
use super::data_type::{DataType, FieldName};
use super::lineage::{fingerprint_cells, Lineage};
use crate::quality::QualityAnomaly;

/// One provider row: arbitrary field names in provider order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub fields: Vec<(String, RawValue)>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn push(&mut self, name: impl Into<String>, value: RawValue) {
        self.fields.push((name.into(), value));
    }
}

/// Provider rows tagged with the provider that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBatch {
    pub source: String,
    pub records: Vec<RawRecord>,
}

impl RawBatch {
    pub fn new(source: impl Into<String>, records: Vec<RawRecord>) -> Self {
        Self {
            source: source.into(),
            records,
        }
    }
}

/// Per-record quality outcome, attached by the quality monitor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityAnnotation {
    pub has_anomaly: bool,
    pub anomalies: Vec<QualityAnomaly>,
}

/// A record conforming to its data type's canonical schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    data_type: DataType,
    cells: BTreeMap<FieldName, Cell>,
    /// Provider fields with no canonical home, kept verbatim.
    pub extras: BTreeMap<String, RawValue>,
    pub lineage: Lineage,
    /// `None` until the record has been through the quality monitor.
    pub quality: Option<QualityAnnotation>,
}

impl CanonicalRecord {
    /// Build a record holding every schema field of `data_type`.
    ///
    /// Cells for fields outside the schema are ignored; schema fields not
    /// supplied are set to [`Cell::Missing`].
    pub fn new(
        data_type: DataType,
        source: &str,
        supplied: impl IntoIterator<Item = (FieldName, Cell)>,
    ) -> Self {
        let mut cells: BTreeMap<FieldName, Cell> = data_type
            .schema()
            .iter()
            .map(|f| (*f, Cell::Missing))
            .collect();
        for (field, cell) in supplied {
            if let Some(slot) = cells.get_mut(&field) {
                *slot = cell;
            }
        }
        let lineage = Lineage {
            source: source.to_string(),
            processor: "field_normalizer".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            processing_steps: vec!["standardize".to_string()],
            timestamp: Utc::now(),
            fingerprint: fingerprint_cells(&cells),
        };
        Self {
            data_type,
            cells,
            extras: BTreeMap::new(),
            lineage,
            quality: None,
        }
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn cells(&self) -> &BTreeMap<FieldName, Cell> {
        &self.cells
    }

    /// The cell for `field`; fields outside the schema read as missing.
    pub fn get(&self, field: FieldName) -> &Cell {
        static MISSING: Cell = Cell::Missing;
        self.cells.get(&field).unwrap_or(&MISSING)
    }

    /// Overwrite a schema cell. Returns false if `field` is outside the schema.
    pub fn set(&mut self, field: FieldName, cell: Cell) -> bool {
        match self.cells.get_mut(&field) {
            Some(slot) => {
                *slot = cell;
                true
            }
            None => false,
        }
    }

    pub fn number(&self, field: FieldName) -> Option<f64> {
        self.get(field).as_f64()
    }

    pub fn date(&self, field: FieldName) -> Option<NaiveDate> {
        self.get(field).as_date()
    }

    pub fn symbol(&self) -> Option<&str> {
        self.get(FieldName::Symbol).as_text()
    }

    pub fn has_anomaly(&self) -> bool {
        self.quality.as_ref().is_some_and(|q| q.has_anomaly)
    }

    /// Reconciliation key: key cells rendered as text, joined with `_`.
    pub fn key(&self, key_columns: &[FieldName]) -> String {
        key_columns
            .iter()
            .map(|f| self.get(*f).key_text())
            .collect::<Vec<_>>()
            .join("_")
    }
}

/// Canonical records of one data type from one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub source: String,
    pub data_type: DataType,
    pub records: Vec<CanonicalRecord>,
}

impl Batch {
    pub fn new(source: impl Into<String>, data_type: DataType, records: Vec<CanonicalRecord>) -> Self {
        Self {
            source: source.into(),
            data_type,
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records the quality monitor did not flag (unchecked records pass).
    pub fn without_anomalies(&self) -> Batch {
        Batch {
            source: self.source.clone(),
            data_type: self.data_type,
            records: self
                .records
                .iter()
                .filter(|r| !r.has_anomaly())
                .cloned()
                .collect(),
        }
    }
}
