//! Provenance stamped onto canonical records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::cell::Cell;
use super::data_type::FieldName;

/// Where a record came from and what has been done to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lineage {
    pub source: String,
    pub processor: String,
    pub version: String,
    pub processing_steps: Vec<String>,
    pub timestamp: DateTime<Utc>,
    /// BLAKE3 over the business cells at stamping time.
    pub fingerprint: String,
}

/// Caller-supplied description of a processing stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub processor: String,
    pub version: String,
    pub steps: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl ProcessInfo {
    pub fn new(processor: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            processor: processor.into(),
            version: version.into(),
            steps: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_step(mut self, step: impl Into<String>) -> Self {
        self.steps.push(step.into());
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Deterministic content hash of a record's business cells.
pub fn fingerprint_cells(cells: &BTreeMap<FieldName, Cell>) -> String {
    let mut hasher = blake3::Hasher::new();
    for (field, cell) in cells {
        hasher.update(field.as_str().as_bytes());
        hasher.update(b"=");
        hasher.update(&[cell_tag(cell)]);
        match cell {
            Cell::Number(v) => {
                hasher.update(&v.to_le_bytes());
            }
            other => {
                hasher.update(other.key_text().as_bytes());
            }
        }
        hasher.update(b";");
    }
    hasher.finalize().to_hex().to_string()
}

/// One byte per cell variant, so `Integer(1)` and `Text("1")` hash apart.
fn cell_tag(cell: &Cell) -> u8 {
    match cell {
        Cell::Missing => 0,
        Cell::Number(_) => 1,
        Cell::Integer(_) => 2,
        Cell::Date(_) => 3,
        Cell::Text(_) => 4,
        Cell::Currency(_) => 5,
        Cell::Frequency(_) => 6,
        Cell::Invalid { .. } => 7,
    }
}
