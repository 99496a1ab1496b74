//! Per-batch quality summary returned by the monitor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::metrics::QualityMetrics;
use super::rules::AnomalyKind;
use crate::domain::DataType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub data_type: DataType,
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub record_count: usize,
    /// Total rule hits. A record can contribute several.
    pub anomalies_detected: usize,
    pub anomalous_records: usize,
    pub anomaly_types: BTreeMap<AnomalyKind, usize>,
    pub metrics: QualityMetrics,
}

impl QualityReport {
    pub fn count(&self, kind: AnomalyKind) -> usize {
        self.anomaly_types.get(&kind).copied().unwrap_or(0)
    }
}
