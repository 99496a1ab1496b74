//! Cross-source reconciliation.
//!
//! Two paths share one engine:
//! - two-source, tolerance based ([`ReconciliationEngine::reconcile_price_data`]
//!   and its dividend/earnings wrappers);
//! - N-source consensus with z-score outlier rejection
//!   ([`ReconciliationEngine::reconcile_multiple_sources`]).
//!
//! The engine holds configuration only, so it is safe to share between
//! threads without locking.

pub mod consensus;
pub mod pairwise;
pub mod report;
pub mod tolerance;

pub use consensus::SourceTrust;
pub use report::{
    ColumnDiscrepancies, ColumnOutcome, ConsensusRecord, ConsensusValue, ReconciledRow,
    ReconciliationDiscrepancy, ReconciliationReport, ReconciliationType,
};
pub use tolerance::ToleranceTable;

use std::collections::HashSet;
use tracing::warn;

use crate::config::ReconciliationConfig;
use crate::domain::{Batch, CanonicalRecord, DataType, FieldName};
use crate::error::ConfigurationError;

#[derive(Debug, Clone, Default)]
pub struct ReconciliationEngine {
    config: ReconciliationConfig,
}

impl ReconciliationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ReconciliationConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ReconciliationConfig {
        &self.config
    }

    pub fn tolerance(&self, column: FieldName) -> f64 {
        self.config.tolerances.for_column(column)
    }
}

/// Resolve column names against a data type's schema.
pub(crate) fn resolve_columns(
    data_type: DataType,
    names: &[&str],
) -> Result<Vec<FieldName>, ConfigurationError> {
    names.iter().map(|n| data_type.resolve_column(n)).collect()
}

pub(crate) fn resolve_keys(
    data_type: DataType,
    names: &[&str],
) -> Result<Vec<FieldName>, ConfigurationError> {
    if names.is_empty() {
        return Err(ConfigurationError::NoKeyColumns);
    }
    resolve_columns(data_type, names)
}

/// Every batch must carry the first batch's data type.
pub(crate) fn ensure_same_type<'a>(
    batches: impl IntoIterator<Item = &'a Batch>,
) -> Result<Option<DataType>, ConfigurationError> {
    let mut expected = None;
    for batch in batches {
        match expected {
            None => expected = Some(batch.data_type),
            Some(dt) if dt != batch.data_type => {
                return Err(ConfigurationError::MixedDataTypes {
                    expected: dt,
                    found: batch.data_type,
                    source_name: batch.source.clone(),
                })
            }
            Some(_) => {}
        }
    }
    Ok(expected)
}

/// Records with their reconciliation key, first occurrence per key only.
pub(crate) fn unique_by_key<'a>(
    batch: &'a Batch,
    keys: &[FieldName],
) -> Vec<(String, &'a CanonicalRecord)> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(batch.len());
    for record in &batch.records {
        let key = record.key(keys);
        if seen.insert(key.clone()) {
            out.push((key, record));
        } else {
            warn!(source = %batch.source, key = %key, "duplicate reconciliation key, keeping first");
        }
    }
    out
}
