//! N-source consensus with z-score outlier rejection.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use super::report::{ConsensusRecord, ConsensusValue, ReconciliationType};
use super::{ensure_same_type, resolve_columns, resolve_keys, unique_by_key, ReconciliationEngine};
use crate::config::ReconciliationConfig;
use crate::domain::{Batch, CanonicalRecord, Cell, FieldKind, FieldName};
use crate::error::ConfigurationError;
use crate::quality::SourceReliabilityReport;
use crate::stats;

/// Per-source vote weight for non-numeric consensus.
///
/// Sources without an entry weigh 1.0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceTrust {
    weights: BTreeMap<String, f64>,
}

impl SourceTrust {
    pub fn new() -> Self {
        Self::default()
    }

    /// Weight every known source by its reliability score.
    pub fn from_reliability(report: &SourceReliabilityReport) -> Self {
        Self {
            weights: report
                .sources
                .iter()
                .map(|(name, s)| (name.clone(), s.reliability_score.clamp(0.0, 1.0)))
                .collect(),
        }
    }

    pub fn with(mut self, source: impl Into<String>, weight: f64) -> Self {
        self.weights.insert(source.into(), weight.max(0.0));
        self
    }

    pub fn weight(&self, source: &str) -> f64 {
        self.weights.get(source).copied().unwrap_or(1.0)
    }
}

/// One source's contribution to a key group.
struct Contribution<'a> {
    source_id: usize,
    source: &'a str,
    record: &'a CanonicalRecord,
}

impl ReconciliationEngine {
    /// Merge any number of sources into one record per key.
    pub fn reconcile_multiple_sources(
        &self,
        sources: &[Batch],
        key_columns: &[&str],
        value_columns: &[&str],
    ) -> Result<Vec<ConsensusRecord>, ConfigurationError> {
        self.reconcile_sources(sources, key_columns, value_columns, None)
    }

    /// As [`reconcile_multiple_sources`](Self::reconcile_multiple_sources),
    /// with majority votes weighted by source trust.
    pub fn reconcile_multiple_sources_weighted(
        &self,
        sources: &[Batch],
        key_columns: &[&str],
        value_columns: &[&str],
        trust: &SourceTrust,
    ) -> Result<Vec<ConsensusRecord>, ConfigurationError> {
        self.reconcile_sources(sources, key_columns, value_columns, Some(trust))
    }

    fn reconcile_sources(
        &self,
        sources: &[Batch],
        key_columns: &[&str],
        value_columns: &[&str],
        trust: Option<&SourceTrust>,
    ) -> Result<Vec<ConsensusRecord>, ConfigurationError> {
        let Some(data_type) = ensure_same_type(sources)? else {
            // No schema to resolve against; the names must still be known fields.
            if key_columns.is_empty() {
                return Err(ConfigurationError::NoKeyColumns);
            }
            for name in key_columns.iter().chain(value_columns) {
                name.parse::<FieldName>()?;
            }
            warn!("no sources supplied for reconciliation");
            return Ok(Vec::new());
        };
        let keys = resolve_keys(data_type, key_columns)?;
        let values = resolve_columns(data_type, value_columns)?;
        let now = Utc::now();

        if let [only] = sources {
            warn!(source = %only.source, "single source, no reconciliation needed");
            return Ok(only
                .records
                .iter()
                .map(|record| ConsensusRecord {
                    key: record.key(&keys),
                    key_cells: key_cells(record, &keys),
                    record: record.clone(),
                    source_count: 1,
                    source_ids: vec![0],
                    values: values
                        .iter()
                        .map(|col| {
                            let value = ConsensusValue {
                                value: record.get(*col).clone(),
                                confidence: 1.0,
                            };
                            (*col, value)
                        })
                        .collect(),
                    reconciled_at: now,
                    reconciliation_type: ReconciliationType::SingleSource,
                })
                .collect());
        }

        info!(sources = sources.len(), %data_type, "reconciling multiple sources");

        let mut groups: BTreeMap<String, Vec<Contribution<'_>>> = BTreeMap::new();
        for (source_id, batch) in sources.iter().enumerate() {
            for (key, record) in unique_by_key(batch, &keys) {
                groups.entry(key).or_default().push(Contribution {
                    source_id,
                    source: &batch.source,
                    record,
                });
            }
        }

        let mut out = Vec::with_capacity(groups.len());
        for (key, group) in groups {
            let first = group[0].record;
            let mut record = first.clone();
            record
                .lineage
                .processing_steps
                .push("reconcile_multi_source".to_string());

            let mut merged = BTreeMap::new();
            for col in &values {
                let votes: Vec<(&Cell, f64)> = group
                    .iter()
                    .filter(|c| !(self.config.skip_anomalous && c.record.has_anomaly()))
                    .map(|c| (c.record.get(*col), trust.map_or(1.0, |t| t.weight(c.source))))
                    .filter(|(cell, _)| cell.is_valid())
                    .collect();
                let value = consensus(*col, &votes, &self.config);
                debug!(key = %key, column = %col, confidence = value.confidence, "consensus");
                record.set(*col, value.value.clone());
                merged.insert(*col, value);
            }

            out.push(ConsensusRecord {
                key_cells: key_cells(first, &keys),
                key,
                record,
                source_count: group.len(),
                source_ids: group.iter().map(|c| c.source_id).collect(),
                values: merged,
                reconciled_at: now,
                reconciliation_type: ReconciliationType::MultiSource,
            });
        }

        info!(
            records = out.len(),
            sources = sources.len(),
            "multi-source reconciliation complete"
        );
        Ok(out)
    }
}

fn key_cells(record: &CanonicalRecord, keys: &[FieldName]) -> BTreeMap<FieldName, Cell> {
    keys.iter().map(|k| (*k, record.get(*k).clone())).collect()
}

/// Reduce one column's valid cells (with vote weights) to a single value.
fn consensus(column: FieldName, votes: &[(&Cell, f64)], config: &ReconciliationConfig) -> ConsensusValue {
    match votes {
        [] => ConsensusValue {
            value: Cell::Missing,
            confidence: 0.0,
        },
        [(only, _)] => ConsensusValue {
            value: (*only).clone(),
            confidence: 1.0,
        },
        _ => {
            let numbers: Option<Vec<f64>> = votes.iter().map(|(cell, _)| cell.as_f64()).collect();
            match numbers {
                Some(numbers) => numeric_consensus(column, &numbers, config),
                None => majority_vote(votes),
            }
        }
    }
}

/// Median-centred z-scores with population standard deviation; the
/// result is the mean of the non-outliers.
pub(crate) fn numeric_consensus(
    column: FieldName,
    values: &[f64],
    config: &ReconciliationConfig,
) -> ConsensusValue {
    let (Some(median), Some(std)) = (stats::median(values), stats::population_std(values)) else {
        return ConsensusValue {
            value: Cell::Missing,
            confidence: 0.0,
        };
    };
    let kept: Vec<f64> = values
        .iter()
        .copied()
        .filter(|v| {
            let z = if std != 0.0 { (v - median) / std } else { 0.0 };
            z.abs() <= config.outlier_z_threshold
        })
        .collect();

    let (value, confidence) = match (stats::mean(&kept), stats::population_std(&kept)) {
        (Some(mean), Some(spread)) => (mean, (1.0 / (1.0 + spread)).min(1.0)),
        _ => (median, config.all_outlier_confidence),
    };
    let cell = if column.kind() == FieldKind::Integer && value.fract() == 0.0 {
        Cell::Integer(value as i64)
    } else {
        Cell::Number(value)
    };
    ConsensusValue {
        value: cell,
        confidence: confidence.clamp(0.0, 1.0),
    }
}

/// Most-weighted value wins; ties go to the first seen.
fn majority_vote(votes: &[(&Cell, f64)]) -> ConsensusValue {
    let mut tally: Vec<(String, &Cell, usize, f64)> = Vec::new();
    for (cell, weight) in votes {
        let text = cell.key_text();
        match tally.iter_mut().find(|(t, ..)| *t == text) {
            Some(entry) => {
                entry.2 += 1;
                entry.3 += weight;
            }
            None => tally.push((text, *cell, 1, *weight)),
        }
    }
    let total_weight: f64 = tally.iter().map(|t| t.3).sum();
    let weighted = total_weight > 0.0;

    let mut best = 0;
    for (i, entry) in tally.iter().enumerate() {
        let better = if weighted {
            entry.3 > tally[best].3
        } else {
            entry.2 > tally[best].2
        };
        if better {
            best = i;
        }
    }
    let (_, cell, count, weight) = &tally[best];
    let confidence = if weighted {
        weight / total_weight
    } else {
        *count as f64 / votes.len() as f64
    };
    ConsensusValue {
        value: (*cell).clone(),
        confidence: confidence.clamp(0.0, 1.0),
    }
}
