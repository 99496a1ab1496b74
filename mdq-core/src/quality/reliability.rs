//! Running per-source reliability.
//!
//! This is the only pipeline state that outlives a single call. It is plain
//! serializable data so a caller can persist it and inject it again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceStats {
    pub total_records: usize,
    pub anomaly_records: usize,
    pub anomaly_rate: f64,
    /// `1 - anomaly_rate`.
    pub reliability_score: f64,
    pub last_updated: Option<DateTime<Utc>>,
}

impl Default for SourceStats {
    fn default() -> Self {
        Self {
            total_records: 0,
            anomaly_records: 0,
            anomaly_rate: 0.0,
            reliability_score: 1.0,
            last_updated: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceReliability {
    sources: BTreeMap<String, SourceStats>,
}

impl SourceReliability {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one checked batch into the source's running totals.
    pub fn record(&mut self, source: &str, records: usize, anomalous: usize, at: DateTime<Utc>) {
        let stats = self.sources.entry(source.to_string()).or_default();
        stats.total_records += records;
        stats.anomaly_records += anomalous;
        stats.anomaly_rate = if stats.total_records > 0 {
            stats.anomaly_records as f64 / stats.total_records as f64
        } else {
            0.0
        };
        stats.reliability_score = 1.0 - stats.anomaly_rate;
        stats.last_updated = Some(at);
    }

    pub fn get(&self, source: &str) -> Option<&SourceStats> {
        self.sources.get(source)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SourceStats)> {
        self.sources.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn report(&self) -> SourceReliabilityReport {
        let total: usize = self.sources.values().map(|s| s.total_records).sum();
        let overall_reliability = if total > 0 {
            self.sources
                .values()
                .map(|s| s.reliability_score * s.total_records as f64 / total as f64)
                .sum()
        } else {
            0.0
        };

        let mut ranking: Vec<(&String, f64)> = self
            .sources
            .iter()
            .map(|(name, s)| (name, s.reliability_score))
            .collect();
        ranking.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        SourceReliabilityReport {
            timestamp: Utc::now(),
            sources: self.sources.clone(),
            overall_reliability,
            ranking: ranking.into_iter().map(|(name, _)| name.clone()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceReliabilityReport {
    pub timestamp: DateTime<Utc>,
    pub sources: BTreeMap<String, SourceStats>,
    /// Record-weighted mean of the per-source scores; 0 with no history.
    pub overall_reliability: f64,
    /// Source names, most reliable first.
    pub ranking: Vec<String>,
}

impl SourceReliabilityReport {
    pub fn score(&self, source: &str) -> Option<f64> {
        self.sources.get(source).map(|s| s.reliability_score)
    }
}
