//! Anomaly detection and source reliability tracking.
//!
//! [`QualityMonitor::check_data_quality`] annotates every record and returns
//! a [`QualityReport`]. The monitor owns a [`SourceReliability`] aggregate
//! that each call updates once, under a lock, so one monitor can be shared
//! across worker threads.

pub mod metrics;
pub mod reliability;
pub mod report;
pub mod rules;

pub use metrics::QualityMetrics;
pub use reliability::{SourceReliability, SourceReliabilityReport, SourceStats};
pub use report::QualityReport;
pub use rules::{AnomalyKind, QualityAnomaly};

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::config::QualityConfig;
use crate::domain::{Batch, QualityAnnotation};
use crate::error::ConfigurationError;

#[derive(Debug, Default)]
pub struct QualityMonitor {
    config: QualityConfig,
    reliability: Mutex<SourceReliability>,
}

impl QualityMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: QualityConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self {
            config,
            reliability: Mutex::new(SourceReliability::new()),
        })
    }

    /// Resume from previously persisted reliability state.
    pub fn with_reliability(self, reliability: SourceReliability) -> Self {
        Self {
            config: self.config,
            reliability: Mutex::new(reliability),
        }
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    /// Annotate every record and fold the outcome into the source's
    /// reliability. Never fails on data problems.
    pub fn check_data_quality(&self, batch: &Batch) -> (Batch, QualityReport) {
        let started = Utc::now();
        let mut report = QualityReport {
            data_type: batch.data_type,
            source: batch.source.clone(),
            timestamp: started,
            record_count: batch.len(),
            anomalies_detected: 0,
            anomalous_records: 0,
            anomaly_types: BTreeMap::new(),
            metrics: QualityMetrics::default(),
        };
        if batch.is_empty() {
            warn!(source = %batch.source, data_type = %batch.data_type, "empty batch, nothing to check");
            return (batch.clone(), report);
        }

        let hits = rules::detect(batch.data_type, &batch.records, &self.config);
        let mut annotated = batch.clone();
        for (record, anomalies) in annotated.records.iter_mut().zip(hits) {
            for anomaly in &anomalies {
                *report.anomaly_types.entry(anomaly.kind).or_default() += 1;
                debug!(
                    source = %batch.source,
                    kind = %anomaly.kind,
                    reason = %anomaly.reason,
                    "anomaly"
                );
            }
            report.anomalies_detected += anomalies.len();
            if !anomalies.is_empty() {
                report.anomalous_records += 1;
            }
            record.quality = Some(QualityAnnotation {
                has_anomaly: !anomalies.is_empty(),
                anomalies,
            });
        }
        report.metrics = metrics::compute(batch.data_type, &annotated.records);

        self.lock()
            .record(&batch.source, report.record_count, report.anomalous_records, started);

        info!(
            source = %batch.source,
            data_type = %batch.data_type,
            records = report.record_count,
            anomalous = report.anomalous_records,
            anomalies = report.anomalies_detected,
            "quality check complete"
        );
        (annotated, report)
    }

    pub fn get_source_reliability_report(&self) -> SourceReliabilityReport {
        self.lock().report()
    }

    /// Copy of the reliability state, for external persistence.
    pub fn snapshot(&self) -> SourceReliability {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, SourceReliability> {
        // The aggregate is updated in a single call, so a poisoned lock
        // still holds consistent data.
        self.reliability.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
