//! MDQ Core: market-data normalization, quality scoring, reconciliation.
//!
//! The pipeline has three stages, consumed in order:
//! - [`FieldNormalizer`] maps provider schemas onto a closed canonical schema
//! - [`QualityMonitor`] flags per-record anomalies and tracks source reliability
//! - [`ReconciliationEngine`] merges sources by tolerance or statistical consensus
//!
//! Everything is synchronous and in-memory. Data problems never abort a call;
//! they surface as report entries. Only [`ConfigurationError`] is fatal.

pub mod config;
pub mod domain;
pub mod error;
pub mod normalize;
pub mod quality;
pub mod reconcile;
pub mod stats;

pub use config::{NormalizerConfig, PipelineConfig, QualityConfig, ReconciliationConfig};
pub use domain::{
    Batch, CanonicalRecord, Cell, CurrencyCode, DataType, FieldKind, FieldName, Frequency, Lineage,
    ProcessInfo, RawBatch, RawRecord, RawValue,
};
pub use error::ConfigurationError;
pub use normalize::{FieldNormalizer, StandardizationReport, ValidationIssue};
pub use quality::{
    AnomalyKind, QualityAnomaly, QualityMonitor, QualityReport, SourceReliability,
    SourceReliabilityReport,
};
pub use reconcile::{
    ConsensusRecord, ReconciledRow, ReconciliationDiscrepancy, ReconciliationEngine,
    ReconciliationReport, SourceTrust, ToleranceTable,
};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: stage types can be shared with worker threads.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<FieldNormalizer>();
        require_sync::<FieldNormalizer>();
        require_send::<QualityMonitor>();
        require_sync::<QualityMonitor>();
        require_send::<ReconciliationEngine>();
        require_sync::<ReconciliationEngine>();

        require_send::<Batch>();
        require_sync::<Batch>();
        require_send::<RawBatch>();
        require_sync::<RawBatch>();
        require_send::<SourceReliability>();
        require_sync::<SourceReliability>();
        require_send::<PipelineConfig>();
        require_sync::<PipelineConfig>();
    }

    #[test]
    fn stages_compose_end_to_end() {
        let raw = RawBatch::new(
            "feed_a",
            vec![RawRecord::new()
                .with("ticker", "AAPL")
                .with("timestamp", "2024-01-02")
                .with("opening_price", 150.1)
                .with("highest_price", 153.0)
                .with("lowest_price", 149.5)
                .with("closing_price", 152.8)],
        );
        let (batch, _) = FieldNormalizer::new().standardize(&raw, "price").unwrap();
        let (checked, report) = QualityMonitor::new().check_data_quality(&batch);
        assert_eq!(report.anomalous_records, 0);

        let merged = ReconciliationEngine::new()
            .reconcile_multiple_sources(&[checked.clone(), checked], &["date", "symbol"], &["close"])
            .unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].source_count, 2);
        assert_eq!(merged[0].value(FieldName::Close).unwrap().confidence, 1.0);
    }
}
