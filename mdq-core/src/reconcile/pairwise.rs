//! Two-source, tolerance-based reconciliation.

use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

use super::report::{
    ColumnDiscrepancies, ColumnOutcome, ReconciledRow, ReconciliationDiscrepancy,
    ReconciliationReport,
};
use super::{ensure_same_type, resolve_columns, resolve_keys, unique_by_key, ReconciliationEngine};
use crate::domain::{Batch, CanonicalRecord, FieldName};
use crate::error::ConfigurationError;

pub type PairwiseResult = Result<(Vec<ReconciledRow>, ReconciliationReport), ConfigurationError>;

enum Comparison {
    Within,
    Exceeds(f64),
    /// Zero primary against a different secondary.
    Unreconcilable,
}

fn compare(primary: f64, secondary: f64, tolerance: f64) -> Comparison {
    if primary == secondary {
        return Comparison::Within;
    }
    if primary == 0.0 {
        return Comparison::Unreconcilable;
    }
    let diff = ((secondary - primary) / primary).abs();
    if diff > tolerance {
        Comparison::Exceeds(diff)
    } else {
        Comparison::Within
    }
}

impl ReconciliationEngine {
    /// Reconcile `primary` against `secondary` on `value_columns`.
    ///
    /// Rows are matched on `key_columns`. Primary values are never replaced
    /// by a disagreeing secondary; they are only back-filled when missing.
    pub fn reconcile_price_data(
        &self,
        primary: &Batch,
        secondary: &Batch,
        key_columns: &[&str],
        value_columns: &[&str],
    ) -> PairwiseResult {
        ensure_same_type([primary, secondary])?;
        let keys = resolve_keys(primary.data_type, key_columns)?;
        let values = resolve_columns(primary.data_type, value_columns)?;
        if let Some(col) = values.iter().find(|c| !c.kind().is_numeric()) {
            return Err(ConfigurationError::NonNumericColumn {
                column: col.as_str().to_string(),
            });
        }
        Ok(self.reconcile_pair(primary, secondary, &keys, &values))
    }

    /// Dividends match on `symbol, ex_date` and compare `dividend_amount`.
    pub fn reconcile_dividend_data(&self, primary: &Batch, secondary: &Batch) -> PairwiseResult {
        self.reconcile_price_data(
            primary,
            secondary,
            &["symbol", "ex_date"],
            &["dividend_amount"],
        )
    }

    /// Earnings match on `symbol, report_date` and compare `eps`, plus
    /// `revenue` when both sources report any.
    pub fn reconcile_earnings_data(&self, primary: &Batch, secondary: &Batch) -> PairwiseResult {
        let has_revenue =
            |b: &Batch| b.records.iter().any(|r| !r.get(FieldName::Revenue).is_missing());
        let values: &[&str] = if has_revenue(primary) && has_revenue(secondary) {
            &["eps", "revenue"]
        } else {
            &["eps"]
        };
        self.reconcile_price_data(primary, secondary, &["symbol", "report_date"], values)
    }

    fn reconcile_pair(
        &self,
        primary: &Batch,
        secondary: &Batch,
        keys: &[FieldName],
        values: &[FieldName],
    ) -> (Vec<ReconciledRow>, ReconciliationReport) {
        info!(
            primary = %primary.source,
            secondary = %secondary.source,
            primary_records = primary.len(),
            secondary_records = secondary.len(),
            "reconciling two sources"
        );
        let now = Utc::now();
        let lookup: HashMap<String, &CanonicalRecord> =
            unique_by_key(secondary, keys).into_iter().collect();

        let mut report = ReconciliationReport {
            timestamp: now,
            total_records: primary.len(),
            matched_records: 0,
            missing_in_secondary: 0,
            discrepancies: values
                .iter()
                .map(|c| (*c, ColumnDiscrepancies::default()))
                .collect(),
        };

        let mut rows = Vec::with_capacity(primary.len());
        for (key, record) in unique_by_key(primary, keys) {
            let mut record = record.clone();
            record.lineage.processing_steps.push("reconcile".to_string());
            let mut columns = BTreeMap::new();

            let Some(other) = lookup.get(&key) else {
                report.missing_in_secondary += 1;
                for col in values {
                    columns.insert(*col, ColumnOutcome::default());
                }
                rows.push(ReconciledRow {
                    key,
                    record,
                    matched: false,
                    columns,
                    reconciled_at: now,
                    source_count: 2,
                });
                continue;
            };
            report.matched_records += 1;

            for col in values {
                let p = record.number(*col);
                let s = other.number(*col);
                let mut outcome = ColumnOutcome {
                    secondary: s,
                    ..ColumnOutcome::default()
                };
                match (p, s) {
                    (Some(pv), Some(sv)) => match compare(pv, sv, self.tolerance(*col)) {
                        Comparison::Within => outcome.reconciled = true,
                        Comparison::Exceeds(diff) => {
                            outcome.discrepancy = true;
                            debug!(key = %key, column = %col, primary = pv, secondary = sv, diff, "discrepancy");
                            if let Some(entry) = report.discrepancies.get_mut(col) {
                                entry.push(ReconciliationDiscrepancy {
                                    key: key.clone(),
                                    primary_value: pv,
                                    secondary_value: sv,
                                    difference_pct: diff,
                                });
                            }
                        }
                        Comparison::Unreconcilable => {}
                    },
                    (None, Some(_)) if record.get(*col).is_missing() => {
                        record.set(*col, other.get(*col).clone());
                        outcome.reconciled = true;
                    }
                    // An unparseable primary keeps its raw text and stays unreconciled.
                    (None, Some(_)) => {
                        debug!(key = %key, column = %col, "invalid primary value, not back-filled");
                    }
                    (Some(_), None) => outcome.reconciled = true,
                    (None, None) => {}
                }
                columns.insert(*col, outcome);
            }

            rows.push(ReconciledRow {
                key,
                record,
                matched: true,
                columns,
                reconciled_at: now,
                source_count: 2,
            });
        }

        info!(
            matched = report.matched_records,
            missing_in_secondary = report.missing_in_secondary,
            discrepancies = report.discrepancy_count(),
            "two-source reconciliation complete"
        );
        (rows, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Cell, DataType};
    use chrono::NaiveDate;

    fn bar(day: u32, close: Option<f64>) -> CanonicalRecord {
        let date = NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        let mut cells = vec![
            (FieldName::Date, Cell::Date(date)),
            (FieldName::Symbol, Cell::Text("AAPL".into())),
        ];
        if let Some(c) = close {
            cells.push((FieldName::Close, Cell::Number(c)));
        }
        CanonicalRecord::new(DataType::Price, "t", cells)
    }

    fn batch(source: &str, records: Vec<CanonicalRecord>) -> Batch {
        Batch::new(source, DataType::Price, records)
    }

    const KEYS: &[&str] = &["date", "symbol"];

    #[test]
    fn missing_sides_are_filled_or_left() {
        let primary = batch("p", vec![bar(2, None), bar(3, Some(10.0)), bar(4, None)]);
        let secondary = batch("s", vec![bar(2, Some(11.0)), bar(3, None), bar(4, None)]);
        let (rows, report) = ReconciliationEngine::new()
            .reconcile_price_data(&primary, &secondary, KEYS, &["close"])
            .unwrap();

        assert_eq!(rows[0].record.number(FieldName::Close), Some(11.0));
        assert!(rows[0].outcome(FieldName::Close).reconciled);
        assert!(rows[1].outcome(FieldName::Close).reconciled);
        assert_eq!(rows[1].outcome(FieldName::Close).secondary, None);
        let both_missing = rows[2].outcome(FieldName::Close);
        assert!(!both_missing.reconciled && !both_missing.discrepancy);
        assert_eq!(report.discrepancy_count(), 0);
    }

    #[test]
    fn zero_primary_is_unreconcilable_unless_equal() {
        let primary = batch("p", vec![bar(2, Some(0.0)), bar(3, Some(0.0))]);
        let secondary = batch("s", vec![bar(2, Some(1.0)), bar(3, Some(0.0))]);
        let (rows, report) = ReconciliationEngine::new()
            .reconcile_price_data(&primary, &secondary, KEYS, &["close"])
            .unwrap();
        let zero_vs_one = rows[0].outcome(FieldName::Close);
        assert!(!zero_vs_one.reconciled && !zero_vs_one.discrepancy);
        assert!(rows[1].outcome(FieldName::Close).reconciled);
        assert_eq!(report.discrepancy_count(), 0);
    }

    #[test]
    fn invalid_primary_is_not_back_filled() {
        let mut unparseable = bar(2, None);
        unparseable.set(
            FieldName::Close,
            Cell::Invalid {
                raw: "1O1.5".into(),
                reason: "not a number".into(),
            },
        );
        let primary = batch("p", vec![unparseable]);
        let secondary = batch("s", vec![bar(2, Some(150.0))]);
        let (rows, report) = ReconciliationEngine::new()
            .reconcile_price_data(&primary, &secondary, KEYS, &["close"])
            .unwrap();

        assert!(rows[0].record.get(FieldName::Close).is_invalid());
        let outcome = rows[0].outcome(FieldName::Close);
        assert!(!outcome.reconciled && !outcome.discrepancy);
        assert_eq!(outcome.secondary, Some(150.0));
        assert_eq!(report.discrepancy_count(), 0);
    }

    #[test]
    fn unmatched_rows_pass_through() {
        let primary = batch("p", vec![bar(2, Some(10.0)), bar(9, Some(12.0))]);
        let secondary = batch("s", vec![bar(2, Some(10.0))]);
        let (rows, report) = ReconciliationEngine::new()
            .reconcile_price_data(&primary, &secondary, KEYS, &["close"])
            .unwrap();
        assert_eq!(report.matched_records, 1);
        assert_eq!(report.missing_in_secondary, 1);
        assert!(!rows[1].matched);
        assert_eq!(rows[1].record.number(FieldName::Close), Some(12.0));
    }

    #[test]
    fn duplicate_primary_keys_keep_first() {
        let primary = batch("p", vec![bar(2, Some(10.0)), bar(2, Some(99.0))]);
        let secondary = batch("s", vec![bar(2, Some(10.0))]);
        let (rows, report) = ReconciliationEngine::new()
            .reconcile_price_data(&primary, &secondary, KEYS, &["close"])
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].record.number(FieldName::Close), Some(10.0));
        assert_eq!(report.matched_records, 1);
    }

    #[test]
    fn non_numeric_value_column_is_rejected() {
        let primary = batch("p", vec![]);
        let err = ReconciliationEngine::new()
            .reconcile_price_data(&primary, &primary, KEYS, &["exchange"])
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::NonNumericColumn { .. }));
    }

    #[test]
    fn average_and_max_cover_discrepancies() {
        let primary = batch("p", vec![bar(2, Some(100.0)), bar(3, Some(100.0)), bar(4, Some(100.0))]);
        let secondary = batch("s", vec![bar(2, Some(102.0)), bar(3, Some(104.0)), bar(4, Some(100.1))]);
        let (_, report) = ReconciliationEngine::new()
            .reconcile_price_data(&primary, &secondary, KEYS, &["close"])
            .unwrap();
        let close = &report.discrepancies[&FieldName::Close];
        assert_eq!(close.count, 2);
        assert!((close.average_difference - 0.03).abs() < 1e-9);
        assert!((close.max_difference - 0.04).abs() < 1e-9);
    }
}
