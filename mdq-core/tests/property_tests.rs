//! Property tests for pipeline invariants.
//!
//! Uses proptest to verify:
//! 1. Alias coverage: every alias normalizes to its canonical field
//! 2. Confidence bounds: every consensus confidence lies in [0, 1]
//! 3. Match accounting: matched + missing_in_secondary == primary length
//! 4. Idempotence: reconciling a batch against itself finds no discrepancies
//! 5. Schema completeness: canonical records carry every schema field

use chrono::NaiveDate;
use mdq_core::normalize::aliases::ALIASES;
use mdq_core::{
    Batch, CanonicalRecord, Cell, DataType, FieldName, FieldNormalizer, RawBatch, RawRecord,
    RawValue, ReconciliationEngine,
};
use proptest::prelude::*;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_price() -> impl Strategy<Value = f64> {
    (1.0..500.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

fn arb_optional_price() -> impl Strategy<Value = Option<f64>> {
    prop_oneof![4 => arb_price().prop_map(Some), 1 => Just(None)]
}

/// One close per day for a single symbol; days are unique.
fn arb_closes(max: usize) -> impl Strategy<Value = Vec<Option<f64>>> {
    prop::collection::vec(arb_optional_price(), 1..max)
}

fn batch_from(source: &str, closes: &[Option<f64>], day_offset: u32) -> Batch {
    let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let records = closes
        .iter()
        .enumerate()
        .map(|(i, close)| {
            let date = base + chrono::Duration::days(i as i64 + day_offset as i64);
            let mut cells = vec![
                (FieldName::Date, Cell::Date(date)),
                (FieldName::Symbol, Cell::Text("SPY".into())),
            ];
            if let Some(c) = close {
                cells.push((FieldName::Close, Cell::Number(*c)));
            }
            CanonicalRecord::new(DataType::Price, source, cells)
        })
        .collect();
    Batch::new(source, DataType::Price, records)
}

const KEYS: &[&str] = &["date", "symbol"];

// ── 1. Alias coverage ────────────────────────────────────────────────

#[test]
fn every_alias_normalizes_to_its_target() {
    let normalizer = FieldNormalizer::new();
    for (alias, target) in ALIASES {
        for data_type in DataType::ALL.iter().filter(|dt| dt.contains(*target)) {
            let raw = RawBatch::new("t", vec![RawRecord::new().with(*alias, "x")]);
            let (batch, report) = normalizer.standardize_as(&raw, *data_type);
            assert_eq!(
                report.field_compliance.renamed_fields.get(*alias),
                Some(target),
                "{alias} should map to {target} for {data_type}"
            );
            assert!(batch.records[0].extras.is_empty());
            assert!(!batch.records[0].get(*target).is_missing());
        }
    }
}

proptest! {
    /// Alias matching ignores case and surrounding whitespace.
    #[test]
    fn alias_matching_ignores_case(idx in 0..ALIASES.len(), upper in any::<bool>(), pad in 0..3usize) {
        let (alias, target) = ALIASES[idx];
        let spelled = if upper { alias.to_ascii_uppercase() } else { alias.to_string() };
        let name = format!("{}{spelled}{}", " ".repeat(pad), " ".repeat(pad));
        let data_type = *DataType::ALL.iter().find(|dt| dt.contains(target)).unwrap();
        let raw = RawBatch::new("t", vec![RawRecord::new().with(name, RawValue::Null)]);
        let (_, report) = FieldNormalizer::new().standardize_as(&raw, data_type);
        prop_assert!(report.field_compliance.unmapped_fields.is_empty());
    }
}

// ── 2. Confidence bounds ─────────────────────────────────────────────

proptest! {
    #[test]
    fn consensus_confidence_is_bounded(
        sources in prop::collection::vec(arb_closes(6), 1..6),
    ) {
        let batches: Vec<Batch> = sources
            .iter()
            .enumerate()
            .map(|(i, closes)| batch_from(&format!("s{i}"), closes, 0))
            .collect();
        let merged = ReconciliationEngine::new()
            .reconcile_multiple_sources(&batches, KEYS, &["close"])
            .unwrap();
        for row in &merged {
            for value in row.values.values() {
                prop_assert!((0.0..=1.0).contains(&value.confidence));
            }
            prop_assert!(row.source_count >= 1);
            prop_assert_eq!(row.source_count, row.source_ids.len());
        }
    }
}

// ── 3. Match accounting ──────────────────────────────────────────────

proptest! {
    #[test]
    fn matched_plus_missing_equals_primary(
        primary in arb_closes(20),
        secondary in arb_closes(20),
        offset in 0u32..10,
    ) {
        let p = batch_from("p", &primary, 0);
        let s = batch_from("s", &secondary, offset);
        let (rows, report) = ReconciliationEngine::new()
            .reconcile_price_data(&p, &s, KEYS, &["close"])
            .unwrap();
        prop_assert_eq!(report.matched_records + report.missing_in_secondary, p.len());
        prop_assert_eq!(rows.len(), p.len());
        let details = &report.discrepancies[&FieldName::Close];
        prop_assert_eq!(details.count, details.details.len());
        prop_assert!(details.max_difference >= details.average_difference);
    }
}

// ── 4. Idempotence ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn self_reconciliation_has_no_discrepancies(closes in arb_closes(30)) {
        let batch = batch_from("p", &closes, 0);
        let (rows, report) = ReconciliationEngine::new()
            .reconcile_price_data(&batch, &batch, KEYS, &["close"])
            .unwrap();
        prop_assert_eq!(report.discrepancy_count(), 0);
        for (row, close) in rows.iter().zip(&closes) {
            let outcome = row.outcome(FieldName::Close);
            prop_assert_eq!(outcome.reconciled, close.is_some());
            prop_assert!(!outcome.discrepancy);
        }
    }
}

// ── 5. Schema completeness ───────────────────────────────────────────

proptest! {
    #[test]
    fn canonical_records_carry_every_schema_field(
        type_idx in 0..3usize,
        fields in prop::collection::vec(("[a-z_]{1,12}", "[0-9a-zA-Z ]{0,8}"), 0..8),
    ) {
        let data_type = DataType::ALL[type_idx];
        let mut raw = RawRecord::new();
        for (name, value) in fields {
            raw = raw.with(name, value);
        }
        let (batch, _) = FieldNormalizer::new()
            .standardize_as(&RawBatch::new("t", vec![raw]), data_type);
        for field in data_type.schema() {
            prop_assert!(batch.records[0].cells().contains_key(field));
        }
    }
}
