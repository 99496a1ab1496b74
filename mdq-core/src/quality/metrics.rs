//! Completeness, validity, and per-type summary statistics.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::rules::by_symbol_in_time;
use crate::domain::{CanonicalRecord, DataType, FieldName};
use crate::stats;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Share of records carrying a value (valid or not).
    pub completeness: BTreeMap<FieldName, f64>,
    /// Share of present values that are valid. Fields with no values are omitted.
    pub validity: BTreeMap<FieldName, f64>,
    pub summary: BTreeMap<String, f64>,
}

pub fn compute(data_type: DataType, records: &[CanonicalRecord]) -> QualityMetrics {
    let mut metrics = QualityMetrics::default();
    if records.is_empty() {
        return metrics;
    }
    let n = records.len() as f64;
    for field in data_type.schema() {
        let cells = records.iter().map(|r| r.get(*field));
        let present = cells.clone().filter(|c| !c.is_missing()).count();
        let valid = cells.filter(|c| c.is_valid()).count();
        metrics.completeness.insert(*field, present as f64 / n);
        if present > 0 {
            metrics.validity.insert(*field, valid as f64 / present as f64);
        }
    }
    metrics.summary = match data_type {
        DataType::Price => price_summary(records),
        DataType::Dividend => dividend_summary(records),
        DataType::Earnings => earnings_summary(records),
    };
    metrics
}

fn column(records: &[CanonicalRecord], field: FieldName) -> Vec<f64> {
    records.iter().filter_map(|r| r.number(field)).collect()
}

fn put(summary: &mut BTreeMap<String, f64>, name: &str, value: Option<f64>) {
    if let Some(v) = value.filter(|v| v.is_finite()) {
        summary.insert(name.to_string(), v);
    }
}

fn price_summary(records: &[CanonicalRecord]) -> BTreeMap<String, f64> {
    use FieldName::*;
    let mut summary = BTreeMap::new();

    let volumes = column(records, Volume);
    put(&mut summary, "avg_volume", stats::mean(&volumes));
    if !volumes.is_empty() {
        let zero = volumes.iter().filter(|v| **v == 0.0).count();
        put(&mut summary, "zero_volume_ratio", Some(zero as f64 / volumes.len() as f64));
    }

    let ranges: Vec<f64> = records
        .iter()
        .filter_map(|r| match (r.number(High), r.number(Low), r.number(Close)) {
            (Some(h), Some(l), Some(c)) if c != 0.0 => Some((h - l) / c),
            _ => None,
        })
        .collect();
    put(&mut summary, "avg_daily_range_pct", stats::mean(&ranges));

    let volatilities: Vec<f64> = by_symbol_in_time(records, DataType::Price.time_field())
        .values()
        .filter_map(|indices| {
            let returns: Vec<f64> = indices
                .windows(2)
                .filter_map(|w| match (records[w[0]].number(Close), records[w[1]].number(Close)) {
                    (Some(p), Some(c)) if p != 0.0 => Some(c / p - 1.0),
                    _ => None,
                })
                .collect();
            stats::sample_std(&returns)
        })
        .collect();
    put(&mut summary, "avg_volatility", stats::mean(&volatilities));

    summary
}

fn dividend_summary(records: &[CanonicalRecord]) -> BTreeMap<String, f64> {
    let mut summary = BTreeMap::new();
    let amounts = column(records, FieldName::DividendAmount);
    put(&mut summary, "avg_dividend", stats::mean(&amounts));
    put(&mut summary, "median_dividend", stats::median(&amounts));

    let gaps: Vec<f64> = by_symbol_in_time(records, FieldName::PaymentDate)
        .values()
        .flat_map(|indices| {
            indices.windows(2).filter_map(|w| {
                let prev = records[w[0]].date(FieldName::PaymentDate)?;
                let cur = records[w[1]].date(FieldName::PaymentDate)?;
                Some((cur - prev).num_days() as f64)
            })
        })
        .collect();
    put(&mut summary, "avg_days_between_payments", stats::mean(&gaps));
    summary
}

fn earnings_summary(records: &[CanonicalRecord]) -> BTreeMap<String, f64> {
    let mut summary = BTreeMap::new();
    let eps = column(records, FieldName::Eps);
    put(&mut summary, "avg_eps", stats::mean(&eps));
    put(&mut summary, "median_eps", stats::median(&eps));

    let surprise = column(records, FieldName::SurprisePct);
    let abs_surprise: Vec<f64> = surprise.iter().map(|s| s.abs()).collect();
    put(&mut summary, "avg_surprise_pct", stats::mean(&surprise));
    put(&mut summary, "avg_abs_surprise_pct", stats::mean(&abs_surprise));

    put(&mut summary, "avg_revenue", stats::mean(&column(records, FieldName::Revenue)));
    summary
}
