//! Per-type anomaly rules.
//!
//! Rules read canonical cells only. A rule whose inputs are missing or
//! invalid on a record does not fire for that record.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::config::QualityConfig;
use crate::domain::{CanonicalRecord, DataType, FieldName};
use crate::stats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    OhlcInconsistency,
    NegativePrice,
    ZeroVolume,
    PriceJump,
    VolumeSpike,
    PriceStaleness,
    NegativeDividend,
    DateOrderViolation,
    UnusualDividend,
    NegativeRevenue,
    ExtremeSurprise,
    UnreasonableEps,
    RevenueJump,
}

impl AnomalyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OhlcInconsistency => "ohlc_inconsistency",
            Self::NegativePrice => "negative_price",
            Self::ZeroVolume => "zero_volume",
            Self::PriceJump => "price_jump",
            Self::VolumeSpike => "volume_spike",
            Self::PriceStaleness => "price_staleness",
            Self::NegativeDividend => "negative_dividend",
            Self::DateOrderViolation => "date_order_violation",
            Self::UnusualDividend => "unusual_dividend",
            Self::NegativeRevenue => "negative_revenue",
            Self::ExtremeSurprise => "extreme_surprise",
            Self::UnreasonableEps => "unreasonable_eps",
            Self::RevenueJump => "revenue_jump",
        }
    }
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rule hit on one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAnomaly {
    pub kind: AnomalyKind,
    pub reason: String,
}

impl QualityAnomaly {
    fn new(kind: AnomalyKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

/// Run every rule for `data_type`. Result is parallel to `records`.
pub fn detect(
    data_type: DataType,
    records: &[CanonicalRecord],
    config: &QualityConfig,
) -> Vec<Vec<QualityAnomaly>> {
    let mut hits = vec![Vec::new(); records.len()];
    let time = data_type.time_field();
    match data_type {
        DataType::Price => price_rules(records, time, config, &mut hits),
        DataType::Dividend => dividend_rules(records, time, config, &mut hits),
        DataType::Earnings => earnings_rules(records, time, config, &mut hits),
    }
    hits
}

/// Record indices grouped by symbol, each group ordered by `time_field`.
///
/// Records without a usable date sort first; ties keep batch order.
pub(crate) fn by_symbol_in_time(
    records: &[CanonicalRecord],
    time_field: FieldName,
) -> BTreeMap<String, Vec<usize>> {
    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (i, record) in records.iter().enumerate() {
        let symbol = record.symbol().unwrap_or_default().to_string();
        groups.entry(symbol).or_default().push(i);
    }
    for indices in groups.values_mut() {
        indices.sort_by_key(|i| records[*i].date(time_field));
    }
    groups
}

/// Walk each symbol's series, handing `check` the current and prior value.
fn with_prior(
    records: &[CanonicalRecord],
    time_field: FieldName,
    field: FieldName,
    mut check: impl FnMut(usize, f64, f64),
) {
    for indices in by_symbol_in_time(records, time_field).values() {
        for pair in indices.windows(2) {
            let (prev, cur) = (pair[0], pair[1]);
            if let (Some(p), Some(c)) = (records[prev].number(field), records[cur].number(field)) {
                if p != 0.0 {
                    check(cur, p, c);
                }
            }
        }
    }
}

fn price_rules(
    records: &[CanonicalRecord],
    time: FieldName,
    config: &QualityConfig,
    hits: &mut [Vec<QualityAnomaly>],
) {
    use FieldName::*;

    for (i, r) in records.iter().enumerate() {
        let (open, high, low, close) = (r.number(Open), r.number(High), r.number(Low), r.number(Close));

        let mut broken = Vec::new();
        let body: Vec<f64> = [open, close].into_iter().flatten().collect();
        if let Some(h) = high {
            if body.iter().any(|v| h < *v) {
                broken.push(format!("high {h} below open/close"));
            }
        }
        if let Some(l) = low {
            if body.iter().any(|v| l > *v) {
                broken.push(format!("low {l} above open/close"));
            }
        }
        if let (Some(h), Some(l)) = (high, low) {
            if h < l {
                broken.push(format!("high {h} below low {l}"));
            }
        }
        if !broken.is_empty() {
            hits[i].push(QualityAnomaly::new(AnomalyKind::OhlcInconsistency, broken.join("; ")));
        }

        let negative: Vec<&str> = [(Open, open), (High, high), (Low, low), (Close, close)]
            .iter()
            .filter(|(_, v)| v.is_some_and(|v| v < 0.0))
            .map(|(f, _)| f.as_str())
            .collect();
        if !negative.is_empty() {
            hits[i].push(QualityAnomaly::new(
                AnomalyKind::NegativePrice,
                format!("negative {}", negative.join(", ")),
            ));
        }

        if r.number(Volume) == Some(0.0) {
            hits[i].push(QualityAnomaly::new(AnomalyKind::ZeroVolume, "volume is zero"));
        }
    }

    with_prior(records, time, Close, |i, prev, cur| {
        let change = cur / prev - 1.0;
        if change.abs() > config.price_jump_threshold {
            hits[i].push(QualityAnomaly::new(
                AnomalyKind::PriceJump,
                format!("close moved {:.2}% from {prev} to {cur}", change * 100.0),
            ));
        }
    });

    with_prior(records, time, Volume, |i, prev, cur| {
        let ratio = cur / prev;
        if ratio > config.volume_spike_multiple {
            hits[i].push(QualityAnomaly::new(
                AnomalyKind::VolumeSpike,
                format!("volume {ratio:.1}x the prior bar"),
            ));
        }
    });

    for indices in by_symbol_in_time(records, time).values() {
        let mut run = 0usize;
        let mut last: Option<f64> = None;
        for &i in indices {
            let close = records[i].number(Close);
            run = match (close, last) {
                (Some(c), Some(l)) if c == l => run + 1,
                (Some(_), _) => 1,
                (None, _) => 0,
            };
            last = close;
            if run >= config.staleness_run {
                hits[i].push(QualityAnomaly::new(
                    AnomalyKind::PriceStaleness,
                    format!("close unchanged for {run} consecutive bars"),
                ));
            }
        }
    }
}

fn dividend_rules(
    records: &[CanonicalRecord],
    time: FieldName,
    config: &QualityConfig,
    hits: &mut [Vec<QualityAnomaly>],
) {
    use FieldName::*;

    for (i, r) in records.iter().enumerate() {
        if let Some(amount) = r.number(DividendAmount) {
            if amount < 0.0 {
                hits[i].push(QualityAnomaly::new(
                    AnomalyKind::NegativeDividend,
                    format!("dividend amount {amount} is negative"),
                ));
            }
        }
        if let Some(reason) = date_before(r.date(PaymentDate), r.date(ExDate), "payment_date", "ex_date") {
            hits[i].push(QualityAnomaly::new(AnomalyKind::DateOrderViolation, reason));
        }
    }

    for indices in by_symbol_in_time(records, time).values() {
        let amounts: Vec<(usize, f64)> = indices
            .iter()
            .filter_map(|i| records[*i].number(DividendAmount).map(|a| (*i, a)))
            .collect();
        let values: Vec<f64> = amounts.iter().map(|(_, a)| *a).collect();
        let (Some(mean), Some(std)) = (stats::mean(&values), stats::sample_std(&values)) else {
            continue;
        };
        let band = config.unusual_dividend_sigma * std;
        for (i, amount) in amounts {
            if (amount - mean).abs() > band {
                hits[i].push(QualityAnomaly::new(
                    AnomalyKind::UnusualDividend,
                    format!(
                        "dividend {amount} is more than {} standard deviations from mean {mean:.4}",
                        config.unusual_dividend_sigma
                    ),
                ));
            }
        }
    }
}

fn earnings_rules(
    records: &[CanonicalRecord],
    time: FieldName,
    config: &QualityConfig,
    hits: &mut [Vec<QualityAnomaly>],
) {
    use FieldName::*;

    for (i, r) in records.iter().enumerate() {
        if let Some(reason) =
            date_before(r.date(ReportDate), r.date(QuarterEndDate), "report_date", "quarter_end_date")
        {
            hits[i].push(QualityAnomaly::new(AnomalyKind::DateOrderViolation, reason));
        }
        if let Some(revenue) = r.number(Revenue) {
            if revenue < 0.0 {
                hits[i].push(QualityAnomaly::new(
                    AnomalyKind::NegativeRevenue,
                    format!("revenue {revenue} is negative"),
                ));
            }
        }
        if let Some(surprise) = r.number(SurprisePct) {
            if surprise.abs() > config.extreme_surprise_pct {
                hits[i].push(QualityAnomaly::new(
                    AnomalyKind::ExtremeSurprise,
                    format!(
                        "surprise {surprise}% exceeds ±{}%",
                        config.extreme_surprise_pct
                    ),
                ));
            }
        }
        if let Some(eps) = r.number(Eps) {
            if eps.abs() > config.max_abs_eps {
                hits[i].push(QualityAnomaly::new(
                    AnomalyKind::UnreasonableEps,
                    format!("eps {eps} exceeds ±{}", config.max_abs_eps),
                ));
            }
        }
    }

    with_prior(records, time, Revenue, |i, prev, cur| {
        let change = (cur - prev) / prev.abs();
        if change.abs() > config.revenue_jump_threshold {
            hits[i].push(QualityAnomaly::new(
                AnomalyKind::RevenueJump,
                format!("revenue moved {:.1}% from the prior report", change * 100.0),
            ));
        }
    });
}

/// Reason text when `early` is strictly before `late`.
fn date_before(
    early: Option<NaiveDate>,
    late: Option<NaiveDate>,
    early_name: &str,
    late_name: &str,
) -> Option<String> {
    match (early, late) {
        (Some(e), Some(l)) if e < l => Some(format!("{early_name} {e} precedes {late_name} {l}")),
        _ => None,
    }
}
