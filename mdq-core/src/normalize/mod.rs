//! Field normalization: provider schemas → the canonical schema.
//!
//! Lookup tables are resolved once when the normalizer is built. Every
//! data-level problem becomes a [`ValidationIssue`] on the report and the
//! record is kept; only an unknown data type aborts the call.

pub mod aliases;
pub mod coerce;
pub mod report;

pub use report::{
    CurrencyCompliance, DateCompliance, FieldCompliance, FieldCounts, IssueKind,
    StandardizationReport, ValidationIssue,
};

use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, warn};

use crate::config::NormalizerConfig;
use crate::domain::{
    fingerprint_cells, Batch, CanonicalRecord, Cell, CurrencyCode, DataType, FieldKind, FieldName,
    Frequency, Lineage, ProcessInfo, RawBatch, RawValue,
};
use crate::error::ConfigurationError;

use aliases::{alias_key, build_lookup};
use coerce::{
    currency_table, frequency_table, parse_date, parse_integer, parse_number, parse_quarter,
    spelling_key,
};

/// Outcome of coercing one provider cell.
struct Coerced {
    cell: Cell,
    issue: Option<IssueKind>,
    /// The value was rewritten to a canonical spelling.
    converted: bool,
}

impl Coerced {
    fn ok(cell: Cell) -> Self {
        Self {
            cell,
            issue: None,
            converted: false,
        }
    }

    fn converted(cell: Cell, converted: bool) -> Self {
        Self {
            cell,
            issue: None,
            converted,
        }
    }

    fn invalid(raw: &RawValue, reason: &str, kind: IssueKind) -> Self {
        Self {
            cell: Cell::Invalid {
                raw: raw.to_string(),
                reason: reason.to_string(),
            },
            issue: Some(kind),
            converted: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldNormalizer {
    lookups: HashMap<DataType, HashMap<String, FieldName>>,
    currencies: HashMap<String, CurrencyCode>,
    frequencies: HashMap<String, Frequency>,
}

impl Default for FieldNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldNormalizer {
    /// Normalizer with the built-in tables only.
    pub fn new() -> Self {
        Self {
            lookups: DataType::ALL
                .iter()
                .map(|dt| (*dt, build_lookup(*dt)))
                .collect(),
            currencies: currency_table(),
            frequencies: frequency_table(),
        }
    }

    /// Built-in tables extended with deployment-specific entries.
    pub fn with_config(config: &NormalizerConfig) -> Result<Self, ConfigurationError> {
        let mut normalizer = Self::new();
        for (data_type, aliases) in &config.aliases {
            let lookup = normalizer.lookups.entry(*data_type).or_default();
            for (alias, target) in aliases {
                lookup.insert(alias_key(alias), data_type.resolve_column(target)?);
            }
        }
        for (spelling, code) in &config.currencies {
            let code = CurrencyCode::parse(code).ok_or_else(|| {
                ConfigurationError::invalid(
                    format!("normalizer.currencies.{spelling}"),
                    format!("'{code}' is not a three-letter currency code"),
                )
            })?;
            normalizer.currencies.insert(spelling_key(spelling), code);
        }
        for (spelling, name) in &config.frequencies {
            let freq = Frequency::from_canonical(name)
                .ok_or_else(|| {
                    ConfigurationError::invalid(
                        format!("normalizer.frequencies.{spelling}"),
                        format!("'{name}' is not a known frequency"),
                    )
                })?;
            normalizer.frequencies.insert(spelling_key(spelling), freq);
        }
        Ok(normalizer)
    }

    /// Standardize a raw batch, naming the data type as text.
    pub fn standardize(
        &self,
        batch: &RawBatch,
        data_type: &str,
    ) -> Result<(Batch, StandardizationReport), ConfigurationError> {
        let data_type: DataType = data_type.parse()?;
        Ok(self.standardize_as(batch, data_type))
    }

    /// Standardize a raw batch into canonical records of `data_type`.
    pub fn standardize_as(
        &self,
        batch: &RawBatch,
        data_type: DataType,
    ) -> (Batch, StandardizationReport) {
        let mut report = StandardizationReport::new(data_type, &batch.source);
        if batch.records.is_empty() {
            warn!(source = %batch.source, %data_type, "empty batch, nothing to standardize");
            return (Batch::new(&batch.source, data_type, Vec::new()), report);
        }
        info!(
            source = %batch.source,
            %data_type,
            records = batch.records.len(),
            "standardizing batch"
        );

        let empty = HashMap::new();
        let lookup = self.lookups.get(&data_type).unwrap_or(&empty);
        let mut unmapped = BTreeSet::new();
        let mut records = Vec::with_capacity(batch.records.len());

        for (row, raw) in batch.records.iter().enumerate() {
            let mut supplied: BTreeMap<FieldName, Cell> = BTreeMap::new();
            let mut extras = BTreeMap::new();

            // Exact canonical names claim their slot before any alias does.
            let (exact, rest): (Vec<_>, Vec<_>) = raw.fields.iter().partition(|(name, _)| {
                let key = alias_key(name);
                data_type.schema().iter().any(|f| f.as_str() == key)
            });

            for (name, value) in exact.into_iter().chain(rest) {
                let Some(field) = lookup.get(&alias_key(name)).copied() else {
                    unmapped.insert(name.clone());
                    extras.insert(name.clone(), value.clone());
                    continue;
                };
                if supplied.contains_key(&field) {
                    report.record_issue(row, name, IssueKind::DuplicateField, value.to_string());
                    extras.insert(name.clone(), value.clone());
                    continue;
                }
                if name.trim() != field.as_str() {
                    report
                        .field_compliance
                        .renamed_fields
                        .insert(name.clone(), field);
                }

                let coerced = self.coerce(field, value);
                self.tally(&mut report, field, value, &coerced);
                if let Some(kind) = coerced.issue {
                    report.record_issue(row, field.as_str(), kind, value.to_string());
                }
                supplied.insert(field, coerced.cell);
            }

            let mut record = CanonicalRecord::new(data_type, &batch.source, supplied);
            record.extras = extras;
            records.push(record);
        }

        report.record_count = records.len();
        report.issues_fixed += report.field_compliance.renamed_fields.len();
        report.field_compliance.unmapped_fields = unmapped.into_iter().collect();
        Self::count_fields(&mut report, data_type, &records);

        for (from, to) in &report.field_compliance.renamed_fields {
            debug!(source = %batch.source, from = %from, to = %to, "renamed field");
        }
        info!(
            source = %batch.source,
            %data_type,
            records = report.record_count,
            issues_fixed = report.issues_fixed,
            issues = report.issues.len(),
            "standardized batch"
        );

        (Batch::new(&batch.source, data_type, records), report)
    }

    /// Restamp provenance on every record. Business cells are untouched.
    pub fn add_data_lineage(
        records: &[CanonicalRecord],
        source: &str,
        process_info: &ProcessInfo,
    ) -> Vec<CanonicalRecord> {
        records
            .iter()
            .map(|record| {
                let mut stamped = record.clone();
                let mut steps = record.lineage.processing_steps.clone();
                steps.extend(process_info.steps.iter().cloned());
                stamped.lineage = Lineage {
                    source: source.to_string(),
                    processor: process_info.processor.clone(),
                    version: process_info.version.clone(),
                    processing_steps: steps,
                    timestamp: process_info.timestamp,
                    fingerprint: fingerprint_cells(record.cells()),
                };
                stamped
            })
            .collect()
    }

    fn coerce(&self, field: FieldName, raw: &RawValue) -> Coerced {
        if raw.is_null() {
            return Coerced::ok(Cell::Missing);
        }
        match field.kind() {
            FieldKind::Number => match parse_number(raw) {
                Some(v) if field.is_non_negative() && v < 0.0 => Coerced {
                    cell: Cell::Number(v),
                    issue: Some(IssueKind::SignViolation),
                    converted: false,
                },
                Some(v) => Coerced::ok(Cell::Number(v)),
                None => Coerced::invalid(raw, "not a number", IssueKind::UnparseableNumber),
            },
            FieldKind::Integer if field == FieldName::FiscalQuarter => match parse_quarter(raw) {
                Some(q) => {
                    let plain = matches!(raw, RawValue::Number(_))
                        || raw.to_string().trim() == q.to_string();
                    Coerced::converted(Cell::Integer(q), !plain)
                }
                None => Coerced::invalid(raw, "quarter must be 1-4", IssueKind::OutOfRange),
            },
            FieldKind::Integer => match parse_integer(raw) {
                Some(v) => Coerced::ok(Cell::Integer(v)),
                None => Coerced::invalid(raw, "not an integer", IssueKind::UnparseableNumber),
            },
            FieldKind::Date => match parse_date(raw) {
                Some(d) => Coerced::ok(Cell::Date(d)),
                None => Coerced::invalid(raw, "unrecognized date", IssueKind::UnparseableDate),
            },
            FieldKind::Symbol => Coerced::ok(Cell::Text(raw.to_string().trim().to_uppercase())),
            FieldKind::Text => Coerced::ok(Cell::Text(raw.to_string().trim().to_string())),
            FieldKind::Currency => self.coerce_currency(raw),
            FieldKind::Frequency => {
                let text = raw.to_string();
                match self.frequencies.get(&spelling_key(&text)) {
                    Some(freq) => Coerced::converted(Cell::Frequency(*freq), text.trim() != freq.as_str()),
                    None => Coerced::invalid(raw, "unknown frequency", IssueKind::UnmappedFrequency),
                }
            }
        }
    }

    fn coerce_currency(&self, raw: &RawValue) -> Coerced {
        let RawValue::Text(text) = raw else {
            return Coerced::invalid(raw, "unknown currency", IssueKind::UnmappedCurrency);
        };
        let code = self
            .currencies
            .get(&spelling_key(text))
            .cloned()
            .or_else(|| CurrencyCode::parse(text));
        match code {
            Some(code) => {
                let changed = text.trim() != code.as_str();
                Coerced::converted(Cell::Currency(code), changed)
            }
            None => {
                warn!(raw = %text, "unmapped currency");
                Coerced::invalid(raw, "unknown currency", IssueKind::UnmappedCurrency)
            }
        }
    }

    fn tally(
        &self,
        report: &mut StandardizationReport,
        field: FieldName,
        raw: &RawValue,
        coerced: &Coerced,
    ) {
        if coerced.converted {
            report.issues_fixed += 1;
            report
                .field_compliance
                .fields
                .entry(field)
                .or_default()
                .converted += 1;
        }
        match field.kind() {
            FieldKind::Currency if !raw.is_null() => {
                let entry = report.currency_compliance.entry(field).or_default();
                if coerced.cell.is_invalid() {
                    let spelling = raw.to_string();
                    if !entry.unmapped.contains(&spelling) {
                        entry.unmapped.push(spelling);
                    }
                } else if coerced.converted {
                    entry.standardized += 1;
                } else {
                    entry.already_canonical += 1;
                }
            }
            FieldKind::Date if !raw.is_null() => {
                let entry = report.date_compliance.entry(field).or_default();
                if coerced.cell.is_invalid() {
                    entry.unparseable += 1;
                } else {
                    entry.parsed += 1;
                }
            }
            _ => {}
        }
    }

    fn count_fields(
        report: &mut StandardizationReport,
        data_type: DataType,
        records: &[CanonicalRecord],
    ) {
        for field in data_type.schema() {
            let counts = report.field_compliance.fields.entry(*field).or_default();
            for record in records {
                match record.get(*field) {
                    Cell::Missing => counts.missing += 1,
                    Cell::Invalid { .. } => {
                        counts.present += 1;
                        counts.invalid += 1;
                    }
                    _ => counts.present += 1,
                }
            }
        }
        report.field_compliance.missing_required_fields = data_type
            .required()
            .iter()
            .filter(|f| {
                report
                    .field_compliance
                    .fields
                    .get(*f)
                    .is_some_and(|c| c.present == 0)
            })
            .copied()
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RawRecord;
    use chrono::NaiveDate;

    fn batch(records: Vec<RawRecord>) -> RawBatch {
        RawBatch::new("feed_a", records)
    }

    #[test]
    fn unknown_data_type_is_fatal() {
        let err = FieldNormalizer::new()
            .standardize(&batch(vec![]), "options")
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::UnknownDataType(_)));
    }

    #[test]
    fn empty_batch_gives_empty_report() {
        let (out, report) = FieldNormalizer::new()
            .standardize(&batch(vec![]), "price")
            .unwrap();
        assert!(out.is_empty());
        assert_eq!(report.record_count, 0);
        assert_eq!(report.issues_fixed, 0);
    }

    #[test]
    fn renames_aliases_and_coerces_types() {
        let raw = RawRecord::new()
            .with("ticker", "aapl")
            .with("timestamp", "2024-01-02")
            .with("opening_price", "150.10")
            .with("highest_price", 153.0)
            .with("lowest_price", 149.5)
            .with("closing_price", "152.80")
            .with("vol", "1,000,000");
        let (out, report) = FieldNormalizer::new()
            .standardize(&batch(vec![raw]), "price")
            .unwrap();

        let rec = &out.records[0];
        assert_eq!(rec.symbol(), Some("AAPL"));
        assert_eq!(rec.date(FieldName::Date), NaiveDate::from_ymd_opt(2024, 1, 2));
        assert_eq!(rec.number(FieldName::Open), Some(150.10));
        assert_eq!(rec.number(FieldName::Close), Some(152.80));
        assert_eq!(rec.number(FieldName::Volume), Some(1_000_000.0));
        assert!(rec.get(FieldName::AdjClose).is_missing());

        assert_eq!(report.field_compliance.renamed_fields.len(), 7);
        assert_eq!(report.issues_fixed, 7);
        assert!(report.issues.is_empty());
        assert!(report.field_compliance.missing_required_fields.is_empty());
    }

    #[test]
    fn exact_name_beats_alias() {
        let raw = RawRecord::new()
            .with("ticker", "MSFT")
            .with("symbol", "AAPL");
        let (out, report) = FieldNormalizer::new()
            .standardize(&batch(vec![raw]), "price")
            .unwrap();
        let rec = &out.records[0];
        assert_eq!(rec.symbol(), Some("AAPL"));
        assert_eq!(rec.extras.get("ticker"), Some(&RawValue::from("MSFT")));
        assert_eq!(report.issues_of(IssueKind::DuplicateField).count(), 1);
    }

    #[test]
    fn unparseable_values_are_flagged_not_dropped() {
        let raw = RawRecord::new()
            .with("symbol", "AAPL")
            .with("report_date", "someday")
            .with("eps", "two forty-eight");
        let (out, report) = FieldNormalizer::new()
            .standardize(&batch(vec![raw]), "earnings")
            .unwrap();
        let rec = &out.records[0];
        assert!(rec.get(FieldName::Eps).is_invalid());
        assert!(rec.get(FieldName::ReportDate).is_invalid());
        assert_eq!(report.issues_of(IssueKind::UnparseableNumber).count(), 1);
        assert_eq!(report.issues_of(IssueKind::UnparseableDate).count(), 1);
        assert_eq!(report.date_compliance[&FieldName::ReportDate].unparseable, 1);
        assert_eq!(report.field_compliance.fields[&FieldName::Eps].invalid, 1);
        assert_eq!(report.issues_fixed, 2);
    }

    #[test]
    fn negative_dividend_is_flagged_and_kept() {
        let raw = RawRecord::new()
            .with("symbol", "MSFT")
            .with("ex_date", "2024-05-10")
            .with("div_amount", -0.26);
        let (out, report) = FieldNormalizer::new()
            .standardize(&batch(vec![raw]), "dividend")
            .unwrap();
        assert_eq!(out.records[0].number(FieldName::DividendAmount), Some(-0.26));
        let issue = report.issues_of(IssueKind::SignViolation).next().unwrap();
        assert_eq!(issue.field, "dividend_amount");
        assert_eq!(issue.row, 0);
    }

    #[test]
    fn currencies_and_frequencies_are_canonicalized() {
        let records = vec![
            RawRecord::new()
                .with("symbol", "MSFT")
                .with("currency", "US DOLLAR")
                .with("frequency", "Q"),
            RawRecord::new()
                .with("symbol", "MSFT")
                .with("currency", "USD")
                .with("frequency", "quarterly"),
            RawRecord::new()
                .with("symbol", "MSFT")
                .with("currency", "doubloons")
                .with("frequency", "fortnightly"),
        ];
        let (out, report) = FieldNormalizer::new()
            .standardize(&batch(records), "dividend")
            .unwrap();

        assert_eq!(
            out.records[0].get(FieldName::Currency),
            &Cell::Currency(CurrencyCode::parse("USD").unwrap())
        );
        assert_eq!(
            out.records[0].get(FieldName::Frequency),
            &Cell::Frequency(Frequency::Quarterly)
        );
        assert!(out.records[2].get(FieldName::Currency).is_invalid());

        let currency = &report.currency_compliance[&FieldName::Currency];
        assert_eq!(currency.standardized, 1);
        assert_eq!(currency.already_canonical, 1);
        assert_eq!(currency.unmapped, vec!["doubloons".to_string()]);
        assert_eq!(report.issues_of(IssueKind::UnmappedFrequency).count(), 1);
        // ex_date and dividend_amount are absent everywhere
        assert_eq!(
            report.field_compliance.missing_required_fields,
            vec![FieldName::ExDate, FieldName::DividendAmount]
        );
    }

    #[test]
    fn fiscal_quarter_spellings() {
        let records = vec![
            RawRecord::new().with("fiscal_qtr", "Q2"),
            RawRecord::new().with("fiscal_qtr", 3.0),
            RawRecord::new().with("fiscal_qtr", "Q7"),
        ];
        let (out, report) = FieldNormalizer::new()
            .standardize(&batch(records), "earnings")
            .unwrap();
        assert_eq!(out.records[0].get(FieldName::FiscalQuarter), &Cell::Integer(2));
        assert_eq!(out.records[1].get(FieldName::FiscalQuarter), &Cell::Integer(3));
        assert!(out.records[2].get(FieldName::FiscalQuarter).is_invalid());
        assert_eq!(report.issues_of(IssueKind::OutOfRange).count(), 1);
        assert_eq!(report.field_compliance.fields[&FieldName::FiscalQuarter].converted, 1);
    }

    #[test]
    fn float_formatted_quarter_and_year() {
        let raw = RawRecord::new()
            .with("fiscal_quarter", "3.0")
            .with("fiscal_year", "2024.0");
        let (out, report) = FieldNormalizer::new()
            .standardize(&batch(vec![raw]), "earnings")
            .unwrap();
        assert_eq!(out.records[0].get(FieldName::FiscalQuarter), &Cell::Integer(3));
        assert_eq!(out.records[0].get(FieldName::FiscalYear), &Cell::Integer(2024));
        assert_eq!(report.issues_of(IssueKind::OutOfRange).count(), 0);
    }

    #[test]
    fn unmapped_fields_are_kept_in_extras() {
        let raw = RawRecord::new()
            .with("symbol", "AAPL")
            .with("provider_row_id", "x-17");
        let (out, report) = FieldNormalizer::new()
            .standardize(&batch(vec![raw]), "price")
            .unwrap();
        assert_eq!(
            out.records[0].extras.get("provider_row_id"),
            Some(&RawValue::from("x-17"))
        );
        assert_eq!(report.field_compliance.unmapped_fields, vec!["provider_row_id"]);
    }

    #[test]
    fn config_aliases_extend_the_table() {
        let mut config = NormalizerConfig::default();
        config
            .aliases
            .entry(DataType::Price)
            .or_default()
            .insert("Last".into(), "close".into());
        config.currencies.insert("greenback".into(), "usd".into());
        let normalizer = FieldNormalizer::with_config(&config).unwrap();

        let raw = RawRecord::new()
            .with("last", 10.5)
            .with("currency", "Greenback");
        let (out, _) = normalizer.standardize(&batch(vec![raw]), "price").unwrap();
        assert_eq!(out.records[0].number(FieldName::Close), Some(10.5));
        assert_eq!(
            out.records[0].get(FieldName::Currency),
            &Cell::Currency(CurrencyCode::parse("USD").unwrap())
        );
    }

    #[test]
    fn config_alias_outside_schema_is_rejected() {
        let mut config = NormalizerConfig::default();
        config
            .aliases
            .entry(DataType::Dividend)
            .or_default()
            .insert("per_share".into(), "eps".into());
        assert!(matches!(
            FieldNormalizer::with_config(&config),
            Err(ConfigurationError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn lineage_restamp_keeps_business_cells() {
        let raw = RawRecord::new().with("symbol", "AAPL").with("close", 1.0);
        let (out, _) = FieldNormalizer::new()
            .standardize(&batch(vec![raw]), "price")
            .unwrap();
        let info = ProcessInfo::new("quality_gate", "2.1").with_step("dedupe");
        let stamped = FieldNormalizer::add_data_lineage(&out.records, "vendor_x", &info);

        let lineage = &stamped[0].lineage;
        assert_eq!(lineage.source, "vendor_x");
        assert_eq!(lineage.processor, "quality_gate");
        assert_eq!(lineage.version, "2.1");
        assert_eq!(lineage.processing_steps, vec!["standardize", "dedupe"]);
        assert_eq!(lineage.timestamp, info.timestamp);
        assert_eq!(stamped[0].cells(), out.records[0].cells());
        assert_eq!(lineage.fingerprint, out.records[0].lineage.fingerprint);
    }
}
