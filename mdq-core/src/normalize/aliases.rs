//! Static provider-name → canonical-name alias table.

use std::collections::HashMap;

use crate::domain::{DataType, FieldName};

use FieldName::*;

/// Known provider spellings. An alias only applies to data types whose
/// schema contains its target.
pub const ALIASES: &[(&str, FieldName)] = &[
    // dates
    ("timestamp", Date),
    ("datetime", Date),
    ("time", Date),
    ("trade_date", Date),
    // prices
    ("opening_price", Open),
    ("open_price", Open),
    ("highest_price", High),
    ("high_price", High),
    ("lowest_price", Low),
    ("low_price", Low),
    ("closing_price", Close),
    ("close_price", Close),
    ("last_price", Close),
    ("adj_close_price", AdjClose),
    ("adjusted_close", AdjClose),
    ("adjusted_closing_price", AdjClose),
    // symbols
    ("ticker", Symbol),
    ("ticker_symbol", Symbol),
    ("code", Symbol),
    // volume
    ("trading_volume", Volume),
    ("vol", Volume),
    // dividends
    ("ex_dividend_date", ExDate),
    ("exdate", ExDate),
    ("payment_dt", PaymentDate),
    ("pay_date", PaymentDate),
    ("declaration_dt", DeclarationDate),
    ("declared_date", DeclarationDate),
    ("announce_date", DeclarationDate),
    ("record_dt", RecordDate),
    ("div_amount", DividendAmount),
    ("dividend", DividendAmount),
    ("div_value", DividendAmount),
    // earnings
    ("earnings_date", ReportDate),
    ("release_date", ReportDate),
    ("announcement_date", ReportDate),
    ("fiscal_yr", FiscalYear),
    ("fiscal_qtr", FiscalQuarter),
    ("expected_earnings", ExpectedEps),
    ("consensus_eps", ExpectedEps),
    ("actual_eps", Eps),
    ("earnings_per_share", Eps),
    ("eps_surprise", SurprisePct),
    ("surprise", SurprisePct),
    ("rev", Revenue),
    ("qtr_end", QuarterEndDate),
    ("quarter_end", QuarterEndDate),
];

/// Lookup key for a provider field name.
pub fn alias_key(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

/// Build the lookup for one data type: canonical names map to themselves,
/// then every applicable alias.
pub fn build_lookup(data_type: DataType) -> HashMap<String, FieldName> {
    let mut lookup: HashMap<String, FieldName> = data_type
        .schema()
        .iter()
        .map(|f| (f.as_str().to_string(), *f))
        .collect();
    for (alias, target) in ALIASES {
        if data_type.contains(*target) {
            lookup.insert((*alias).to_string(), *target);
        }
    }
    lookup
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_only_apply_within_schema() {
        let price = build_lookup(DataType::Price);
        assert_eq!(price.get("ticker"), Some(&Symbol));
        assert_eq!(price.get("vol"), Some(&Volume));
        assert!(price.get("div_amount").is_none());
        assert!(price.get("rev").is_none());

        let dividend = build_lookup(DataType::Dividend);
        assert_eq!(dividend.get("div_amount"), Some(&DividendAmount));
        assert!(dividend.get("opening_price").is_none());
    }

    #[test]
    fn every_alias_lands_in_some_schema() {
        for (alias, target) in ALIASES {
            assert!(
                DataType::ALL.iter().any(|dt| dt.contains(*target)),
                "{alias} targets {target}, which no data type carries"
            );
        }
    }

    #[test]
    fn alias_key_normalizes_case_and_whitespace() {
        assert_eq!(alias_key("  Opening_Price "), "opening_price");
    }
}
