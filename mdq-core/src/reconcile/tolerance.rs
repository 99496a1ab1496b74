//! Allowed relative deviation per field class.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use crate::domain::FieldName;

/// Field class (or column name) → allowed relative deviation.
///
/// Keys are stored lower-case. Entries given in configuration are laid over
/// the defaults rather than replacing them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ToleranceTable {
    entries: BTreeMap<String, f64>,
}

impl ToleranceTable {
    pub const DEFAULT_CLASS: &'static str = "price";

    pub fn new(entries: impl IntoIterator<Item = (String, f64)>) -> Self {
        let mut table = Self::default();
        for (class, tolerance) in entries {
            table.set(&class, tolerance);
        }
        table
    }

    pub fn set(&mut self, class: &str, tolerance: f64) {
        self.entries.insert(class.trim().to_ascii_lowercase(), tolerance);
    }

    pub fn get(&self, class: &str) -> Option<f64> {
        self.entries.get(&class.trim().to_ascii_lowercase()).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Tolerance for a value column.
    ///
    /// Looks up the column name first, then the field's class, then falls
    /// back to the `price` tolerance.
    pub fn for_column(&self, column: FieldName) -> f64 {
        self.get(column.as_str())
            .or_else(|| self.get(column.tolerance_class()))
            .or_else(|| self.get(Self::DEFAULT_CLASS))
            .unwrap_or(0.005)
    }
}

impl Default for ToleranceTable {
    fn default() -> Self {
        let entries = [
            ("price", 0.005),
            ("volume", 0.10),
            ("eps", 0.02),
            ("revenue", 0.05),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        Self { entries }
    }
}

impl<'de> Deserialize<'de> for ToleranceTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let overrides = BTreeMap::<String, f64>::deserialize(deserializer)?;
        Ok(Self::new(overrides))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tolerances() {
        let table = ToleranceTable::default();
        assert_eq!(table.for_column(FieldName::Close), 0.005);
        assert_eq!(table.for_column(FieldName::Volume), 0.10);
        assert_eq!(table.for_column(FieldName::Eps), 0.02);
        assert_eq!(table.for_column(FieldName::Revenue), 0.05);
    }

    #[test]
    fn unknown_columns_fall_back_to_price() {
        let table = ToleranceTable::default();
        assert_eq!(table.for_column(FieldName::DividendAmount), 0.005);
    }

    #[test]
    fn column_entry_beats_class_entry() {
        let table = ToleranceTable::new([("Dividend_Amount".to_string(), 0.001)]);
        assert_eq!(table.for_column(FieldName::DividendAmount), 0.001);
        assert_eq!(table.get("DIVIDEND_AMOUNT"), Some(0.001));
        // defaults survive the override
        assert_eq!(table.for_column(FieldName::Volume), 0.10);
    }
}
