//! Constructor-time configuration for the three pipeline stages.
//!
//! Every section is optional in TOML; missing keys fall back to the
//! defaults below.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::domain::{CurrencyCode, DataType, Frequency};
use crate::error::ConfigurationError;
use crate::reconcile::ToleranceTable;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub normalizer: NormalizerConfig,
    pub quality: QualityConfig,
    pub reconciliation: ReconciliationConfig,
}

impl PipelineConfig {
    /// Load and validate a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigurationError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigurationError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.normalizer.validate()?;
        self.quality.validate()?;
        self.reconciliation.validate()
    }
}

/// Deployment-specific additions to the built-in normalization tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Provider field name → canonical field name, per data type.
    pub aliases: BTreeMap<DataType, BTreeMap<String, String>>,
    /// Free-text currency spelling → three-letter code.
    pub currencies: BTreeMap<String, String>,
    /// Free-text frequency spelling → canonical frequency name.
    pub frequencies: BTreeMap<String, String>,
}

impl NormalizerConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for (data_type, aliases) in &self.aliases {
            for target in aliases.values() {
                data_type.resolve_column(target)?;
            }
        }
        for (spelling, code) in &self.currencies {
            if CurrencyCode::parse(code).is_none() {
                return Err(ConfigurationError::invalid(
                    format!("normalizer.currencies.{spelling}"),
                    format!("'{code}' is not a three-letter currency code"),
                ));
            }
        }
        for (spelling, name) in &self.frequencies {
            if Frequency::from_canonical(name).is_none() {
                return Err(ConfigurationError::invalid(
                    format!("normalizer.frequencies.{spelling}"),
                    format!("'{name}' is not a known frequency"),
                ));
            }
        }
        Ok(())
    }
}

/// Anomaly thresholds for the quality monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Relative close-to-close change that counts as a price jump.
    pub price_jump_threshold: f64,
    /// Volume ratio to the prior bar that counts as a spike.
    pub volume_spike_multiple: f64,
    /// Consecutive identical closes that count as stale.
    pub staleness_run: usize,
    /// Absolute surprise percentage beyond which a report is suspect.
    pub extreme_surprise_pct: f64,
    pub max_abs_eps: f64,
    /// Relative revenue change vs the prior report that counts as a jump.
    pub revenue_jump_threshold: f64,
    /// Standard deviations from the symbol mean for an unusual dividend.
    pub unusual_dividend_sigma: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            price_jump_threshold: 0.10,
            volume_spike_multiple: 5.0,
            staleness_run: 3,
            extreme_surprise_pct: 50.0,
            max_abs_eps: 1000.0,
            revenue_jump_threshold: 1.0,
            unusual_dividend_sigma: 3.0,
        }
    }
}

impl QualityConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        non_negative("quality.price_jump_threshold", self.price_jump_threshold)?;
        non_negative("quality.volume_spike_multiple", self.volume_spike_multiple)?;
        non_negative("quality.extreme_surprise_pct", self.extreme_surprise_pct)?;
        non_negative("quality.max_abs_eps", self.max_abs_eps)?;
        non_negative("quality.revenue_jump_threshold", self.revenue_jump_threshold)?;
        non_negative("quality.unusual_dividend_sigma", self.unusual_dividend_sigma)?;
        if self.staleness_run < 2 {
            return Err(ConfigurationError::invalid(
                "quality.staleness_run",
                "must be at least 2",
            ));
        }
        Ok(())
    }
}

/// Tolerances and outlier rules for the reconciliation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconciliationConfig {
    pub tolerances: ToleranceTable,
    /// |z| above this marks a value as an outlier in N-source consensus.
    pub outlier_z_threshold: f64,
    /// Confidence reported when every value was classified an outlier.
    pub all_outlier_confidence: f64,
    /// Exclude values from records flagged by the quality monitor.
    pub skip_anomalous: bool,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            tolerances: ToleranceTable::default(),
            outlier_z_threshold: 2.0,
            all_outlier_confidence: 0.5,
            skip_anomalous: false,
        }
    }
}

impl ReconciliationConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for (class, tolerance) in self.tolerances.iter() {
            non_negative(&format!("reconciliation.tolerances.{class}"), tolerance)?;
        }
        if !(self.outlier_z_threshold.is_finite() && self.outlier_z_threshold > 0.0) {
            return Err(ConfigurationError::invalid(
                "reconciliation.outlier_z_threshold",
                "must be a positive number",
            ));
        }
        if !(0.0..=1.0).contains(&self.all_outlier_confidence) {
            return Err(ConfigurationError::invalid(
                "reconciliation.all_outlier_confidence",
                "must lie in [0, 1]",
            ));
        }
        Ok(())
    }
}

fn non_negative(setting: &str, value: f64) -> Result<(), ConfigurationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigurationError::invalid(
            setting,
            format!("must be a finite non-negative number, got {value}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = PipelineConfig::from_toml("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.reconciliation.outlier_z_threshold, 2.0);
        assert_eq!(config.reconciliation.tolerances.get("price"), Some(0.005));
    }

    #[test]
    fn parses_all_sections() {
        let config = PipelineConfig::from_toml(
            r#"
            [normalizer]
            aliases.price = { last = "close" }
            currencies = { "GREENBACK" = "usd" }
            frequencies = { "QQ" = "quarterly" }

            [quality]
            price_jump_threshold = 0.2

            [reconciliation]
            tolerances = { price = 0.01, dividend_amount = 0.001 }
            outlier_z_threshold = 1.5
            skip_anomalous = true
            "#,
        )
        .unwrap();

        assert_eq!(
            config.normalizer.aliases[&DataType::Price]["last"],
            "close"
        );
        assert_eq!(config.quality.price_jump_threshold, 0.2);
        assert_eq!(config.quality.volume_spike_multiple, 5.0);
        assert_eq!(config.reconciliation.tolerances.get("price"), Some(0.01));
        assert_eq!(
            config.reconciliation.tolerances.get("dividend_amount"),
            Some(0.001)
        );
        assert!(config.reconciliation.skip_anomalous);
    }

    #[test]
    fn rejects_alias_outside_schema() {
        let err = PipelineConfig::from_toml(
            r#"
            [normalizer]
            aliases.price = { per_share = "eps" }
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::UnknownColumn { .. }));
    }

    #[test]
    fn rejects_negative_tolerance() {
        let err = PipelineConfig::from_toml(
            r#"
            [reconciliation]
            tolerances = { price = -0.1 }
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidSetting { .. }));
    }

    #[test]
    fn rejects_unknown_frequency_target() {
        let err = PipelineConfig::from_toml(
            r#"
            [normalizer]
            frequencies = { "W" = "weekly" }
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidSetting { .. }));
    }

    #[test]
    fn frequency_targets_ignore_case() {
        let config = PipelineConfig::from_toml(
            r#"
            [normalizer]
            frequencies = { "QQ" = "Quarterly" }
            "#,
        )
        .unwrap();
        assert!(crate::FieldNormalizer::with_config(&config.normalizer).is_ok());
    }

    #[test]
    fn reports_parse_errors() {
        let err = PipelineConfig::from_toml("[quality]\nstaleness_run = \"three\"").unwrap_err();
        assert!(matches!(err, ConfigurationError::ConfigParse(_)));
    }
}
