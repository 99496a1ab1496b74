//! Fatal error taxonomy.
//!
//! Only structural misconfiguration aborts a call. Data-level problems are
//! reported as [`ValidationIssue`](crate::normalize::ValidationIssue),
//! [`QualityAnomaly`](crate::quality::QualityAnomaly) and
//! [`ReconciliationDiscrepancy`](crate::reconcile::ReconciliationDiscrepancy)
//! entries instead.

use thiserror::Error;

use crate::domain::DataType;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("unknown data type '{0}' (expected price, dividend or earnings)")]
    UnknownDataType(String),

    #[error("unknown field name '{0}'")]
    UnknownField(String),

    #[error("column '{column}' is not part of the {data_type} schema")]
    UnknownColumn { column: String, data_type: DataType },

    #[error("column '{column}' is not numeric and cannot be tolerance-reconciled")]
    NonNumericColumn { column: String },

    #[error("batches mix data types: expected {expected}, found {found} from source '{source_name}'")]
    MixedDataTypes {
        expected: DataType,
        found: DataType,
        source_name: String,
    },

    #[error("at least one key column is required")]
    NoKeyColumns,

    #[error("invalid setting {setting}: {reason}")]
    InvalidSetting { setting: String, reason: String },

    #[error("cannot read config file: {0}")]
    ConfigRead(#[from] std::io::Error),

    #[error("cannot parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl ConfigurationError {
    pub(crate) fn invalid(setting: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSetting {
            setting: setting.into(),
            reason: reason.into(),
        }
    }
}
