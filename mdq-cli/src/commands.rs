//! Command bodies. Each returns the JSON document the CLI prints.

use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::info;

use mdq_core::{
    Batch, DataType, FieldNormalizer, PipelineConfig, QualityMonitor, ReconciliationEngine,
    SourceTrust,
};

use crate::input::{read_csv, source_name};

/// The three pipeline stages, built once from one config.
pub struct Stages {
    pub normalizer: FieldNormalizer,
    pub monitor: QualityMonitor,
    pub engine: ReconciliationEngine,
}

impl Stages {
    pub fn load(config: Option<&Path>) -> Result<Self> {
        let config = match config {
            Some(path) => PipelineConfig::from_file(path)
                .with_context(|| format!("invalid config {}", path.display()))?,
            None => PipelineConfig::default(),
        };
        Ok(Self {
            normalizer: FieldNormalizer::with_config(&config.normalizer)?,
            monitor: QualityMonitor::with_config(config.quality)?,
            engine: ReconciliationEngine::with_config(config.reconciliation)?,
        })
    }

    fn normalize(&self, path: &Path, data_type: &str, source: Option<&str>) -> Result<Batch> {
        let raw = read_csv(path, source)?;
        let (batch, _) = self.normalizer.standardize(&raw, data_type)?;
        Ok(batch)
    }
}

/// Split a comma-separated column list, dropping blanks.
pub fn split_columns(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn normalize(stages: &Stages, path: &Path, data_type: &str, source: Option<&str>) -> Result<Value> {
    let raw = read_csv(path, source)?;
    let (batch, report) = stages.normalizer.standardize(&raw, data_type)?;
    info!(source = %batch.source, records = batch.len(), "normalized");
    Ok(json!({ "batch": batch, "report": report }))
}

pub fn check(stages: &Stages, path: &Path, data_type: &str, source: Option<&str>) -> Result<Value> {
    let batch = stages.normalize(path, data_type, source)?;
    let (checked, report) = stages.monitor.check_data_quality(&batch);
    Ok(json!({
        "batch": checked,
        "report": report,
        "reliability": stages.monitor.get_source_reliability_report(),
    }))
}

pub fn reconcile(
    stages: &Stages,
    data_type: &str,
    keys: Option<&str>,
    values: Option<&str>,
    primary: &Path,
    secondary: &Path,
) -> Result<Value> {
    let primary = stages.normalize(primary, data_type, None)?;
    let secondary = stages.normalize(secondary, data_type, None)?;
    let engine = &stages.engine;

    let (rows, report) = match (primary.data_type, keys, values) {
        (DataType::Dividend, None, None) => engine.reconcile_dividend_data(&primary, &secondary)?,
        (DataType::Earnings, None, None) => engine.reconcile_earnings_data(&primary, &secondary)?,
        (dt, keys, values) => {
            let keys = keys.map(split_columns).unwrap_or_else(|| default_keys(dt));
            let values = values.map(split_columns).unwrap_or_else(|| default_values(dt));
            engine.reconcile_price_data(
                &primary,
                &secondary,
                &as_strs(&keys),
                &as_strs(&values),
            )?
        }
    };
    Ok(json!({ "rows": rows, "report": report }))
}

pub fn merge(
    stages: &Stages,
    data_type: &str,
    keys: Option<&str>,
    values: Option<&str>,
    weighted: bool,
    files: &[PathBuf],
) -> Result<Value> {
    if files.is_empty() {
        bail!("merge needs at least one input file");
    }
    let names = unique_source_names(files);
    let batches: Vec<Batch> = files
        .par_iter()
        .zip(names.par_iter())
        .map(|(path, name)| {
            let batch = stages.normalize(path, data_type, Some(name.as_str()))?;
            let (checked, _) = stages.monitor.check_data_quality(&batch);
            Ok(checked)
        })
        .collect::<Result<_>>()?;

    let dt = batches[0].data_type;
    let keys = keys.map(split_columns).unwrap_or_else(|| default_keys(dt));
    let values = values.map(split_columns).unwrap_or_else(|| default_values(dt));
    let reliability = stages.monitor.get_source_reliability_report();

    let merged = if weighted {
        let trust = SourceTrust::from_reliability(&reliability);
        stages.engine.reconcile_multiple_sources_weighted(
            &batches,
            &as_strs(&keys),
            &as_strs(&values),
            &trust,
        )?
    } else {
        stages
            .engine
            .reconcile_multiple_sources(&batches, &as_strs(&keys), &as_strs(&values))?
    };
    Ok(json!({ "records": merged, "reliability": reliability }))
}

/// File stems, falling back to the full path for stems shared by several files.
fn unique_source_names(files: &[PathBuf]) -> Vec<String> {
    let stems: Vec<String> = files.iter().map(|p| source_name(p)).collect();
    stems
        .iter()
        .zip(files)
        .map(|(stem, path)| {
            if stems.iter().filter(|s| *s == stem).count() > 1 {
                path.display().to_string()
            } else {
                stem.clone()
            }
        })
        .collect()
}

fn default_keys(data_type: DataType) -> Vec<String> {
    let keys: &[&str] = match data_type {
        DataType::Price => &["date", "symbol"],
        DataType::Dividend => &["symbol", "ex_date"],
        DataType::Earnings => &["symbol", "report_date"],
    };
    keys.iter().map(|s| s.to_string()).collect()
}

fn default_values(data_type: DataType) -> Vec<String> {
    let values: &[&str] = match data_type {
        DataType::Price => &["open", "high", "low", "close", "volume"],
        DataType::Dividend => &["dividend_amount"],
        DataType::Earnings => &["eps"],
    };
    values.iter().map(|s| s.to_string()).collect()
}

fn as_strs(columns: &[String]) -> Vec<&str> {
    columns.iter().map(String::as_str).collect()
}
