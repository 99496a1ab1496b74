//! CSV batches → raw provider records.

use anyhow::{Context, Result};
use mdq_core::{RawBatch, RawRecord, RawValue};
use std::path::Path;
use tracing::warn;

/// Source name for a file: its stem, or the whole path if it has none.
pub fn source_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Read a headed CSV file. Every non-empty cell stays text; coercion is
/// the normalizer's job.
pub fn read_csv(path: &Path, source: Option<&str>) -> Result<RawBatch> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let headers = reader
        .headers()
        .with_context(|| format!("failed to read header row of {}", path.display()))?
        .clone();

    let mut records = Vec::new();
    for (i, row) in reader.records().enumerate() {
        let row = row.with_context(|| format!("{}: bad CSV row {}", path.display(), i + 1))?;
        if row.len() > headers.len() {
            warn!(
                file = %path.display(),
                row = i + 1,
                extra = row.len() - headers.len(),
                "row has more cells than the header, keeping them as positional columns"
            );
        }
        let mut record = RawRecord::new();
        for (pos, value) in row.iter().enumerate() {
            let name = match headers.get(pos) {
                Some(name) => name.to_string(),
                None => format!("column_{}", pos + 1),
            };
            let value = if value.trim().is_empty() {
                RawValue::Null
            } else {
                RawValue::from(value)
            };
            record = record.with(name, value);
        }
        records.push(record);
    }

    let source = source.map_or_else(|| source_name(path), str::to_string);
    Ok(RawBatch::new(source, records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_headers_and_blank_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vendor_a.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, " ticker ,close_price").unwrap();
        writeln!(f, "AAPL,101.5").unwrap();
        writeln!(f, "MSFT,").unwrap();
        drop(f);

        let batch = read_csv(&path, None).unwrap();
        assert_eq!(batch.source, "vendor_a");
        assert_eq!(batch.records.len(), 2);
        assert_eq!(
            batch.records[0].fields,
            vec![
                ("ticker".to_string(), RawValue::Text("AAPL".into())),
                ("close_price".to_string(), RawValue::Text("101.5".into())),
            ]
        );
        assert_eq!(batch.records[1].fields[1].1, RawValue::Null);
    }

    #[test]
    fn ragged_rows_keep_extra_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ragged.csv");
        std::fs::write(&path, "symbol,close\nAAPL,101.5,oops\nMSFT\n").unwrap();

        let batch = read_csv(&path, None).unwrap();
        assert_eq!(
            batch.records[0].fields[2],
            ("column_3".to_string(), RawValue::Text("oops".into()))
        );
        assert_eq!(batch.records[1].fields.len(), 1);
    }

    #[test]
    fn explicit_source_overrides_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.csv");
        std::fs::write(&path, "symbol\nSPY\n").unwrap();
        assert_eq!(read_csv(&path, Some("feed")).unwrap().source, "feed");
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(read_csv(Path::new("/nonexistent/nope.csv"), None).is_err());
    }
}
