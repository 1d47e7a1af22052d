//! Flat CSV files the runs hand their records over in.
//!
//! Files are always rewritten whole: the new content goes to a sibling
//! `.tmp` file first and replaces the target with a rename, so an interrupted
//! checkpoint never leaves a truncated file behind.

use crate::error::Result;
pub use crate::log_info;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// An open-ended record: column name to value, in column order.
pub type Row = Map<String, Value>;

pub fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn replace_with(path: &Path, write: impl FnOnce(&Path) -> Result<()>) -> Result<()> {
    ensure_parent(path)?;
    let tmp = temp_path(path);
    write(&tmp)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Writes typed records; the header comes from the serde field names.
pub fn write_records<T: Serialize>(path: impl AsRef<Path>, records: &[T]) -> Result<()> {
    let path = path.as_ref();
    replace_with(path, |tmp| {
        let mut writer = csv::Writer::from_path(tmp)?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    })?;

    log_info!("[sink] Saved {} records to {}", records.len(), path.display());
    Ok(())
}

pub fn read_records<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path.as_ref())?;
    let records = reader.deserialize().collect::<std::result::Result<Vec<T>, _>>()?;
    Ok(records)
}

/// Column names over all rows, in first-seen order.
pub fn columns(rows: &[Row]) -> Vec<String> {
    let mut seen = Map::new();
    for row in rows {
        for key in row.keys() {
            if !seen.contains_key(key) {
                seen.insert(key.clone(), Value::Null);
            }
        }
    }
    seen.into_iter().map(|(key, _)| key).collect()
}

/// Writes open-ended rows. Rows missing a column get an empty cell.
pub fn write_rows(path: impl AsRef<Path>, rows: &[Row]) -> Result<()> {
    let path = path.as_ref();
    let header = columns(rows);

    replace_with(path, |tmp| {
        let mut writer = csv::Writer::from_path(tmp)?;
        if !header.is_empty() {
            writer.write_record(&header)?;
        }
        for row in rows {
            writer.write_record(header.iter().map(|column| cell(row.get(column))))?;
        }
        writer.flush()?;
        Ok(())
    })?;

    log_info!("[sink] Saved {} rows to {}", rows.len(), path.display());
    Ok(())
}

pub fn read_rows(path: impl AsRef<Path>) -> Result<Vec<Row>> {
    let mut reader = csv::Reader::from_path(path.as_ref())?;
    let header = reader.headers()?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row: Row = header
            .iter()
            .zip(record.iter())
            .map(|(column, value)| (column.to_string(), Value::String(value.to_string())))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

/// Text form of a value in a CSV cell. Strings are written as-is, lists and
/// objects as JSON so they can be parsed back.
pub fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::VehicleRecord;
    use serde_json::json;

    #[test]
    fn typed_records_survive_the_handoff() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("alientech_vehicles.csv");

        let records = vec![
            VehicleRecord {
                url: "https://a/1".into(),
                brand: "Audi".into(),
                tools_text: "KESS3, K-TAG".into(),
                ..VehicleRecord::default()
            },
            VehicleRecord {
                url: "https://a/2".into(),
                model: "Golf, \"GTI\"".into(),
                ..VehicleRecord::default()
            },
        ];
        write_records(&path, &records).unwrap();

        let header = fs::read_to_string(&path).unwrap();
        assert!(header.starts_with("URL,Vehicle Type,Brand,Model"));
        assert_eq!(read_records::<VehicleRecord>(&path).unwrap(), records);
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn rows_with_different_columns_share_one_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.csv");

        let rows: Vec<Row> = vec![
            json!({"URL": "https://a/1", "Engine": "2.0"}).as_object().unwrap().clone(),
            json!({"URL": "https://a/2", "ECU": "EDC17", "methods": ["obd", "bench"]})
                .as_object()
                .unwrap()
                .clone(),
        ];
        write_rows(&path, &rows).unwrap();

        let read = read_rows(&path).unwrap();
        assert_eq!(columns(&read), vec!["URL", "Engine", "ECU", "methods"]);
        assert_eq!(read[0]["ECU"], "");
        assert_eq!(read[1]["methods"], "[\"obd\",\"bench\"]");
    }

    #[test]
    fn overwrites_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        let row = |url: &str| json!({ "URL": url }).as_object().unwrap().clone();

        write_rows(&path, &[row("a"), row("b")]).unwrap();
        write_rows(&path, &[row("c")]).unwrap();

        let read = read_rows(&path).unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0]["URL"], "c");
    }
}
