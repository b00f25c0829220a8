use std::path::Path;

use anyhow::{bail, Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::{
    models::{timetable::TimetableEntry, user::User},
    store::Store,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub upserted: usize,
    pub failed: usize,
}

/// Read a data file into JSON objects, picking the format from the extension:
/// `.json` (array), `.jsonl`/`.ndjson` (one object per line), `.csv` and
/// `.xlsx`/`.xls`/`.ods` (first sheet, header row). Empty cells are left out
/// so that the row types fall back to their defaults.
pub fn read_rows(path: &Path) -> Result<Vec<Value>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "json" => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let rows: Vec<Value> = serde_json::from_str(&text)
                .with_context(|| format!("{} is not a JSON array", path.display()))?;
            Ok(rows)
        }
        "jsonl" | "ndjson" => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            text.lines()
                .enumerate()
                .filter(|(_, line)| !line.trim().is_empty())
                .map(|(i, line)| {
                    serde_json::from_str(line).with_context(|| format!("Line {} is not valid JSON", i + 1))
                })
                .collect()
        }
        "csv" => read_csv(path),
        "xlsx" | "xls" | "ods" => read_sheet(path),
        other => bail!("Unsupported file type '{}' for {}", other, path.display()),
    }
}

fn read_csv(path: &Path) -> Result<Vec<Value>> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let mut row = Map::new();
        for (key, value) in headers.iter().zip(record.iter()) {
            if !value.trim().is_empty() {
                row.insert(key.clone(), Value::String(value.trim().to_string()));
            }
        }
        rows.push(Value::Object(row));
    }
    Ok(rows)
}

fn read_sheet(path: &Path) -> Result<Vec<Value>> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Failed to open workbook {}", path.display()))?;
    let range = workbook
        .worksheet_range_at(0)
        .context("Workbook has no sheets")??;

    let mut lines = range.rows();
    let Some(header) = lines.next() else {
        return Ok(Vec::new());
    };
    let headers: Vec<String> = header.iter().map(|c| c.to_string().trim().to_string()).collect();

    Ok(lines
        .map(|cells| {
            let row: Map<String, Value> = headers
                .iter()
                .zip(cells.iter())
                .filter(|(_, cell)| !matches!(cell, Data::Empty))
                .map(|(key, cell)| (key.clone(), Value::String(cell.to_string().trim().to_string())))
                .collect();
            Value::Object(row)
        })
        .collect())
}

fn decode<T: DeserializeOwned>(index: usize, row: Value) -> Option<T> {
    match serde_json::from_value(row) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Row {}: {}", index + 1, e);
            None
        }
    }
}

pub async fn load_timetable(store: &dyn Store, rows: Vec<Value>) -> LoadSummary {
    let mut summary = LoadSummary::default();
    for (i, row) in rows.into_iter().enumerate() {
        let Some(entry) = decode::<TimetableEntry>(i, row) else {
            summary.failed += 1;
            continue;
        };
        match store.upsert_timetable(&entry).await {
            Ok(()) => summary.upserted += 1,
            Err(e) => {
                warn!("Row {} ({} {} {}): {}", i + 1, entry.day, entry.time, entry.subject, e);
                summary.failed += 1;
            }
        }
    }
    info!("Timetable load: {} upserted, {} failed", summary.upserted, summary.failed);
    summary
}

pub async fn load_users(store: &dyn Store, rows: Vec<Value>) -> LoadSummary {
    let mut summary = LoadSummary::default();
    for (i, row) in rows.into_iter().enumerate() {
        let Some(user) = decode::<User>(i, row) else {
            summary.failed += 1;
            continue;
        };
        if user.username.trim().is_empty() {
            warn!("Row {}: empty username", i + 1);
            summary.failed += 1;
            continue;
        }
        match store.upsert_user(&user).await {
            Ok(()) => summary.upserted += 1,
            Err(e) => {
                warn!("Row {} ({}): {}", i + 1, user.username, e);
                summary.failed += 1;
            }
        }
    }
    info!("User load: {} upserted, {} failed", summary.upserted, summary.failed);
    summary
}
