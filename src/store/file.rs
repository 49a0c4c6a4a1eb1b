//! Flat-file writers for scraped tables.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use serde_json::Value;
use tracing::info;

use crate::config::FileFormat;
use crate::error::{Result, ScrapeError};
use crate::store::arrow::to_record_batch;
use crate::table::Table;

/// Write `table` under `dir` as `<name>.<ext>`, creating the directory if
/// needed. Returns the path of the written file.
pub fn save_local(table: &Table, name: &str, format: FileFormat, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir).map_err(|e| ScrapeError::persistence(dir.display().to_string(), e))?;
    let path = dir.join(format!("{}.{}", name, format.extension()));

    match format {
        FileFormat::Csv => write_csv(table, &path)?,
        FileFormat::Json => write_json(table, &path)?,
        FileFormat::Parquet => write_parquet(table, &path)?,
    }

    info!(path = %path.display(), rows = table.len(), "saved table");
    Ok(path)
}

fn write_csv(table: &Table, path: &Path) -> Result<()> {
    let target = path.display().to_string();
    let mut writer =
        csv::Writer::from_path(path).map_err(|e| ScrapeError::persistence(&target, e))?;

    writer
        .write_record(table.columns())
        .map_err(|e| ScrapeError::persistence(&target, e))?;
    for row in table.rows() {
        let record: Vec<String> = row.iter().map(render_cell).collect();
        writer
            .write_record(&record)
            .map_err(|e| ScrapeError::persistence(&target, e))?;
    }
    writer
        .flush()
        .map_err(|e| ScrapeError::persistence(&target, e))?;
    Ok(())
}

fn write_json(table: &Table, path: &Path) -> Result<()> {
    let target = path.display().to_string();
    let file = File::create(path).map_err(|e| ScrapeError::persistence(&target, e))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &table.to_json_records())
        .map_err(|e| ScrapeError::persistence(&target, e))
}

fn write_parquet(table: &Table, path: &Path) -> Result<()> {
    let target = path.display().to_string();
    let batch = to_record_batch(table)?;

    let file = File::create(path).map_err(|e| ScrapeError::persistence(&target, e))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(BufWriter::new(file), batch.schema(), Some(props))
        .map_err(|e| ScrapeError::persistence(&target, e))?;
    writer
        .write(&batch)
        .map_err(|e| ScrapeError::persistence(&target, e))?;
    writer
        .close()
        .map_err(|e| ScrapeError::persistence(&target, e))?;
    Ok(())
}

/// CSV rendering: nulls become empty cells, nested values JSON text.
fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
