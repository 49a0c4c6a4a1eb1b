//! Persistence: route scraped tables to flat files, the embedded DuckDB
//! database, or MotherDuck.

pub mod arrow;
pub mod duck;
pub mod file;

pub use file::save_local;

use std::path::PathBuf;

use crate::config::{Config, Destination, FileFormat};
use crate::error::Result;
use crate::table::Table;

/// Where a table ended up after [`save`].
#[derive(Debug)]
pub struct SaveReport {
    /// The local artifact, always written before any upload.
    pub local_path: PathBuf,
    /// Rows uploaded to a database, when the destination is one.
    pub uploaded_rows: Option<usize>,
}

/// Persist a table per the configured destination.
///
/// A local file is always written first so a failed upload never loses a
/// scrape. Database uploads run after it, and their errors are returned to
/// the caller.
pub fn save(table: &Table, name: &str, format: FileFormat, cfg: &Config) -> Result<SaveReport> {
    let local_path = file::save_local(table, name, format, &cfg.raw_dir())?;

    let uploaded_rows = match cfg.destination {
        Destination::Local => None,
        Destination::DuckDb => Some(duck::save_duckdb(table, name, cfg)?),
        Destination::MotherDuck => Some(duck::save_motherduck(table, name, cfg)?),
    };

    Ok(SaveReport {
        local_path,
        uploaded_rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn sample() -> Table {
        Table::from_records(&[
            json!({"Date": "2025-08-16", "GF": "2"}),
            json!({"Date": "2025-08-23", "GF": "0"}),
        ])
    }

    #[test]
    fn local_destination_writes_only_the_file() {
        let dir = tempdir().unwrap();
        let cfg = Config {
            data_dir: dir.path().to_path_buf(),
            ..Config::default()
        };

        let report = save(&sample(), "fbref_2025", FileFormat::Csv, &cfg).unwrap();
        assert!(report.local_path.exists());
        assert!(report.local_path.starts_with(cfg.raw_dir()));
        assert_eq!(report.uploaded_rows, None);
    }

    #[test]
    fn duckdb_destination_uploads_after_the_backup() {
        let dir = tempdir().unwrap();
        let cfg = Config {
            destination: Destination::DuckDb,
            data_dir: dir.path().to_path_buf(),
            ..Config::default()
        };

        let report = save(&sample(), "fbref_2025", FileFormat::Csv, &cfg).unwrap();
        assert!(report.local_path.exists());
        assert_eq!(report.uploaded_rows, Some(2));
        assert!(cfg.duckdb_path().exists());
    }
}
