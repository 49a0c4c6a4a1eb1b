//! DuckDB persistence, both the embedded file database and MotherDuck.
//!
//! Tables are staged to a temporary Parquet file and loaded with
//! `read_parquet`, so the database sees the same inferred types as the local
//! Parquet artifacts.

use std::fs;

use duckdb::Connection;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use tempfile::NamedTempFile;
use tracing::{info, instrument};

use crate::config::{Config, WritePolicy};
use crate::error::{Result, ScrapeError};
use crate::store::arrow::to_record_batch;
use crate::table::Table;

/// Store `table` as `<schema>.<name>` in the embedded database file.
#[instrument(level = "info", skip(table, cfg), fields(rows = table.len()))]
pub fn save_duckdb(table: &Table, name: &str, cfg: &Config) -> Result<usize> {
    let path = cfg.duckdb_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| ScrapeError::persistence(parent.display().to_string(), e))?;
    }
    info!(path = %path.display(), "opening embedded database");
    let conn = Connection::open(&path)
        .map_err(|e| ScrapeError::persistence(path.display().to_string(), e))?;
    store_via(&conn, table, &cfg.schema, name, cfg.write_policy)
}

/// Store `table` as `<schema>.<name>` in the hosted MotherDuck database.
///
/// The token is passed only in the connection string and never logged.
#[instrument(level = "info", skip(table, cfg), fields(rows = table.len()))]
pub fn save_motherduck(table: &Table, name: &str, cfg: &Config) -> Result<usize> {
    let token = cfg.motherduck_token.as_deref().ok_or_else(|| {
        ScrapeError::Configuration(
            "MOTHERDUCK_TOKEN must be set when the destination is motherduck".to_string(),
        )
    })?;
    info!(database = %cfg.database, "connecting to MotherDuck");
    let conn = Connection::open(format!(
        "md:{}?motherduck_token={}",
        cfg.database, token
    ))
    .map_err(|e| ScrapeError::persistence(format!("md:{}", cfg.database), e))?;
    store_via(&conn, table, &cfg.schema, name, cfg.write_policy)
}

/// Load the staged table into `<schema>.<name>` honoring the write policy.
/// Returns the number of rows written.
pub(crate) fn store_via(
    conn: &Connection,
    table: &Table,
    schema: &str,
    name: &str,
    policy: WritePolicy,
) -> Result<usize> {
    let qualified = format!("{}.{}", quote_ident(schema), quote_ident(name));
    let target = format!("{schema}.{name}");

    conn.execute_batch(&format!(
        "CREATE SCHEMA IF NOT EXISTS {};",
        quote_ident(schema)
    ))
    .map_err(|e| ScrapeError::persistence(&target, e))?;

    let staged = stage_parquet(table)?;
    let source = format!(
        "SELECT * FROM read_parquet('{}')",
        escape_literal(&staged.path().to_string_lossy())
    );

    let sql = match policy {
        WritePolicy::Replace => format!("CREATE OR REPLACE TABLE {qualified} AS {source};"),
        WritePolicy::Fail => {
            if table_exists(conn, schema, name)? {
                return Err(ScrapeError::Persistence {
                    target,
                    reason: "table already exists and the write policy is fail".to_string(),
                });
            }
            format!("CREATE TABLE {qualified} AS {source};")
        }
        WritePolicy::Append => {
            if table_exists(conn, schema, name)? {
                format!("INSERT INTO {qualified} {source};")
            } else {
                format!("CREATE TABLE {qualified} AS {source};")
            }
        }
    };
    conn.execute_batch(&sql)
        .map_err(|e| ScrapeError::persistence(&target, e))?;

    let total: i64 = conn
        .query_row(&format!("SELECT COUNT(*) FROM {qualified};"), [], |r| {
            r.get(0)
        })
        .map_err(|e| ScrapeError::persistence(&target, e))?;
    info!(table = %target, written = table.len(), total, "stored table");
    Ok(table.len())
}

fn table_exists(conn: &Connection, schema: &str, name: &str) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM information_schema.tables \
             WHERE table_schema = ? AND table_name = ?;",
            duckdb::params![schema, name],
            |r| r.get(0),
        )
        .map_err(|e| ScrapeError::persistence(format!("{schema}.{name}"), e))?;
    Ok(count > 0)
}

fn stage_parquet(table: &Table) -> Result<NamedTempFile> {
    let batch = to_record_batch(table)?;

    let tmp = tempfile::Builder::new()
        .prefix("scrape-stage-")
        .suffix(".parquet")
        .tempfile()
        .map_err(|e| ScrapeError::persistence("parquet staging", e))?;

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(tmp.as_file(), batch.schema(), Some(props))
        .map_err(|e| ScrapeError::persistence("parquet staging", e))?;
    writer
        .write(&batch)
        .map_err(|e| ScrapeError::persistence("parquet staging", e))?;
    writer
        .close()
        .map_err(|e| ScrapeError::persistence("parquet staging", e))?;
    Ok(tmp)
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn escape_literal(raw: &str) -> String {
    raw.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(n: usize) -> Table {
        let records: Vec<serde_json::Value> = (0..n)
            .map(|i| json!({"Date": format!("2025-08-{:02}", i + 1), "GF": i}))
            .collect();
        Table::from_records(&records)
    }

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM raw.{table};"), [], |r| {
            r.get(0)
        })
        .unwrap()
    }

    #[test]
    fn replace_overwrites_existing_table() {
        let conn = Connection::open_in_memory().unwrap();
        store_via(&conn, &rows(2), "raw", "fbref", WritePolicy::Replace).unwrap();
        store_via(&conn, &rows(3), "raw", "fbref", WritePolicy::Replace).unwrap();
        assert_eq!(count(&conn, "fbref"), 3);
    }

    #[test]
    fn fail_policy_errors_once_the_table_exists() {
        let conn = Connection::open_in_memory().unwrap();
        store_via(&conn, &rows(2), "raw", "fbref", WritePolicy::Fail).unwrap();

        let err = store_via(&conn, &rows(2), "raw", "fbref", WritePolicy::Fail).unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(count(&conn, "fbref"), 2);
    }

    #[test]
    fn append_creates_then_extends() {
        let conn = Connection::open_in_memory().unwrap();
        let written = store_via(&conn, &rows(2), "raw", "fbref", WritePolicy::Append).unwrap();
        assert_eq!(written, 2);
        assert_eq!(count(&conn, "fbref"), 2);

        store_via(&conn, &rows(2), "raw", "fbref", WritePolicy::Append).unwrap();
        assert_eq!(count(&conn, "fbref"), 4);
    }
}
