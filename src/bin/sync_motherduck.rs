//! Move scraped tables between the local DuckDB file and MotherDuck.
//!
//! Default mode attaches the local database and `CREATE OR REPLACE`s every
//! table of the configured schema into MotherDuck, verifying row counts.
//! `--export-parquet <dir>` instead copies each local table to a Parquet
//! file; `--ingest <dir>` loads `*.csv` / `*.parquet` files into the
//! configured destination database.

use anyhow::{bail, Context, Result};
use clap::Parser;
use duckdb::Connection;
use eplscraper::config::{Config, Destination};
use glob::glob;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
struct Args {
    /// Export every table of the schema to Parquet files (default: data/export)
    #[arg(long, value_name = "DIR", num_args = 0..=1)]
    export_parquet: Option<Option<PathBuf>>,

    /// Load *.csv / *.parquet files from this directory into the destination
    #[arg(long, value_name = "DIR")]
    ingest: Option<PathBuf>,
}

fn main() -> Result<()> {
    fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let cfg = Config::from_env()?;

    match (&args.export_parquet, &args.ingest) {
        (Some(_), Some(_)) => bail!("choose one of --export-parquet or --ingest"),
        (Some(dir), None) => {
            let dir = dir.clone().unwrap_or_else(|| cfg.export_dir());
            export_parquet(&cfg, &dir)
        }
        (None, Some(dir)) => ingest(&cfg, dir),
        (None, None) => sync_to_motherduck(&cfg),
    }
}

/// Attach the local file inside a MotherDuck connection and mirror the schema.
fn sync_to_motherduck(cfg: &Config) -> Result<()> {
    let local = cfg.duckdb_path();
    if !local.exists() {
        bail!("no local database at {}", local.display());
    }
    let conn = open_motherduck(cfg)?;

    conn.execute_batch(&format!(
        "ATTACH '{}' AS local_db (READ_ONLY);",
        local.to_string_lossy().replace('\'', "''")
    ))
    .context("attaching local database")?;

    let tables = list_tables(&conn, Some("local_db"), &cfg.schema)?;
    if tables.is_empty() {
        println!("no tables under schema {} in {}", cfg.schema, local.display());
        return Ok(());
    }

    conn.execute_batch(&format!("CREATE SCHEMA IF NOT EXISTS \"{}\";", cfg.schema))?;
    for table in &tables {
        let src = format!("local_db.\"{}\".\"{}\"", cfg.schema, table);
        let dst = format!("\"{}\".\"{}\"", cfg.schema, table);

        conn.execute_batch(&format!("CREATE OR REPLACE TABLE {dst} AS SELECT * FROM {src};"))
            .with_context(|| format!("uploading {table}"))?;

        let local_rows: i64 =
            conn.query_row(&format!("SELECT COUNT(*) FROM {src};"), [], |r| r.get(0))?;
        let uploaded_rows: i64 =
            conn.query_row(&format!("SELECT COUNT(*) FROM {dst};"), [], |r| r.get(0))?;
        if local_rows != uploaded_rows {
            bail!("row count mismatch for {table}: {local_rows} local vs {uploaded_rows} uploaded");
        }
        println!("✅ {}.{} → MotherDuck ({} rows)", cfg.schema, table, uploaded_rows);
    }
    Ok(())
}

/// Copy each table of the schema out of the local database as Parquet.
fn export_parquet(cfg: &Config, dir: &Path) -> Result<()> {
    let local = cfg.duckdb_path();
    if !local.exists() {
        bail!("no local database at {}", local.display());
    }
    fs::create_dir_all(dir)?;

    let conn = Connection::open(&local)
        .with_context(|| format!("opening {}", local.display()))?;
    let tables = list_tables(&conn, None, &cfg.schema)?;
    if tables.is_empty() {
        println!("no tables under schema {} in {}", cfg.schema, local.display());
        return Ok(());
    }

    for table in &tables {
        let out = dir.join(format!("{table}.parquet"));
        conn.execute_batch(&format!(
            "COPY \"{}\".\"{}\" TO '{}' (FORMAT PARQUET, COMPRESSION ZSTD);",
            cfg.schema,
            table,
            out.to_string_lossy().replace('\'', "''")
        ))
        .with_context(|| format!("exporting {table}"))?;
        println!("✅ exported {}.{} → {}", cfg.schema, table, out.display());
    }
    Ok(())
}

/// Load flat files into the configured destination database, one table per
/// file, named after the file stem.
fn ingest(cfg: &Config, dir: &Path) -> Result<()> {
    let conn = match cfg.destination {
        Destination::MotherDuck => open_motherduck(cfg)?,
        _ => {
            let path = cfg.duckdb_path();
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            Connection::open(&path).with_context(|| format!("opening {}", path.display()))?
        }
    };
    conn.execute_batch(&format!("CREATE SCHEMA IF NOT EXISTS \"{}\";", cfg.schema))?;

    let mut loaded = 0usize;
    for (pattern, reader) in [("*.csv", "read_csv_auto"), ("*.parquet", "read_parquet")] {
        for entry in glob(&dir.join(pattern).to_string_lossy())? {
            let path = entry?;
            let table = path
                .file_stem()
                .and_then(|s| s.to_str())
                .with_context(|| format!("unusable file name {}", path.display()))?
                .replace('-', "_");

            conn.execute_batch(&format!(
                "CREATE OR REPLACE TABLE \"{}\".\"{}\" AS SELECT * FROM {}('{}');",
                cfg.schema,
                table,
                reader,
                path.to_string_lossy().replace('\'', "''")
            ))
            .with_context(|| format!("loading {}", path.display()))?;

            let rows: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM \"{}\".\"{}\";", cfg.schema, table),
                [],
                |r| r.get(0),
            )?;
            println!("✅ {} → {}.{} ({} rows)", path.display(), cfg.schema, table, rows);
            loaded += 1;
        }
    }
    if loaded == 0 {
        bail!("no .csv or .parquet files found in {}", dir.display());
    }
    Ok(())
}

fn open_motherduck(cfg: &Config) -> Result<Connection> {
    let token = cfg
        .motherduck_token
        .as_deref()
        .context("MOTHERDUCK_TOKEN must be set for MotherDuck operations")?;
    Connection::open(format!("md:{}?motherduck_token={}", cfg.database, token))
        .with_context(|| format!("connecting to md:{}", cfg.database))
}

/// Table names of one schema, optionally restricted to an attached catalog.
fn list_tables(conn: &Connection, catalog: Option<&str>, schema: &str) -> Result<Vec<String>> {
    let (sql, names) = match catalog {
        Some(cat) => (
            "SELECT table_name FROM information_schema.tables \
             WHERE table_catalog = ? AND table_schema = ? ORDER BY table_name;",
            vec![cat.to_string(), schema.to_string()],
        ),
        None => (
            "SELECT table_name FROM information_schema.tables \
             WHERE table_schema = ? ORDER BY table_name;",
            vec![schema.to_string()],
        ),
    };

    let mut stmt = conn.prepare(sql)?;
    let params: Vec<&dyn duckdb::ToSql> = names.iter().map(|n| n as &dyn duckdb::ToSql).collect();
    let tables = stmt
        .query_map(params.as_slice(), |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(tables)
}
