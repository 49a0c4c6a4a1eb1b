//! Runtime configuration, loaded once at startup.
//!
//! Everything the pipeline needs is resolved here into one explicit [`Config`]
//! that gets passed down; nothing reads the environment mid-run.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, ScrapeError};

/// Where scraped tables end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// Flat files under the data directory.
    Local,
    /// Embedded DuckDB database file.
    DuckDb,
    /// Hosted MotherDuck database (requires a token).
    MotherDuck,
}

impl FromStr for Destination {
    type Err = ScrapeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Destination::Local),
            "duckdb" => Ok(Destination::DuckDb),
            "motherduck" => Ok(Destination::MotherDuck),
            other => Err(ScrapeError::Configuration(format!(
                "DATA_DESTINATION must be local, duckdb, or motherduck (got {other:?})"
            ))),
        }
    }
}

/// On-disk format for local artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Json,
    Parquet,
}

impl FileFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Json => "json",
            FileFormat::Parquet => "parquet",
        }
    }
}

impl FromStr for FileFormat {
    type Err = ScrapeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(FileFormat::Csv),
            "json" => Ok(FileFormat::Json),
            "parquet" => Ok(FileFormat::Parquet),
            other => Err(ScrapeError::Configuration(format!(
                "file format must be csv, json, or parquet (got {other:?})"
            ))),
        }
    }
}

/// What to do when the destination table already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    /// Drop and recreate the table.
    Replace,
    /// Add rows to the existing table.
    Append,
    /// Error out if the table exists.
    Fail,
}

impl FromStr for WritePolicy {
    type Err = ScrapeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replace" => Ok(WritePolicy::Replace),
            "append" => Ok(WritePolicy::Append),
            "fail" => Ok(WritePolicy::Fail),
            other => Err(ScrapeError::Configuration(format!(
                "IF_EXISTS must be replace, append, or fail (got {other:?})"
            ))),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub destination: Destination,
    pub database: String,
    pub schema: String,
    pub motherduck_token: Option<String>,
    pub data_dir: PathBuf,
    /// Minimum delay before every request; `None` keeps each source's default.
    pub rate_limit: Option<Duration>,
    pub max_retries: usize,
    pub verify_tls: bool,
    /// Season token; `None` keeps each source's default.
    pub season: Option<String>,
    pub write_policy: WritePolicy,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenvy::dotenv();

        Ok(Self {
            destination: env::var("DATA_DESTINATION")
                .unwrap_or_else(|_| "local".to_string())
                .parse()?,
            database: env::var("DATABASE_NAME").unwrap_or_else(|_| "football_analytics".to_string()),
            schema: env::var("SCHEMA_NAME").unwrap_or_else(|_| "raw".to_string()),
            motherduck_token: env::var("MOTHERDUCK_TOKEN").ok().filter(|t| !t.is_empty()),
            data_dir: PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string())),
            rate_limit: parse_rate_limit(env::var("SCRAPER_RATE_LIMIT").ok())?,
            max_retries: parse_max_retries(env::var("SCRAPER_MAX_RETRIES").ok())?,
            verify_tls: parse_bool("SCRAPER_VERIFY_TLS", env::var("SCRAPER_VERIFY_TLS").ok(), false)?,
            season: env::var("SEASON").ok().filter(|s| !s.is_empty()),
            write_policy: env::var("IF_EXISTS")
                .unwrap_or_else(|_| "replace".to_string())
                .parse()?,
        })
    }

    /// Check cross-field requirements before any network or disk I/O.
    pub fn validate(&self) -> Result<()> {
        if self.destination == Destination::MotherDuck && self.motherduck_token.is_none() {
            return Err(ScrapeError::Configuration(
                "MOTHERDUCK_TOKEN must be set when DATA_DESTINATION is motherduck".to_string(),
            ));
        }
        Ok(())
    }

    /// Directory for raw file artifacts.
    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    /// Path of the embedded DuckDB database file.
    pub fn duckdb_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.duckdb", self.database))
    }

    /// Directory for Parquet exports.
    pub fn export_dir(&self) -> PathBuf {
        self.data_dir.join("export")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            destination: Destination::Local,
            database: "football_analytics".to_string(),
            schema: "raw".to_string(),
            motherduck_token: None,
            data_dir: PathBuf::from("data"),
            rate_limit: None,
            max_retries: 3,
            verify_tls: false,
            season: None,
            write_policy: WritePolicy::Replace,
        }
    }
}

fn parse_rate_limit(raw: Option<String>) -> Result<Option<Duration>> {
    match raw {
        None => Ok(None),
        Some(s) => {
            let secs: f64 = s.trim().parse().map_err(|_| {
                ScrapeError::Configuration(format!(
                    "SCRAPER_RATE_LIMIT must be a number of seconds (got {s:?})"
                ))
            })?;
            if !secs.is_finite() || secs < 0.0 {
                return Err(ScrapeError::Configuration(format!(
                    "SCRAPER_RATE_LIMIT must be a non-negative number of seconds (got {s:?})"
                )));
            }
            let limit = Duration::try_from_secs_f64(secs).map_err(|_| {
                ScrapeError::Configuration(format!("SCRAPER_RATE_LIMIT is out of range (got {s:?})"))
            })?;
            Ok(Some(limit))
        }
    }
}

fn parse_max_retries(raw: Option<String>) -> Result<usize> {
    match raw {
        None => Ok(3),
        Some(s) => {
            let n: usize = s.trim().parse().map_err(|_| {
                ScrapeError::Configuration(format!(
                    "SCRAPER_MAX_RETRIES must be a positive integer (got {s:?})"
                ))
            })?;
            if n == 0 {
                return Err(ScrapeError::Configuration(
                    "SCRAPER_MAX_RETRIES must be at least 1".to_string(),
                ));
            }
            Ok(n)
        }
    }
}

fn parse_bool(key: &str, raw: Option<String>, default: bool) -> Result<bool> {
    match raw {
        None => Ok(default),
        Some(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            other => Err(ScrapeError::Configuration(format!(
                "{key} must be a boolean (got {other:?})"
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn motherduck_without_token_fails_validation() {
        let cfg = Config {
            destination: Destination::MotherDuck,
            motherduck_token: None,
            ..Config::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, ScrapeError::Configuration(_)));
        assert!(err.to_string().contains("MOTHERDUCK_TOKEN"));
    }

    #[test]
    fn motherduck_with_token_validates() {
        let cfg = Config {
            destination: Destination::MotherDuck,
            motherduck_token: Some("md_token".to_string()),
            ..Config::default()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn destination_parses_case_insensitively() {
        assert_eq!(
            "MotherDuck".parse::<Destination>().unwrap(),
            Destination::MotherDuck
        );
        assert_eq!("local".parse::<Destination>().unwrap(), Destination::Local);
        assert!("s3".parse::<Destination>().is_err());
    }

    #[test]
    fn write_policy_parses() {
        assert_eq!("append".parse::<WritePolicy>().unwrap(), WritePolicy::Append);
        assert_eq!("FAIL".parse::<WritePolicy>().unwrap(), WritePolicy::Fail);
        assert!("upsert".parse::<WritePolicy>().is_err());
    }

    #[test]
    fn rate_limit_parsing() {
        assert_eq!(parse_rate_limit(None).unwrap(), None);
        assert_eq!(
            parse_rate_limit(Some("2.5".to_string())).unwrap(),
            Some(Duration::from_millis(2500))
        );
        assert!(parse_rate_limit(Some("-1".to_string())).is_err());
        assert!(parse_rate_limit(Some("fast".to_string())).is_err());
        // Seconds past Duration's range must error out, not abort the process.
        let err = parse_rate_limit(Some("1e20".to_string())).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn data_layout_hangs_off_the_data_dir() {
        let cfg = Config::default();
        assert_eq!(cfg.duckdb_path(), PathBuf::from("data/football_analytics.duckdb"));
        assert_eq!(cfg.raw_dir(), PathBuf::from("data/raw"));
        assert_eq!(cfg.export_dir(), PathBuf::from("data/export"));
    }
}
