//! Football statistics scraping pipeline: polite HTTP fetching, scrapers for
//! the two stat sites, column-oriented table merging, and persistence to flat
//! files, embedded DuckDB, or MotherDuck.

pub mod config;
pub mod error;
pub mod fetch;
pub mod merge;
pub mod season;
pub mod sources;
pub mod store;
pub mod table;
pub mod teams;

pub use error::{Result, ScrapeError};
pub use table::Table;
