//! The two stats-site scrapers and the capability trait they share.

pub mod fbref;
pub mod understat;

pub use fbref::FbrefScraper;
pub use understat::UnderstatScraper;

use std::future::Future;
use std::time::Duration;

use crate::error::Result;
use crate::table::Table;
use crate::teams::Team;

/// Outcome of parsing one fetched page.
///
/// Absence of a payload is an expected state, not an error: a team may simply
/// have no table for a category. Only a payload that exists but cannot be
/// decoded is a failure, and even that stays scoped to the one page.
#[derive(Debug)]
pub enum ParseResult {
    /// The expected payload was present and decoded into a table.
    Found(Table),
    /// The page has no payload of the expected shape.
    NotFound,
    /// The payload was present but could not be decoded.
    Failed(String),
}

impl ParseResult {
    /// Turn anything short of a decoded table into a parse error.
    pub fn require(self, context: &str) -> crate::error::Result<Table> {
        use crate::error::ScrapeError;
        match self {
            ParseResult::Found(table) => Ok(table),
            ParseResult::NotFound => Err(ScrapeError::Parse {
                context: context.to_string(),
                reason: "expected payload not found on page".to_string(),
            }),
            ParseResult::Failed(reason) => Err(ScrapeError::Parse {
                context: context.to_string(),
                reason,
            }),
        }
    }
}

/// A scraper that can produce one merged table per team per season.
///
/// The orchestrator in [`crate::season`] is generic over this, so both the
/// HTML-table source and the embedded-JSON source (and stubs in tests) drive
/// the same sequential pipeline.
pub trait SeasonSource {
    /// Short name used in logs and artifact filenames.
    fn label(&self) -> &'static str;

    /// Season token used when none is configured.
    fn default_season(&self) -> &'static str;

    /// Extra pause inserted after each team in a season run.
    fn between_team_pause(&self) -> Duration;

    /// Scrape one team's season into a single table.
    fn scrape_team_season(
        &self,
        team: &Team,
        season: &str,
    ) -> impl Future<Output = Result<Table>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScrapeError;

    #[test]
    fn require_maps_missing_and_broken_payloads_to_parse_errors() {
        assert!(ParseResult::Found(Table::empty()).require("page").is_ok());

        let err = ParseResult::NotFound.require("team page").unwrap_err();
        assert!(matches!(err, ScrapeError::Parse { .. }));
        assert!(err.to_string().contains("team page"));

        let err = ParseResult::Failed("bad escape".to_string())
            .require("team page")
            .unwrap_err();
        assert!(err.to_string().contains("bad escape"));
    }
}
