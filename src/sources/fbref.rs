//! Match-log scraper for the HTML-table stats site (fbref.com).
//!
//! Every stat category lives on its own page as a plain `<table>` with a
//! multi-row header. Categories are fetched sequentially, normalized through
//! [`crate::merge`], and joined onto the schedule table so each team-season
//! comes back as one row-per-fixture table.

use std::time::Duration;

use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::config::Config;
use crate::error::{Result, ScrapeError};
use crate::fetch::PoliteClient;
use crate::merge;
use crate::sources::{ParseResult, SeasonSource};
use crate::table::Table;
use crate::teams::Team;

pub const FBREF_BASE: &str = "https://fbref.com";
pub const DEFAULT_RATE_LIMIT: Duration = Duration::from_secs(5);
pub const DEFAULT_SEASON: &str = "2025-2026";

/// The schedule category every other category is merged onto.
pub const SCHEDULE_CATEGORY: &str = "scores_fixtures";

/// Stat category name → URL fragment. Adding a category is a data change.
pub const STAT_CATEGORIES: &[(&str, &str)] = &[
    ("scores_fixtures", "schedule"),
    ("shooting", "shooting"),
    ("goalkeeping", "keeper"),
    ("passing", "passing"),
    ("pass_types", "passing_types"),
    ("goal_shot_creation", "gca"),
    ("defensive_actions", "defense"),
    ("possession", "possession"),
    ("miscellaneous", "misc"),
];

pub struct FbrefScraper {
    client: PoliteClient,
    base_url: String,
}

impl FbrefScraper {
    pub fn new(cfg: &Config) -> Result<Self> {
        Ok(Self {
            client: PoliteClient::from_config(cfg, DEFAULT_RATE_LIMIT)?,
            base_url: FBREF_BASE.to_string(),
        })
    }

    /// Point the scraper at a different host (tests, mirrors).
    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base_url = base.into();
        self
    }

    fn category_url(&self, team: &Team, season: &str, category: &str, fragment: &str) -> String {
        if category == SCHEDULE_CATEGORY {
            format!(
                "{}/en/squads/{}/{}/matchlogs/all_comps/{}/{}-Scores-and-Fixtures-All-Competitions",
                self.base_url, team.fbref_id, season, fragment, team.fbref_slug
            )
        } else {
            format!(
                "{}/en/squads/{}/{}/matchlogs/all_comps/{}/{}-Match-Logs-All-Competitions",
                self.base_url, team.fbref_id, season, fragment, team.fbref_slug
            )
        }
    }

    /// Fetch and parse one stat category page for a team-season.
    pub async fn scrape_category(
        &self,
        team: &Team,
        season: &str,
        category: &str,
    ) -> Result<ParseResult> {
        let fragment = STAT_CATEGORIES
            .iter()
            .find(|(name, _)| *name == category)
            .map(|(_, fragment)| *fragment)
            .ok_or_else(|| {
                ScrapeError::Configuration(format!("unknown stat category {category:?}"))
            })?;

        let url = self.category_url(team, season, category, fragment);
        let html = self.client.fetch_text(&url).await?;
        Ok(parse_category_page(&html, category))
    }
}

impl SeasonSource for FbrefScraper {
    fn label(&self) -> &'static str {
        "fbref"
    }

    fn default_season(&self) -> &'static str {
        DEFAULT_SEASON
    }

    fn between_team_pause(&self) -> Duration {
        self.client.rate_limit()
    }

    #[instrument(level = "info", skip(self, team), fields(team = team.name, season = season))]
    async fn scrape_team_season(&self, team: &Team, season: &str) -> Result<Table> {
        let mut tables: Vec<(String, Table)> = Vec::new();

        for &(category, _) in STAT_CATEGORIES {
            match self.scrape_category(team, season, category).await {
                Ok(ParseResult::Found(table)) => {
                    info!(category, rows = table.len(), "scraped category");
                    tables.push((category.to_string(), table));
                }
                Ok(ParseResult::NotFound) => {
                    warn!(category, "no stats table on page; skipping category");
                }
                Ok(ParseResult::Failed(reason)) => {
                    warn!(category, %reason, "could not decode category page; skipping");
                }
                Err(e @ ScrapeError::Forbidden { .. }) => return Err(e),
                Err(e) => {
                    warn!(category, error = %e, "category fetch failed; skipping");
                }
            }
        }

        if tables.is_empty() {
            return Ok(Table::empty());
        }

        let merged = merge::merge_categories(tables, SCHEDULE_CATEGORY);
        Ok(merged
            .with_constant_column("team", Value::String(merge::display_name(team.fbref_slug)))
            .with_constant_column("team_id", Value::String(team.fbref_id.to_string()))
            .with_constant_column("season", Value::String(season.to_string())))
    }
}

/// Parse one category page: first table, flattened headers, normalized
/// columns, repeated-header and dateless rows dropped.
pub(crate) fn parse_category_page(html: &str, category: &str) -> ParseResult {
    let document = Html::parse_document(html);
    let table_sel = Selector::parse("table").unwrap();

    let Some(table_el) = document.select(&table_sel).next() else {
        return ParseResult::NotFound;
    };

    let header_grid = expand_header_grid(table_el);
    if header_grid.iter().all(|row| row.is_empty()) {
        return ParseResult::Failed("table has no header rows".to_string());
    }

    let columns = merge::flatten_header_rows(&header_grid);
    let mut table = Table::new(columns);
    for row in extract_body_rows(table_el) {
        table.push_row(row);
    }

    merge::normalize_columns(&mut table, category);
    drop_non_fixture_rows(&mut table);
    ParseResult::Found(table)
}

/// Expand the `<thead>` into a rectangular grid, honoring colspan/rowspan.
fn expand_header_grid(table: ElementRef) -> Vec<Vec<String>> {
    let row_sel = Selector::parse("thead tr").unwrap();
    let cell_sel = Selector::parse("th, td").unwrap();

    let mut grid: Vec<Vec<String>> = Vec::new();
    // Per column: text plus the number of later rows it still spans.
    let mut carry: Vec<(String, usize)> = Vec::new();

    for tr in table.select(&row_sel) {
        let mut row: Vec<String> = Vec::new();
        let mut cells = tr.select(&cell_sel);
        let mut pending = cells.next();
        let mut col = 0usize;

        loop {
            if col < carry.len() && carry[col].1 > 0 {
                row.push(carry[col].0.clone());
                carry[col].1 -= 1;
                col += 1;
                continue;
            }
            match pending.take() {
                Some(cell) => {
                    let text = element_text(cell);
                    let colspan = span_attr(cell, "colspan");
                    let rowspan = span_attr(cell, "rowspan");
                    for _ in 0..colspan {
                        if col >= carry.len() {
                            carry.resize(col + 1, (String::new(), 0));
                        }
                        if rowspan > 1 {
                            carry[col] = (text.clone(), rowspan - 1);
                        }
                        row.push(text.clone());
                        col += 1;
                    }
                    pending = cells.next();
                }
                None => {
                    // No explicit cell here; pad toward any spanning column.
                    let spans_remain = carry
                        .get(col..)
                        .map(|rest| rest.iter().any(|c| c.1 > 0))
                        .unwrap_or(false);
                    if !spans_remain {
                        break;
                    }
                    row.push(String::new());
                    col += 1;
                }
            }
        }
        grid.push(row);
    }
    grid
}

fn extract_body_rows(table: ElementRef) -> Vec<Vec<Value>> {
    let row_sel = Selector::parse("tbody tr").unwrap();
    let cell_sel = Selector::parse("th, td").unwrap();

    table
        .select(&row_sel)
        .map(|tr| {
            tr.select(&cell_sel)
                .map(|cell| {
                    let text = element_text(cell);
                    if text.is_empty() {
                        Value::Null
                    } else {
                        Value::String(text)
                    }
                })
                .collect()
        })
        .collect()
}

/// Drop repeated in-body header rows and rows with no fixture date. The date
/// column is the first whose name contains `Date`.
fn drop_non_fixture_rows(table: &mut Table) {
    let Some(idx) = table.columns().iter().position(|c| c.contains("Date")) else {
        return;
    };
    table.retain_rows(|row| match row.get(idx) {
        Some(Value::String(s)) => !s.is_empty() && s != "Date",
        Some(Value::Null) | None => false,
        Some(_) => true,
    });
}

fn element_text(el: ElementRef) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn span_attr(el: ElementRef, name: &str) -> usize {
    el.value()
        .attr(name)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SHOOTING_PAGE: &str = r#"
        <html><body>
        <table id="matchlogs">
          <thead>
            <tr>
              <th colspan="3">For Nottingham Forest</th>
              <th colspan="2">Standard</th>
              <th colspan="2">Expected</th>
            </tr>
            <tr>
              <th>Date</th><th>Opponent</th><th>Result</th>
              <th>Gls</th><th>Sh</th>
              <th>xG</th><th>npxG</th>
            </tr>
          </thead>
          <tbody>
            <tr>
              <th>2025-08-16</th><td>Brentford</td><td>W</td>
              <td>2</td><td>12</td><td>1.8</td><td>1.8</td>
            </tr>
            <tr class="thead">
              <th>Date</th><td>Opponent</td><td>Result</td>
              <td>Gls</td><td>Sh</td><td>xG</td><td>npxG</td>
            </tr>
            <tr>
              <th>2025-08-23</th><td>Arsenal</td><td>L</td>
              <td>0</td><td>9</td><td>0.7</td><td>0.7</td>
            </tr>
            <tr>
              <th></th><td></td><td></td><td></td><td></td><td></td><td></td>
            </tr>
          </tbody>
        </table>
        </body></html>
    "#;

    fn team() -> Team {
        Team {
            name: "Nottingham Forest",
            league: "Premier League",
            fbref_id: "e4a775cb",
            fbref_slug: "Nottingham-Forest",
            understat_slug: "Nottingham_Forest",
        }
    }

    #[test]
    fn parses_multi_row_headers_and_filters_rows() {
        let ParseResult::Found(table) = parse_category_page(SHOOTING_PAGE, "shooting") else {
            panic!("expected a table");
        };

        assert_eq!(
            table.columns(),
            &[
                "Date",
                "Opponent",
                "Result",
                "shooting_Standard_Gls",
                "shooting_Standard_Sh",
                "shooting_Expected_xG",
                "shooting_Expected_npxG",
            ]
        );
        // The repeated header row and the empty spacer row are gone.
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(0, 0), Some(&json!("2025-08-16")));
        assert_eq!(table.cell(1, 4), Some(&json!("9")));
    }

    #[test]
    fn page_without_table_is_not_found() {
        assert!(matches!(
            parse_category_page("<html><body><p>503</p></body></html>", "shooting"),
            ParseResult::NotFound
        ));
    }

    #[test]
    fn rowspan_headers_expand_into_lower_rows() {
        let html = r#"
            <table>
              <thead>
                <tr><th rowspan="2">Date</th><th colspan="2">Standard</th></tr>
                <tr><th>Gls</th><th>Sh</th></tr>
              </thead>
              <tbody>
                <tr><td>2025-08-16</td><td>1</td><td>8</td></tr>
              </tbody>
            </table>
        "#;
        let ParseResult::Found(table) = parse_category_page(html, "shooting") else {
            panic!("expected a table");
        };
        // The spanned cell repeats on both levels; row filtering still finds
        // the date column by substring.
        assert_eq!(table.len(), 1);
        assert!(table.columns()[0].contains("Date"));
        assert_eq!(table.columns()[1], "shooting_Standard_Gls");
    }

    #[test]
    fn schedule_url_uses_fixtures_suffix() {
        let cfg = Config::default();
        let scraper = FbrefScraper::new(&cfg).unwrap();
        let url = scraper.category_url(&team(), "2025-2026", "scores_fixtures", "schedule");
        assert_eq!(
            url,
            "https://fbref.com/en/squads/e4a775cb/2025-2026/matchlogs/all_comps/schedule/Nottingham-Forest-Scores-and-Fixtures-All-Competitions"
        );

        let url = scraper.category_url(&team(), "2025-2026", "shooting", "shooting");
        assert_eq!(
            url,
            "https://fbref.com/en/squads/e4a775cb/2025-2026/matchlogs/all_comps/shooting/Nottingham-Forest-Match-Logs-All-Competitions"
        );
    }

    #[tokio::test]
    async fn unknown_category_is_a_configuration_error() {
        let cfg = Config::default();
        let scraper = FbrefScraper::new(&cfg).unwrap();
        let err = scraper
            .scrape_category(&team(), "2025-2026", "corner_kicks")
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Configuration(_)));
    }
}
