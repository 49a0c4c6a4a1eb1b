//! Scraper for the xG analytics site (understat.com).
//!
//! The site ships its data inside script tags as
//! `var datesData = JSON.parse('<escaped json>');`. The payload is
//! hex/unicode-escaped, so extraction is: find the variable, unescape the
//! string literal, decode the JSON, build a table from the records.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::config::Config;
use crate::error::Result;
use crate::fetch::PoliteClient;
use crate::sources::{ParseResult, SeasonSource};
use crate::table::Table;
use crate::teams::Team;

pub const UNDERSTAT_BASE: &str = "https://understat.com";
pub const DEFAULT_RATE_LIMIT: Duration = Duration::from_secs(3);
pub const DEFAULT_SEASON: &str = "2025";

pub const MATCHES_VAR: &str = "datesData";
pub const PLAYERS_VAR: &str = "playersData";

/// League page identifier for the Premier League.
pub const EPL: &str = "EPL";

/// Fields the site serializes as strings but are really numbers.
const NUMERIC_FIELDS: &[&str] = &[
    "xG", "xGA", "npxG", "npxGA", "deep", "deep_allowed", "scored", "missed", "xpts", "wins",
    "draws", "loses", "pts",
];

static JSON_VAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"var\s+(\w+)\s*=\s*JSON\.parse\('((?:\\.|[^'\\])*)'\)")
        .expect("embedded JSON variable regex")
});

pub struct UnderstatScraper {
    client: PoliteClient,
    base_url: String,
}

impl UnderstatScraper {
    pub fn new(cfg: &Config) -> Result<Self> {
        Ok(Self {
            client: PoliteClient::from_config(cfg, DEFAULT_RATE_LIMIT)?,
            base_url: UNDERSTAT_BASE.to_string(),
        })
    }

    /// Point the scraper at a different host (tests, mirrors).
    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base_url = base.into();
        self
    }

    fn team_url(&self, team: &Team, season: &str) -> String {
        format!("{}/team/{}/{}", self.base_url, team.understat_slug, season)
    }

    fn league_url(&self, league: &str, season: &str) -> String {
        format!("{}/league/{}/{}", self.base_url, league, season)
    }

    /// Per-player season stats from the team page (`playersData`).
    ///
    /// A page without a decodable payload is a parse error here; only the
    /// season pipeline downgrades that to an empty table.
    #[instrument(level = "info", skip(self, team), fields(team = team.name, season = season))]
    pub async fn scrape_team_players(&self, team: &Team, season: &str) -> Result<Table> {
        let url = self.team_url(team, season);
        let html = self.client.fetch_text(&url).await?;
        let table = parse_embedded_table(&html, PLAYERS_VAR).require(&url)?;
        info!(rows = table.len(), "extracted player data");
        Ok(table
            .with_constant_column("team", Value::String(team.name.to_string()))
            .with_constant_column("season", Value::String(season.to_string())))
    }

    /// Every match of a league season from the league page (`datesData`).
    #[instrument(level = "info", skip(self))]
    pub async fn scrape_league_matches(&self, league: &str, season: &str) -> Result<Table> {
        let url = self.league_url(league, season);
        let html = self.client.fetch_text(&url).await?;
        let table = parse_embedded_table(&html, MATCHES_VAR).require(&url)?;
        info!(rows = table.len(), "extracted league match data");
        Ok(table
            .with_constant_column("league", Value::String(league.to_string()))
            .with_constant_column("season", Value::String(season.to_string())))
    }
}

impl SeasonSource for UnderstatScraper {
    fn label(&self) -> &'static str {
        "understat"
    }

    fn default_season(&self) -> &'static str {
        DEFAULT_SEASON
    }

    fn between_team_pause(&self) -> Duration {
        self.client.rate_limit()
    }

    #[instrument(level = "info", skip(self, team), fields(team = team.name, season = season))]
    async fn scrape_team_season(&self, team: &Team, season: &str) -> Result<Table> {
        let url = self.team_url(team, season);
        let html = self.client.fetch_text(&url).await?;
        match parse_embedded_table(&html, MATCHES_VAR) {
            ParseResult::Found(mut table) => {
                coerce_numeric_fields(&mut table);
                info!(rows = table.len(), "extracted match data");
                Ok(table
                    .with_constant_column("team", Value::String(team.name.to_string()))
                    .with_constant_column("season", Value::String(season.to_string())))
            }
            ParseResult::NotFound => {
                warn!(variable = MATCHES_VAR, "embedded variable not found on page");
                Ok(Table::empty())
            }
            ParseResult::Failed(reason) => {
                warn!(variable = MATCHES_VAR, %reason, "failed to decode embedded data");
                Ok(Table::empty())
            }
        }
    }
}

/// Locate `var <name> = JSON.parse('…')` in any script tag and build a table
/// from the decoded records.
pub(crate) fn parse_embedded_table(html: &str, name: &str) -> ParseResult {
    let Some(payload) = extract_payload(html, name) else {
        return ParseResult::NotFound;
    };
    let unescaped = match unescape_js(&payload) {
        Ok(s) => s,
        Err(reason) => return ParseResult::Failed(reason),
    };
    match serde_json::from_str::<Value>(&unescaped) {
        Ok(Value::Array(records)) => ParseResult::Found(Table::from_records(&records)),
        Ok(_) => ParseResult::Failed(format!("variable {name} is not a JSON array")),
        Err(e) => ParseResult::Failed(format!("JSON decode failed: {e}")),
    }
}

fn extract_payload(html: &str, name: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let script_sel = Selector::parse("script").unwrap();

    for script in document.select(&script_sel) {
        let body: String = script.text().collect();
        for caps in JSON_VAR_RE.captures_iter(&body) {
            if &caps[1] == name {
                return Some(caps[2].to_string());
            }
        }
    }
    None
}

/// Decode the JavaScript string literal: `\xNN`, `\uNNNN` (surrogate pairs
/// included), and the single-character escapes. Unknown escapes keep the
/// escaped character, matching how browsers treat them.
fn unescape_js(raw: &str) -> std::result::Result<String, String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            None => return Err("dangling escape at end of payload".to_string()),
            Some('x') => {
                let code = take_hex(&mut chars, 2)?;
                match char::from_u32(code) {
                    Some(ch) => out.push(ch),
                    None => return Err(format!("invalid \\x escape {code:#04x}")),
                }
            }
            Some('u') => {
                let code = take_hex(&mut chars, 4)?;
                if (0xD800..=0xDBFF).contains(&code) {
                    let mut rest = chars.clone();
                    if rest.next() == Some('\\') && rest.next() == Some('u') {
                        let low = take_hex(&mut rest, 4)?;
                        if (0xDC00..=0xDFFF).contains(&low) {
                            let combined = 0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00);
                            if let Some(ch) = char::from_u32(combined) {
                                out.push(ch);
                                chars = rest;
                                continue;
                            }
                        }
                    }
                    return Err(format!("unpaired surrogate \\u{code:04x}"));
                }
                match char::from_u32(code) {
                    Some(ch) => out.push(ch),
                    None => return Err(format!("invalid \\u escape \\u{code:04x}")),
                }
            }
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
        }
    }
    Ok(out)
}

fn take_hex(chars: &mut std::str::Chars<'_>, n: usize) -> std::result::Result<u32, String> {
    let mut value = 0u32;
    for _ in 0..n {
        let c = chars
            .next()
            .ok_or_else(|| "truncated hex escape".to_string())?;
        let digit = c
            .to_digit(16)
            .ok_or_else(|| format!("invalid hex digit {c:?} in escape"))?;
        value = value * 16 + digit;
    }
    Ok(value)
}

/// Convert the known numeric columns to floats; anything unparseable is null.
fn coerce_numeric_fields(table: &mut Table) {
    for field in NUMERIC_FIELDS {
        table.map_column(field, |value| match value {
            Value::Number(n) => Value::Number(n),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            _ => Value::Null,
        });
    }
}
