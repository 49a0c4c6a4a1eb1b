//! Static team reference data.
//!
//! Each source addresses teams by its own token: the stats aggregator by a
//! hex id plus a hyphenated slug, the analytics site by an underscored slug.
//! Keeping them side by side in one table means adding a club is a data
//! change only.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Team {
    /// Display name used for the `team` annotation column.
    pub name: &'static str,
    pub league: &'static str,
    /// Squad id in fbref.com URLs.
    pub fbref_id: &'static str,
    /// Hyphenated name segment in fbref.com URLs.
    pub fbref_slug: &'static str,
    /// Underscored name segment in understat.com URLs.
    pub understat_slug: &'static str,
}

pub const PREMIER_LEAGUE: &[Team] = &[
    Team { name: "Arsenal", league: "Premier League", fbref_id: "18bb7c10", fbref_slug: "Arsenal", understat_slug: "Arsenal" },
    Team { name: "Aston Villa", league: "Premier League", fbref_id: "8602292d", fbref_slug: "Aston-Villa", understat_slug: "Aston_Villa" },
    Team { name: "Bournemouth", league: "Premier League", fbref_id: "4ba7cbea", fbref_slug: "Bournemouth", understat_slug: "Bournemouth" },
    Team { name: "Brentford", league: "Premier League", fbref_id: "cd051869", fbref_slug: "Brentford", understat_slug: "Brentford" },
    Team { name: "Brighton and Hove Albion", league: "Premier League", fbref_id: "d07537b9", fbref_slug: "Brighton-and-Hove-Albion", understat_slug: "Brighton" },
    Team { name: "Chelsea", league: "Premier League", fbref_id: "cff3d9bb", fbref_slug: "Chelsea", understat_slug: "Chelsea" },
    Team { name: "Crystal Palace", league: "Premier League", fbref_id: "47c64c55", fbref_slug: "Crystal-Palace", understat_slug: "Crystal_Palace" },
    Team { name: "Everton", league: "Premier League", fbref_id: "d3fd31cc", fbref_slug: "Everton", understat_slug: "Everton" },
    Team { name: "Fulham", league: "Premier League", fbref_id: "fd962109", fbref_slug: "Fulham", understat_slug: "Fulham" },
    Team { name: "Ipswich Town", league: "Premier League", fbref_id: "b74092de", fbref_slug: "Ipswich-Town", understat_slug: "Ipswich" },
    Team { name: "Leicester City", league: "Premier League", fbref_id: "a2d435b3", fbref_slug: "Leicester-City", understat_slug: "Leicester" },
    Team { name: "Liverpool", league: "Premier League", fbref_id: "822bd0ba", fbref_slug: "Liverpool", understat_slug: "Liverpool" },
    Team { name: "Manchester City", league: "Premier League", fbref_id: "b8fd03ef", fbref_slug: "Manchester-City", understat_slug: "Manchester_City" },
    Team { name: "Manchester United", league: "Premier League", fbref_id: "19538871", fbref_slug: "Manchester-United", understat_slug: "Manchester_United" },
    Team { name: "Newcastle United", league: "Premier League", fbref_id: "b2b47a98", fbref_slug: "Newcastle-United", understat_slug: "Newcastle_United" },
    Team { name: "Nottingham Forest", league: "Premier League", fbref_id: "e4a775cb", fbref_slug: "Nottingham-Forest", understat_slug: "Nottingham_Forest" },
    Team { name: "Southampton", league: "Premier League", fbref_id: "33c895d4", fbref_slug: "Southampton", understat_slug: "Southampton" },
    Team { name: "Tottenham Hotspur", league: "Premier League", fbref_id: "361ca564", fbref_slug: "Tottenham-Hotspur", understat_slug: "Tottenham" },
    Team { name: "West Ham United", league: "Premier League", fbref_id: "7c21e445", fbref_slug: "West-Ham-United", understat_slug: "West_Ham" },
    Team { name: "Wolverhampton Wanderers", league: "Premier League", fbref_id: "8cec06e1", fbref_slug: "Wolverhampton-Wanderers", understat_slug: "Wolverhampton_Wanderers" },
];

/// Find a team by name or either slug, case-insensitively; falls back to the
/// first display-name substring match so CLI filters like "forest" work.
pub fn find(query: &str) -> Option<&'static Team> {
    let needle = query.trim().to_ascii_lowercase();
    if needle.is_empty() {
        return None;
    }
    PREMIER_LEAGUE
        .iter()
        .find(|t| {
            t.name.eq_ignore_ascii_case(&needle)
                || t.fbref_slug.eq_ignore_ascii_case(&needle)
                || t.understat_slug.eq_ignore_ascii_case(&needle)
        })
        .or_else(|| {
            PREMIER_LEAGUE
                .iter()
                .find(|t| t.name.to_ascii_lowercase().contains(&needle))
        })
}
