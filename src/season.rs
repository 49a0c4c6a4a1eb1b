//! Season-level orchestration: run one source across a list of teams,
//! tolerate per-team failures, and stack the survivors into one table.

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::sources::SeasonSource;
use crate::table::Table;
use crate::teams::Team;

/// Terminal state of one team's scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamState {
    Merged,
    Failed,
}

/// What happened to a single team during a season run.
#[derive(Debug, Clone, Serialize)]
pub struct TeamOutcome {
    pub team: String,
    pub state: TeamState,
    pub rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TeamOutcome {
    fn merged(team: &Team, rows: usize) -> Self {
        Self {
            team: team.name.to_string(),
            state: TeamState::Merged,
            rows,
            error: None,
        }
    }

    fn failed(team: &Team, error: impl Into<String>) -> Self {
        Self {
            team: team.name.to_string(),
            state: TeamState::Failed,
            rows: 0,
            error: Some(error.into()),
        }
    }
}

/// Result of a full season run: the stacked table plus one outcome per team.
#[derive(Debug, Default)]
pub struct SeasonAggregate {
    pub table: Table,
    pub outcomes: Vec<TeamOutcome>,
}

impl SeasonAggregate {
    pub fn merged_teams(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.state == TeamState::Merged)
            .count()
    }

    pub fn failed_teams(&self) -> usize {
        self.outcomes.len() - self.merged_teams()
    }
}

/// Scrape every team in order and concatenate the merged tables.
///
/// Teams are processed strictly sequentially. A team that errors or yields no
/// rows is recorded as failed and skipped; the run continues. After each team
/// the source's between-team pause is honored on top of its own per-request
/// pacing, since a whole-squad run is the heaviest load we place on a site.
#[instrument(level = "info", skip(source, teams), fields(source = source.label(), season = season, teams = teams.len()))]
pub async fn scrape_season<S: SeasonSource>(
    source: &S,
    season: &str,
    teams: &[Team],
) -> SeasonAggregate {
    let mut merged: Vec<Table> = Vec::new();
    let mut outcomes: Vec<TeamOutcome> = Vec::new();

    for team in teams {
        match source.scrape_team_season(team, season).await {
            Ok(table) if table.is_empty() => {
                warn!(team = team.name, "no rows scraped, skipping team");
                outcomes.push(TeamOutcome::failed(team, "no rows scraped"));
            }
            Ok(table) => {
                info!(team = team.name, rows = table.len(), "team merged");
                outcomes.push(TeamOutcome::merged(team, table.len()));
                merged.push(table);
            }
            Err(e) => {
                warn!(team = team.name, error = %e, "team failed, skipping");
                outcomes.push(TeamOutcome::failed(team, e.to_string()));
            }
        }
        tokio::time::sleep(source.between_team_pause()).await;
    }

    let aggregate = SeasonAggregate {
        table: Table::concat(merged),
        outcomes,
    };
    info!(
        merged = aggregate.merged_teams(),
        failed = aggregate.failed_teams(),
        rows = aggregate.table.len(),
        "season run complete"
    );
    aggregate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, ScrapeError};
    use crate::teams;
    use serde_json::json;
    use std::time::Duration;

    fn init_test_logging() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_test_writer()
            .try_init();
    }

    struct StubSource;

    fn five_rows() -> Table {
        let records: Vec<serde_json::Value> = (0..5)
            .map(|i| json!({"Date": format!("2025-08-{:02}", 10 + i), "GF": "2"}))
            .collect();
        Table::from_records(&records)
    }

    impl SeasonSource for StubSource {
        fn label(&self) -> &'static str {
            "stub"
        }

        fn default_season(&self) -> &'static str {
            "2025"
        }

        fn between_team_pause(&self) -> Duration {
            Duration::ZERO
        }

        async fn scrape_team_season(&self, team: &Team, _season: &str) -> Result<Table> {
            match team.name {
                "Arsenal" => Ok(five_rows()),
                "Aston Villa" => Err(ScrapeError::Forbidden {
                    url: "https://example.com/aston-villa".to_string(),
                    attempts: 3,
                }),
                _ => Ok(Table::empty()),
            }
        }
    }

    fn team(name: &str) -> Team {
        *teams::find(name).unwrap()
    }

    #[tokio::test]
    async fn failed_teams_are_skipped_and_recorded() {
        init_test_logging();
        let squad = [team("Arsenal"), team("Aston Villa")];
        let aggregate = scrape_season(&StubSource, "2025", &squad).await;

        assert_eq!(aggregate.table.len(), 5);
        assert_eq!(aggregate.outcomes.len(), 2);
        assert_eq!(aggregate.merged_teams(), 1);
        assert_eq!(aggregate.failed_teams(), 1);

        let villa = &aggregate.outcomes[1];
        assert_eq!(villa.state, TeamState::Failed);
        assert!(villa.error.as_deref().unwrap().contains("403"));
    }

    #[tokio::test]
    async fn empty_team_counts_as_failed() {
        let squad = [team("Chelsea")];
        let aggregate = scrape_season(&StubSource, "2025", &squad).await;

        assert!(aggregate.table.is_empty());
        assert_eq!(aggregate.failed_teams(), 1);
        assert_eq!(
            aggregate.outcomes[0].error.as_deref(),
            Some("no rows scraped")
        );
    }

    #[test]
    fn outcome_serializes_without_null_error() {
        let outcome = TeamOutcome::merged(&team("Arsenal"), 38);
        let as_json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            as_json,
            json!({"team": "Arsenal", "state": "merged", "rows": 38})
        );

        let failed = TeamOutcome::failed(&team("Arsenal"), "boom");
        let as_json = serde_json::to_value(&failed).unwrap();
        assert_eq!(as_json["error"], json!("boom"));
    }
}
