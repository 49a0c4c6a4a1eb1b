use anyhow::{anyhow, bail, Result};
use clap::Parser;
use eplscraper::{
    config::{Config, FileFormat},
    season::scrape_season,
    sources::{FbrefScraper, SeasonSource, UnderstatScraper},
    store,
    teams::{self, Team},
};
use std::str::FromStr;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Clone, Copy)]
enum Source {
    Fbref,
    Understat,
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fbref" => Ok(Source::Fbref),
            "understat" => Ok(Source::Understat),
            other => Err(format!("unknown source {other:?} (expected fbref or understat)")),
        }
    }
}

/// Command-line args: which site, which season, optionally a single team.
#[derive(Parser, Debug)]
struct Args {
    /// Site to scrape (fbref or understat)
    #[arg(long, default_value = "fbref")]
    source: Source,

    /// Season token, e.g. 2025-2026 for fbref or 2025 for understat
    #[arg(long)]
    season: Option<String>,

    /// Restrict the run to one team (name or URL slug)
    #[arg(long)]
    team: Option<String>,

    /// Format of the local artifact (csv, json, or parquet)
    #[arg(long, default_value = "csv")]
    format: FileFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    std::panic::set_hook(Box::new(|info| {
        eprintln!("panic: {:?}", info);
    }));

    // ─── 2) configuration ────────────────────────────────────────────
    let args = Args::parse();
    let cfg = Config::from_env()?;
    cfg.validate()?;

    let squad: Vec<Team> = match &args.team {
        Some(query) => {
            let team = teams::find(query)
                .ok_or_else(|| anyhow!("unknown team {query:?}; see src/teams.rs for the list"))?;
            vec![*team]
        }
        None => teams::PREMIER_LEAGUE.to_vec(),
    };

    // ─── 3) scrape the season ────────────────────────────────────────
    let (label, season, aggregate) = match args.source {
        Source::Fbref => {
            let scraper = FbrefScraper::new(&cfg)?;
            run(&scraper, &args, &cfg, &squad).await
        }
        Source::Understat => {
            let scraper = UnderstatScraper::new(&cfg)?;
            run(&scraper, &args, &cfg, &squad).await
        }
    };

    let summary = serde_json::to_string(&aggregate.outcomes)?;
    info!(
        merged = aggregate.merged_teams(),
        failed = aggregate.failed_teams(),
        rows = aggregate.table.len(),
        %summary,
        "run summary"
    );
    if aggregate.table.is_empty() {
        bail!("no data scraped for any team");
    }

    // ─── 4) persist ──────────────────────────────────────────────────
    let name = format!("{label}_{season}").replace('-', "_");
    let table = aggregate.table;
    let format = args.format;
    let report = tokio::task::spawn_blocking(move || store::save(&table, &name, format, &cfg))
        .await??;

    info!(
        path = %report.local_path.display(),
        uploaded = ?report.uploaded_rows,
        "pipeline complete"
    );
    Ok(())
}

/// Resolve the season (flag, then env, then the source's default) and run it.
async fn run<S: SeasonSource>(
    source: &S,
    args: &Args,
    cfg: &Config,
    squad: &[Team],
) -> (&'static str, String, eplscraper::season::SeasonAggregate) {
    let season = args
        .season
        .clone()
        .or_else(|| cfg.season.clone())
        .unwrap_or_else(|| source.default_season().to_string());
    info!(
        source = source.label(),
        season = %season,
        teams = squad.len(),
        "starting scrape run"
    );
    let aggregate = scrape_season(source, &season, squad).await;
    (source.label(), season, aggregate)
}
