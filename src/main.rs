use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use team_roster_scraper::batch::{self, BatchSummary};
use team_roster_scraper::config::ScrapeConfig;
use team_roster_scraper::http_client::HttpFetcher;
use team_roster_scraper::league::{self, LEAGUES};
use team_roster_scraper::logging::init_logging;
use team_roster_scraper::persist::{SqliteStore, TeamStore};

const USAGE: &str = "usage: team_roster_scraper <command> [--db PATH] [--league NAME]

commands:
  league <ordinal>   crawl a league page and store its teams
  rosters            crawl the roster of every stored team
  details            crawl base_info for every stored team
  all <ordinal>      league, then rosters for that league
  leagues            list known leagues";

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    init_logging()?;

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let positional = positional_args(&args);
    let Some(command) = positional.first().copied() else {
        println!("{USAGE}");
        return Ok(());
    };

    if command == "leagues" {
        for l in LEAGUES {
            println!("{:>4}  {}  season={}  {}", l.ordinal, l.name, l.season_id, l.path);
        }
        return Ok(());
    }

    let mut cfg = ScrapeConfig::from_env();
    if let Some(path) = flag_value(&args, "--db") {
        cfg.db_path = Some(PathBuf::from(path));
    }
    let db_path = cfg.db_path.clone().context("unable to resolve sqlite path")?;
    let mut store = SqliteStore::open(&db_path)?;
    let fetcher = HttpFetcher::new(&cfg)?;
    let league_filter = flag_value(&args, "--league");

    match command {
        "league" => {
            let target = league_arg(&positional)?;
            let summary = batch::crawl_league(&fetcher, &mut store, &cfg, target)?;
            print_summary(&format!("league {}", target.name), &summary);
        }
        "rosters" => {
            let summary =
                batch::crawl_rosters(&fetcher, &mut store, &cfg, league_filter.as_deref())?;
            print_summary("rosters", &summary);
        }
        "details" => {
            let summary =
                batch::crawl_team_details(&fetcher, &mut store, &cfg, league_filter.as_deref())?;
            print_summary("details", &summary);
        }
        "all" => {
            let target = league_arg(&positional)?;
            let teams = batch::crawl_league(&fetcher, &mut store, &cfg, target)?;
            print_summary(&format!("league {}", target.name), &teams);
            let rosters = batch::crawl_rosters(&fetcher, &mut store, &cfg, Some(target.name))?;
            print_summary("rosters", &rosters);
        }
        other => return Err(anyhow!("unknown command `{other}`\n\n{USAGE}")),
    }

    println!("DB: {} ({} teams)", db_path.display(), store.count_teams()?);
    Ok(())
}

/// Arguments that are neither flags nor the value of a flag.
fn positional_args(args: &[String]) -> Vec<&str> {
    args.iter()
        .enumerate()
        .filter(|(idx, arg)| {
            let after_flag = *idx > 0 && matches!(args[idx - 1].as_str(), "--db" | "--league");
            !arg.starts_with("--") && !after_flag
        })
        .map(|(_, arg)| arg.as_str())
        .collect()
}

fn league_arg(positional: &[&str]) -> Result<&'static league::League> {
    let raw = positional.get(1).context("missing league ordinal")?;
    let ordinal = raw
        .parse::<u32>()
        .with_context(|| format!("invalid league ordinal `{raw}`"))?;
    league::lookup(ordinal).ok_or_else(|| anyhow!("unknown league ordinal {ordinal}"))
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == flag {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(next.trim().to_string());
            }
        }
    }
    None
}

fn print_summary(label: &str, summary: &BatchSummary) {
    println!(
        "{label}: {}/{} succeeded, {} failed, {} records written",
        summary.succeeded, summary.total, summary.failed, summary.records_written
    );
    if summary.inserted + summary.updated > 0 {
        println!("  inserted={} updated={}", summary.inserted, summary.updated);
    }
    if !summary.errors.is_empty() {
        println!("  errors: {}", summary.errors.len());
        for err in summary.errors.iter().take(6) {
            println!("   - {err}");
        }
    }
}
