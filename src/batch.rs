use std::thread;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::ScrapeConfig;
use crate::http_client::Fetcher;
use crate::league::{League, league_url, team_url};
use crate::model::TeamRecord;
use crate::observe::{DumpObserver, ExtractContext};
use crate::persist::{TeamStore, UpsertOutcome};
use crate::pipeline::{extract_base_info, extract_team_page, extract_teams};

const PROGRESS_EVERY: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub records_written: usize,
    pub inserted: usize,
    pub updated: usize,
    pub errors: Vec<String>,
}

impl BatchSummary {
    fn fail(&mut self, item: &str, err: impl std::fmt::Display) {
        self.failed += 1;
        warn!(item, error = %err, "batch item failed");
        self.errors.push(format!("{item}: {err}"));
    }

    fn log_progress(&self, label: &str) {
        let done = self.succeeded + self.failed;
        if done % PROGRESS_EVERY == 0 || done == self.total {
            info!(
                batch = label,
                done,
                total = self.total,
                succeeded = self.succeeded,
                failed = self.failed,
                "batch progress"
            );
        }
    }

    fn log_final(&self, label: &str) {
        info!(
            batch = label,
            total = self.total,
            succeeded = self.succeeded,
            failed = self.failed,
            records = self.records_written,
            "batch finished"
        );
    }
}

/// Fresh extraction context for `url`, dumping to the configured directory.
pub fn context_for(cfg: &ScrapeConfig, url: &str) -> ExtractContext {
    let Some(dir) = cfg.debug_dump_dir.as_ref() else {
        return ExtractContext::new(url);
    };
    match DumpObserver::new(dir) {
        Ok(observer) => ExtractContext::with_observer(url, Box::new(observer)),
        Err(err) => {
            warn!(error = %err, "debug dumps disabled");
            ExtractContext::new(url)
        }
    }
}

/// League page to stored teams.
///
/// An unreachable league page is reported as the batch's single failed item.
pub fn crawl_league(
    fetcher: &dyn Fetcher,
    store: &mut dyn TeamStore,
    cfg: &ScrapeConfig,
    league: &League,
) -> Result<BatchSummary> {
    let url = league_url(&cfg.base_url, league);
    let doc = match fetcher
        .fetch(&url)
        .with_context(|| format!("fetch league page {url}"))
    {
        Ok(doc) => doc,
        Err(err) => {
            let mut summary = BatchSummary {
                total: 1,
                ..BatchSummary::default()
            };
            summary.fail(league.name, format!("{err:#}"));
            summary.log_final("league");
            return Ok(summary);
        }
    };
    let mut ctx = context_for(cfg, &url);
    let teams = extract_teams(&doc, Some(league), &mut ctx);

    let mut summary = BatchSummary {
        total: teams.len(),
        ..BatchSummary::default()
    };
    for team in &teams {
        match store.upsert_team(team) {
            Ok(outcome) => {
                summary.succeeded += 1;
                summary.records_written += 1;
                match outcome {
                    UpsertOutcome::Inserted => summary.inserted += 1,
                    UpsertOutcome::Updated => summary.updated += 1,
                }
            }
            Err(err) => summary.fail(&team.team_name, format!("{err:#}")),
        }
    }
    if teams.is_empty() {
        warn!(league = league.name, url = %url, "no teams extracted from league page");
    }
    summary.log_final("league");
    Ok(summary)
}

/// Every stored team (optionally one league's) to a stored roster.
pub fn crawl_rosters(
    fetcher: &dyn Fetcher,
    store: &mut dyn TeamStore,
    cfg: &ScrapeConfig,
    league: Option<&str>,
) -> Result<BatchSummary> {
    let teams = capped(store.load_teams(league)?, cfg);
    let mut summary = BatchSummary {
        total: teams.len(),
        ..BatchSummary::default()
    };

    for (i, team) in teams.iter().enumerate() {
        pause(cfg, i);
        let url = team_url(&cfg.base_url, &team.team_id);
        match roster_for_team(fetcher, store, cfg, team, &url) {
            Ok(written) => {
                summary.succeeded += 1;
                summary.records_written += written;
            }
            Err(err) => summary.fail(&team.team_name, format!("{err:#}")),
        }
        summary.log_progress("rosters");
    }
    summary.log_final("rosters");
    Ok(summary)
}

fn roster_for_team(
    fetcher: &dyn Fetcher,
    store: &mut dyn TeamStore,
    cfg: &ScrapeConfig,
    team: &TeamRecord,
    url: &str,
) -> Result<usize> {
    let doc = fetcher.fetch(url)?;
    let mut ctx = context_for(cfg, url);
    let page = extract_team_page(&doc, &mut ctx);
    if page.roster.is_empty() {
        anyhow::bail!("no roster entries extracted");
    }
    let written = store.upsert_roster_for_team(&team.team_id, &page.roster)?;
    if cfg.with_details
        && let Some(info) = page.base_info.as_ref()
    {
        store.update_team_base_info(&team.team_id, info)?;
    }
    Ok(written)
}

/// Every stored team (optionally one league's) to stored `base_info`.
pub fn crawl_team_details(
    fetcher: &dyn Fetcher,
    store: &mut dyn TeamStore,
    cfg: &ScrapeConfig,
    league: Option<&str>,
) -> Result<BatchSummary> {
    let teams = capped(store.load_teams(league)?, cfg);
    let mut summary = BatchSummary {
        total: teams.len(),
        ..BatchSummary::default()
    };

    for (i, team) in teams.iter().enumerate() {
        pause(cfg, i);
        let url = team_url(&cfg.base_url, &team.team_id);
        let result = fetcher.fetch(&url).and_then(|doc| {
            let mut ctx = context_for(cfg, &url);
            let info = extract_base_info(&doc, &mut ctx)
                .ok_or_else(|| anyhow::anyhow!("no base_info in page state"))?;
            store.update_team_base_info(&team.team_id, &info)
        });
        match result {
            Ok(touched) => {
                summary.succeeded += 1;
                summary.records_written += touched;
            }
            Err(err) => summary.fail(&team.team_name, format!("{err:#}")),
        }
        summary.log_progress("details");
    }
    summary.log_final("details");
    Ok(summary)
}

fn capped(mut teams: Vec<TeamRecord>, cfg: &ScrapeConfig) -> Vec<TeamRecord> {
    if let Some(max) = cfg.max_teams {
        teams.truncate(max);
    }
    teams
}

fn pause(cfg: &ScrapeConfig, index: usize) {
    if index > 0 && !cfg.request_delay.is_zero() {
        thread::sleep(cfg.request_delay);
    }
}
