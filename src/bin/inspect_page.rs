use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use serde_json::json;

use team_roster_scraper::RawDocument;
use team_roster_scraper::league;
use team_roster_scraper::logging::init_logging_with_default;
use team_roster_scraper::observe::{DumpObserver, ExtractContext};
use team_roster_scraper::pipeline::{extract_team_page, extract_teams};

// Runs extraction over a saved page and prints what came out as JSON.
//
//   inspect_page team page.html [--dump DIR]
//   inspect_page league page.html [--league ORDINAL] [--dump DIR]
fn main() -> Result<()> {
    init_logging_with_default("debug")?;

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let positional = args
        .iter()
        .enumerate()
        .filter(|(i, a)| !a.starts_with("--") && !is_flag_value(&args, *i))
        .map(|(_, a)| a.as_str())
        .collect::<Vec<_>>();
    let (kind, path) = match positional.as_slice() {
        [kind, path, ..] => (*kind, PathBuf::from(path)),
        _ => bail!("usage: inspect_page <team|league> <file.html> [--league N] [--dump DIR]"),
    };

    let html = std::fs::read_to_string(&path)
        .with_context(|| format!("read {}", path.display()))?;
    let url = format!("file://{}", path.display());
    let doc = RawDocument::new(url.clone(), html);

    let mut ctx = match flag_value(&args, "--dump") {
        Some(dir) => ExtractContext::with_observer(url, Box::new(DumpObserver::new(dir)?)),
        None => ExtractContext::new(url),
    };

    let output = match kind {
        "team" => {
            let page = extract_team_page(&doc, &mut ctx);
            json!({ "page": page, "stats": ctx.stats })
        }
        "league" => {
            let target = match flag_value(&args, "--league") {
                Some(raw) => {
                    let ordinal = raw
                        .parse::<u32>()
                        .with_context(|| format!("invalid league ordinal `{raw}`"))?;
                    Some(league::lookup(ordinal).context("unknown league ordinal")?)
                }
                None => None,
            };
            let teams = extract_teams(&doc, target, &mut ctx);
            json!({ "teams": teams, "stats": ctx.stats })
        }
        other => bail!("unknown page kind `{other}` (expected team or league)"),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn is_flag_value(args: &[String], idx: usize) -> bool {
    idx > 0 && matches!(args[idx - 1].as_str(), "--dump" | "--league")
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    let prefix = format!("{flag}=");
    args.iter().enumerate().find_map(|(idx, arg)| {
        if let Some(value) = arg.strip_prefix(&prefix) {
            return Some(value.trim().to_string()).filter(|v| !v.is_empty());
        }
        if arg == flag {
            return args
                .get(idx + 1)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());
        }
        None
    })
}
