use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::model::{RosterEntry, Standings, TeamRecord};
use crate::observe::ExtractContext;

static ROSTER_ROOT: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".team-player-data").expect("valid selector"));
static ROSTER_ITEM: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".analysis-list-item").expect("valid selector"));
static ITEM_CELLS: Lazy<[Selector; 6]> = Lazy::new(|| {
    std::array::from_fn(|i| {
        Selector::parse(&format!("span.item{}", i + 1)).expect("valid selector")
    })
});
static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img").expect("valid selector"));
static TABLE_ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").expect("valid selector"));
static TABLE_CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("td").expect("valid selector"));
static TEAM_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"a[href*="/team/"]"#).expect("valid selector"));

static TEAM_HREF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/team/(\d+)").expect("valid regex"));
static DIGITS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid regex"));
static GOALS_PAIR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+)\s*[:/-]\s*(\d+)\s*$").expect("valid regex"));

const POSITION_KEYWORDS: &[&str] = &["前锋", "中场", "后卫", "门将", "教练", "工作人员"];

const MIN_STANDINGS_CELLS: usize = 6;

pub fn extract_dom_roster(doc: &Html, ctx: &mut ExtractContext) -> Vec<RosterEntry> {
    let items: Vec<ElementRef<'_>> = match doc.select(&ROSTER_ROOT).next() {
        Some(root) => root.select(&ROSTER_ITEM).collect(),
        None => doc.select(&ROSTER_ITEM).collect(),
    };

    let mut out = Vec::new();
    for item in items {
        let entry = roster_entry_from_item(item);
        match entry.validate() {
            Ok(entry) => out.push(entry),
            Err(err) => ctx.record_invalid(&err),
        }
    }
    debug!(url = ctx.url(), entries = out.len(), "dom roster extracted");
    out
}

fn roster_entry_from_item(item: ElementRef<'_>) -> RosterEntry {
    let cell = |i: usize| item.select(&ITEM_CELLS[i]).next();
    let mut entry = RosterEntry::default();

    if let Some(c) = cell(0) {
        entry.position = non_empty(element_text(c));
    }
    if let Some(c) = cell(1) {
        entry.number = non_empty(element_text(c));
    }
    if let Some(c) = cell(2) {
        entry.name = element_text(c);
        entry.avatar = c
            .select(&IMG)
            .next()
            .and_then(|img| img.value().attr("src"))
            .and_then(|s| non_empty(s.to_string()));
    }
    if let Some(c) = cell(3) {
        entry.appearances = non_empty(element_text(c));
    }
    if let Some(c) = cell(4) {
        entry.goals = non_empty(element_text(c));
    }
    if let Some(c) = cell(5) {
        match c.select(&IMG).next() {
            Some(img) => {
                let attr = |name: &str| img.value().attr(name).and_then(|s| non_empty(s.to_string()));
                entry.nationality_flag = attr("src");
                entry.nationality = attr("alt");
            }
            None => entry.nationality = non_empty(element_text(c)),
        }
    }

    if entry.position.is_none() && entry.name.is_empty() {
        let text = element_text(item);
        if let Some(fallback) = parse_row_text(&text) {
            debug!(text = %text, "roster row parsed from flattened text");
            entry = RosterEntry {
                avatar: entry.avatar,
                nationality: entry.nationality,
                nationality_flag: entry.nationality_flag,
                ..fallback
            };
        }
    }
    entry
}

/// Best-effort split of a row's flattened text.
///
/// A position keyword becomes the position, digit runs become jersey number,
/// appearances and goals in that order, and what remains is the name.
pub fn parse_row_text(text: &str) -> Option<RosterEntry> {
    let mut entry = RosterEntry::default();
    let mut rest = text.to_string();

    if let Some(kw) = POSITION_KEYWORDS.iter().find(|kw| text.contains(**kw)) {
        entry.position = Some(kw.to_string());
        rest = rest.replace(*kw, "");
    }

    let numbers: Vec<&str> = DIGITS_RE.find_iter(text).map(|m| m.as_str()).collect();
    let slots = [&mut entry.number, &mut entry.appearances, &mut entry.goals];
    for (n, slot) in numbers.iter().zip(slots) {
        *slot = Some(n.to_string());
    }
    rest = DIGITS_RE.replace_all(&rest, "").into_owned();

    let name: String = rest
        .chars()
        .filter(|c| !matches!(c, '~' | '-'))
        .collect::<String>()
        .trim()
        .to_string();
    if name.chars().count() > 1 {
        entry.name = name;
    }

    let found = entry.position.is_some() || entry.number.is_some() || !entry.name.is_empty();
    found.then_some(entry)
}

/// Standings rows from any table whose rows carry at least six cells.
///
/// Cells are read as rank, team, played, won, drawn, lost, then either
/// points, `for:against` and points, or for, against and points.
pub fn extract_dom_standings(doc: &Html, ctx: &mut ExtractContext) -> Vec<TeamRecord> {
    let mut out = Vec::new();
    for row in doc.select(&TABLE_ROW) {
        let cells: Vec<ElementRef<'_>> = row.select(&TABLE_CELL).collect();
        if cells.len() < MIN_STANDINGS_CELLS {
            continue;
        }
        let team = team_from_row(row, &cells);
        match team.validate() {
            Ok(team) => out.push(team),
            Err(err) => ctx.record_invalid(&err),
        }
    }
    debug!(url = ctx.url(), teams = out.len(), "dom standings extracted");
    out
}

fn team_from_row(row: ElementRef<'_>, cells: &[ElementRef<'_>]) -> TeamRecord {
    let link = row.select(&TEAM_LINK).next();
    let team_id = link
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| TEAM_HREF_RE.captures(href))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    let team_name = link
        .map(element_text)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| element_text(cells[1]));
    let logo = cells[1]
        .select(&IMG)
        .next()
        .and_then(|img| img.value().attr("src"))
        .and_then(|s| non_empty(s.to_string()));

    let num = |i: usize| cells.get(i).and_then(|c| element_text(*c).parse::<i64>().ok());
    let mut standings = Standings {
        rank: num(0),
        played: num(2),
        won: num(3),
        drawn: num(4),
        lost: num(5),
        ..Standings::default()
    };
    match cells.len() {
        7 => standings.points = num(6),
        8 => {
            let pair = element_text(cells[6]);
            if let Some(caps) = GOALS_PAIR_RE.captures(&pair) {
                standings.goals_for = caps[1].parse().ok();
                standings.goals_against = caps[2].parse().ok();
            }
            standings.points = num(7);
        }
        n if n >= 9 => {
            standings.goals_for = num(6);
            standings.goals_against = num(7);
            standings.points = num(8);
        }
        _ => {}
    }

    TeamRecord {
        team_id,
        team_name,
        logo,
        standings: (!standings.is_empty()).then_some(standings),
        ..TeamRecord::default()
    }
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().map(str::trim).collect::<String>()
}

fn non_empty(s: String) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_string())
}
