use std::ops::Range;

use once_cell::unsync::OnceCell;
use rayon::prelude::*;
use scraper::Html;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::alias::{AliasTable, build_alias_table};
use crate::assemble::{
    FieldSet, MAX_SEARCH_DEPTH, ROSTER_FIELDS, TEAM_FIELDS, assemble_roster_entries,
    assemble_team_records, find_record_list,
};
use crate::dom::{extract_dom_roster, extract_dom_standings};
use crate::error::ExtractError;
use crate::league::League;
use crate::locator::{
    EmbeddedStateBlob, MarkerPattern, inline_scripts, json_ld_scripts, locate_state,
};
use crate::model::{BaseInfo, RawDocument, RosterEntry, TeamPage, TeamRecord};
use crate::normalize::{normalize, normalize_objects, normalize_value};
use crate::objects::split_objects;
use crate::observe::{ExtractContext, ExtractObserver, ExtractStats, NoopObserver};
use crate::reconcile::merge;
use crate::scan::{extract_balanced_span, extract_key_span, find_value_starts, strip_delimiters};

const MEMBER_KEY: &str = "teamMemberData";
const TEAM_DETAIL_KEY: &str = "teamDetail";
const BASE_INFO_KEY: &str = "base_info";
const STANDINGS_KEYS: &[&str] = &["standings", "teams", "data"];

const JSON_LD_FIELDS: FieldSet = FieldSet {
    containers: &["member", "members", "athlete", "athletes", "person", "persons"],
    diagnostics: &["name", "@id", "@type"],
};

pub struct ParsedPage {
    html: Html,
    scripts: Vec<String>,
    state: OnceCell<Option<LocatedState>>,
}

struct LocatedState {
    script_index: usize,
    range: Range<usize>,
    pattern: MarkerPattern,
    aliases: AliasTable,
}

impl ParsedPage {
    pub fn parse(raw_html: &str) -> Self {
        let html = Html::parse_document(raw_html);
        let scripts = inline_scripts(&html);
        Self {
            html,
            scripts,
            state: OnceCell::new(),
        }
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    pub fn scripts(&self) -> &[String] {
        &self.scripts
    }

    /// Located state and its aliases; located once per page, `None` when the
    /// page has none.
    pub fn state_view(&self, ctx: &mut ExtractContext) -> Option<StateView<'_>> {
        let located = self.state.get_or_init(|| {
            let Some(blob) = locate_state(&self.scripts) else {
                debug!(url = ctx.url(), scripts = self.scripts.len(), "embedded state not found");
                return None;
            };
            ctx.blob_located(&blob);
            let aliases = if blob.pattern.needs_aliases() {
                build_alias_table(blob.text)
            } else {
                AliasTable::new()
            };
            Some(LocatedState {
                script_index: blob.script_index,
                range: blob.range,
                pattern: blob.pattern,
                aliases,
            })
        });
        let located = located.as_ref()?;
        let script = &self.scripts[located.script_index];
        Some(StateView {
            blob: EmbeddedStateBlob {
                script_index: located.script_index,
                text: &script[located.range.clone()],
                range: located.range.clone(),
                pattern: located.pattern,
            },
            aliases: &located.aliases,
        })
    }
}

pub struct StateView<'a> {
    pub blob: EmbeddedStateBlob<'a>,
    pub aliases: &'a AliasTable,
}

impl<'a> StateView<'a> {
    /// The state object itself: the closure's returned literal, or the
    /// assigned object for the plain forms.
    pub fn root_span(&self) -> Option<&'a str> {
        let text = self.blob.text;
        match self.blob.pattern {
            MarkerPattern::NuxtObject | MarkerPattern::InitialState | MarkerPattern::InitialData => {
                Some(text)
            }
            MarkerPattern::NuxtClosure | MarkerPattern::BareNuxtName => {
                let ret = text.find("return")?;
                let open = ret + text[ret..].find('{')?;
                extract_balanced_span(text, open, '{', '}')
            }
        }
    }

    /// Normalized objects inside each array value of `key`, one batch per
    /// occurrence, in source order.
    fn object_batches(&self, key: &str, ctx: &mut ExtractContext) -> Vec<Vec<Map<String, Value>>> {
        let text = self.blob.text;
        let mut out = Vec::new();
        for start in find_value_starts(text, key, '[') {
            let Some(span) = extract_balanced_span(text, start, '[', ']') else {
                continue;
            };
            ctx.span_extracted(key, span);
            let literals = split_objects(strip_delimiters(span, '[', ']'));
            out.push(normalize_objects(literals, self.aliases, ctx));
        }
        out
    }

    fn object_under(&self, key: &str, ctx: &mut ExtractContext) -> Option<Map<String, Value>> {
        let span = extract_key_span(self.blob.text, key, '{', '}')?;
        ctx.span_extracted(key, span);
        match normalize(span, self.aliases) {
            Ok(map) => {
                ctx.record_normalized();
                Some(map)
            }
            Err(err) => {
                ctx.record_dropped(span, &err);
                None
            }
        }
    }

    fn normalized_root(&self, ctx: &mut ExtractContext) -> Option<Value> {
        let root = self.root_span()?;
        match normalize_value(root, self.aliases) {
            Ok(value) => {
                ctx.record_normalized();
                Some(value)
            }
            Err(err) => {
                ctx.record_dropped(root, &err);
                None
            }
        }
    }
}

/// Roster for one team page: DOM rows enriched from embedded state.
pub fn extract_roster(doc: &RawDocument, ctx: &mut ExtractContext) -> Vec<RosterEntry> {
    let page = ParsedPage::parse(&doc.html);
    roster_from_page(&page, ctx)
}

pub fn extract_team_page(doc: &RawDocument, ctx: &mut ExtractContext) -> TeamPage {
    let page = ParsedPage::parse(&doc.html);
    TeamPage {
        roster: roster_from_page(&page, ctx),
        base_info: base_info_from_page(&page, ctx),
    }
}

pub fn roster_from_page(page: &ParsedPage, ctx: &mut ExtractContext) -> Vec<RosterEntry> {
    let dom = extract_dom_roster(page.html(), ctx);
    ctx.strategy_outcome("dom_roster", dom.len());
    let state = state_roster(page, ctx);

    let out = if dom.is_empty() { state } else { merge(dom, &state) };
    info!(url = ctx.url(), entries = out.len(), "roster extracted");
    out
}

type RosterStrategy = fn(&StateView<'_>, &mut ExtractContext) -> Vec<RosterEntry>;

/// Roster records from embedded state, trying each strategy until one yields.
pub fn state_roster(page: &ParsedPage, ctx: &mut ExtractContext) -> Vec<RosterEntry> {
    if let Some(view) = page.state_view(ctx) {
        let strategies: [(&str, RosterStrategy); 3] = [
            ("state_member_data", roster_from_member_data),
            ("state_container_keys", roster_from_container_keys),
            ("state_structural", roster_from_structure),
        ];
        for (name, strategy) in strategies {
            let entries = strategy(&view, ctx);
            ctx.strategy_outcome(name, entries.len());
            if !entries.is_empty() {
                return entries;
            }
        }
    }

    let entries = roster_from_json_ld(page, ctx);
    ctx.strategy_outcome("json_ld", entries.len());
    entries
}

fn roster_from_member_data(view: &StateView<'_>, ctx: &mut ExtractContext) -> Vec<RosterEntry> {
    for batch in view.object_batches(MEMBER_KEY, ctx) {
        let entries = assemble_roster_entries(&batch, ctx);
        if !entries.is_empty() {
            return entries;
        }
    }
    match view.object_under(MEMBER_KEY, ctx) {
        Some(obj) => assemble_roster_entries(&[obj], ctx),
        None => Vec::new(),
    }
}

fn roster_from_container_keys(view: &StateView<'_>, ctx: &mut ExtractContext) -> Vec<RosterEntry> {
    for key in ROSTER_FIELDS.containers {
        for batch in view.object_batches(key, ctx) {
            let entries = assemble_roster_entries(&batch, ctx);
            if !entries.is_empty() {
                return entries;
            }
        }
    }
    Vec::new()
}

fn roster_from_structure(view: &StateView<'_>, ctx: &mut ExtractContext) -> Vec<RosterEntry> {
    let Some(root) = view.normalized_root(ctx) else {
        return Vec::new();
    };
    let Some(list) = find_record_list(&root, &ROSTER_FIELDS, MAX_SEARCH_DEPTH) else {
        return Vec::new();
    };
    let objects: Vec<Map<String, Value>> =
        list.iter().filter_map(|v| v.as_object().cloned()).collect();
    assemble_roster_entries(&objects, ctx)
}

fn roster_from_json_ld(page: &ParsedPage, ctx: &mut ExtractContext) -> Vec<RosterEntry> {
    for body in json_ld_scripts(page.html()) {
        let value: Value = match serde_json::from_str(body.trim()) {
            Ok(value) => value,
            Err(err) => {
                let err = ExtractError::malformed(format!("json-ld: {err}"), &body);
                ctx.record_dropped(&body, &err);
                continue;
            }
        };
        let Some(list) = find_record_list(&value, &JSON_LD_FIELDS, MAX_SEARCH_DEPTH)
            .or_else(|| json_ld_member_list(&value))
        else {
            continue;
        };
        let objects: Vec<Map<String, Value>> =
            list.iter().filter_map(|v| v.as_object().cloned()).collect();
        let entries = assemble_roster_entries(&objects, ctx);
        if !entries.is_empty() {
            return entries;
        }
    }
    Vec::new()
}

/// `member`-style lists even when their items lack the usual fields.
fn json_ld_member_list(value: &Value) -> Option<&Vec<Value>> {
    match value {
        Value::Object(map) => JSON_LD_FIELDS
            .containers
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_array))
            .or_else(|| map.values().find_map(json_ld_member_list)),
        Value::Array(items) => items.iter().find_map(json_ld_member_list),
        _ => None,
    }
}

pub fn extract_base_info(doc: &RawDocument, ctx: &mut ExtractContext) -> Option<BaseInfo> {
    let page = ParsedPage::parse(&doc.html);
    base_info_from_page(&page, ctx)
}

pub fn base_info_from_page(page: &ParsedPage, ctx: &mut ExtractContext) -> Option<BaseInfo> {
    let view = page.state_view(ctx)?;
    let from_detail = view
        .object_under(TEAM_DETAIL_KEY, ctx)
        .and_then(|detail| match detail.get(BASE_INFO_KEY) {
            Some(Value::Object(info)) => Some(info.clone()),
            _ => None,
        });
    let info = from_detail.or_else(|| view.object_under(BASE_INFO_KEY, ctx));
    ctx.strategy_outcome("state_base_info", info.as_ref().map_or(0, Map::len));
    info
}

/// Teams with standings from a league page.
///
/// Tries the state arrays under the standings keys, then a structural
/// search of the whole state, then the visible standings table. Records
/// without a league name get `league`'s.
pub fn extract_teams(
    doc: &RawDocument,
    league: Option<&League>,
    ctx: &mut ExtractContext,
) -> Vec<TeamRecord> {
    let page = ParsedPage::parse(&doc.html);
    let mut teams = teams_from_state(&page, ctx);
    if teams.is_empty() {
        teams = extract_dom_standings(page.html(), ctx);
        ctx.strategy_outcome("dom_standings", teams.len());
    }
    if let Some(league) = league {
        for team in &mut teams {
            if team.league.is_none() {
                team.league = Some(league.name.to_string());
            }
        }
    }
    info!(url = ctx.url(), teams = teams.len(), "teams extracted");
    teams
}

fn teams_from_state(page: &ParsedPage, ctx: &mut ExtractContext) -> Vec<TeamRecord> {
    let Some(view) = page.state_view(ctx) else {
        return Vec::new();
    };
    for key in STANDINGS_KEYS {
        for batch in view.object_batches(key, ctx) {
            let teams = assemble_team_records(&batch, ctx);
            if !teams.is_empty() {
                ctx.strategy_outcome("state_standings_keys", teams.len());
                return teams;
            }
        }
    }
    ctx.strategy_outcome("state_standings_keys", 0);

    let teams = view
        .normalized_root(ctx)
        .and_then(|root| {
            find_record_list(&root, &TEAM_FIELDS, MAX_SEARCH_DEPTH).map(|list| {
                list.iter()
                    .filter_map(|v| v.as_object().cloned())
                    .collect::<Vec<_>>()
            })
        })
        .map(|objects| assemble_team_records(&objects, ctx))
        .unwrap_or_default();
    ctx.strategy_outcome("state_structural", teams.len());
    teams
}

#[derive(Debug, Clone, Serialize)]
pub struct RosterExtraction {
    pub url: String,
    pub roster: Vec<RosterEntry>,
    pub stats: ExtractStats,
}

/// Extracts many documents on the rayon pool, one context per document.
pub fn extract_rosters_parallel<F>(docs: &[RawDocument], observer: F) -> Vec<RosterExtraction>
where
    F: Fn() -> Box<dyn ExtractObserver> + Sync,
{
    docs.par_iter()
        .map(|doc| {
            let mut ctx = ExtractContext::with_observer(doc.url.clone(), observer());
            let roster = extract_roster(doc, &mut ctx);
            RosterExtraction {
                url: doc.url.clone(),
                roster,
                stats: ctx.stats,
            }
        })
        .collect()
}

pub fn extract_rosters_parallel_quiet(docs: &[RawDocument]) -> Vec<RosterExtraction> {
    extract_rosters_parallel(docs, || Box::new(NoopObserver))
}
