use std::collections::HashMap;

use tracing::debug;

use crate::model::{MatchMethod, RosterEntry};

/// Lowercased name with whitespace, hyphens and periods removed.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '.'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Enriches each DOM entry from its state counterpart.
///
/// Pairing tries an exact name, then a normalized name, then the same list
/// index. Every returned entry carries the method that paired it; entries
/// past the end of `state` with no name match stay [`MatchMethod::Unmatched`]
/// and keep `person_id`/`detailed_type` absent.
pub fn merge(dom: Vec<RosterEntry>, state: &[RosterEntry]) -> Vec<RosterEntry> {
    let mut exact: HashMap<&str, usize> = HashMap::new();
    let mut normalized: HashMap<String, usize> = HashMap::new();
    for (i, entry) in state.iter().enumerate() {
        exact.entry(entry.name.as_str()).or_insert(i);
        normalized.entry(normalize_name(&entry.name)).or_insert(i);
    }

    let mut counts: HashMap<MatchMethod, usize> = HashMap::new();
    let merged: Vec<RosterEntry> = dom
        .into_iter()
        .enumerate()
        .map(|(i, mut entry)| {
            let (method, source) = if let Some(&j) = exact.get(entry.name.as_str()) {
                (MatchMethod::ExactName, Some(&state[j]))
            } else if let Some(&j) = normalized.get(&normalize_name(&entry.name)) {
                (MatchMethod::NormalizedName, Some(&state[j]))
            } else if let Some(s) = state.get(i) {
                (MatchMethod::Position, Some(s))
            } else {
                (MatchMethod::Unmatched, None)
            };

            if let Some(source) = source {
                enrich(&mut entry, source);
            }
            debug!(
                name = %entry.name,
                method = method.as_str(),
                person_id = entry.person_id.as_deref().unwrap_or("-"),
                "roster entry reconciled"
            );
            entry.match_method = Some(method);
            *counts.entry(method).or_default() += 1;
            entry
        })
        .collect();

    debug!(
        exact = counts.get(&MatchMethod::ExactName).copied().unwrap_or(0),
        normalized = counts.get(&MatchMethod::NormalizedName).copied().unwrap_or(0),
        position = counts.get(&MatchMethod::Position).copied().unwrap_or(0),
        unmatched = counts.get(&MatchMethod::Unmatched).copied().unwrap_or(0),
        "roster reconciliation finished"
    );
    merged
}

fn enrich(entry: &mut RosterEntry, source: &RosterEntry) {
    entry.person_id = source.person_id.clone();
    entry.detailed_type = source.detailed_type.clone();
    fill(&mut entry.number, &source.number);
    fill(&mut entry.position, &source.position);
    fill(&mut entry.avatar, &source.avatar);
    fill(&mut entry.nationality, &source.nationality);
    fill(&mut entry.nationality_flag, &source.nationality_flag);
    fill(&mut entry.appearances, &source.appearances);
    fill(&mut entry.goals, &source.goals);
}

fn fill(slot: &mut Option<String>, from: &Option<String>) {
    if slot.is_none() {
        slot.clone_from(from);
    }
}
