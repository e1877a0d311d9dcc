use serde_json::{Map, Value};

use crate::model::{RosterEntry, Standings, TeamRecord};
use crate::observe::ExtractContext;

pub const MAX_SEARCH_DEPTH: usize = 5;
const SAMPLE_SIZE: usize = 5;

#[derive(Debug, Clone, Copy)]
pub struct FieldSet {
    pub containers: &'static [&'static str],
    pub diagnostics: &'static [&'static str],
}

pub const ROSTER_FIELDS: FieldSet = FieldSet {
    containers: &["members", "players", "staff", "squad", "roster"],
    diagnostics: &["id", "name", "type", "position", "role", "person_id", "person_name"],
};

pub const TEAM_FIELDS: FieldSet = FieldSet {
    containers: &["standings", "teams"],
    diagnostics: &["team_name", "team_id", "points", "rank"],
};

const NAME_KEYS: &[&str] = &["person_name", "name", "fullName", "displayName"];
const PERSON_ID_KEYS: &[&str] = &["person_id", "id", "@id"];
const TYPE_KEYS: &[&str] = &["type", "detailed_type", "role", "@type"];
const POSITION_KEYS: &[&str] = &["position", "position_name", "role"];
const NUMBER_KEYS: &[&str] = &["shirt_number", "jersey_number", "number"];
const AVATAR_KEYS: &[&str] = &["person_logo", "avatar", "avatar_url", "image"];
const NATIONALITY_KEYS: &[&str] = &["nationality_name", "nationality"];
const FLAG_KEYS: &[&str] = &["nationality_logo", "nationality_flag"];
const APPEARANCE_KEYS: &[&str] = &["appearances", "apps", "matches"];
const GOAL_KEYS: &[&str] = &["goals"];

pub fn assemble_roster_entries(
    objects: &[Map<String, Value>],
    ctx: &mut ExtractContext,
) -> Vec<RosterEntry> {
    let mut out = Vec::new();
    for record in record_maps(objects, &ROSTER_FIELDS) {
        match roster_entry_from_map(record).validate() {
            Ok(entry) => out.push(entry),
            Err(err) => ctx.record_invalid(&err),
        }
    }
    out
}

pub fn assemble_team_records(
    objects: &[Map<String, Value>],
    ctx: &mut ExtractContext,
) -> Vec<TeamRecord> {
    let mut out = Vec::new();
    for record in record_maps(objects, &TEAM_FIELDS) {
        match team_record_from_map(record).validate() {
            Ok(team) => out.push(team),
            Err(err) => ctx.record_invalid(&err),
        }
    }
    out
}

/// The record objects among `objects`.
///
/// When the objects are themselves records they are used as-is; otherwise
/// each one is searched for a container key and then structurally.
pub fn record_maps<'a>(
    objects: &'a [Map<String, Value>],
    fields: &FieldSet,
) -> Vec<&'a Map<String, Value>> {
    if looks_like_record_list(objects.iter().map(Some), fields) {
        return objects.iter().collect();
    }
    let mut out = Vec::new();
    for obj in objects {
        let list = container_list(obj, fields).or_else(|| {
            obj.values()
                .find_map(|v| find_record_list(v, fields, MAX_SEARCH_DEPTH - 1))
        });
        if let Some(list) = list {
            out.extend(list.iter().filter_map(Value::as_object));
        }
    }
    out
}

pub fn container_list<'a>(
    obj: &'a Map<String, Value>,
    fields: &FieldSet,
) -> Option<&'a Vec<Value>> {
    fields
        .containers
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_array))
}

/// Depth-first search for the first array that qualifies as a record list.
///
/// `depth` is how many more levels below `value` may be entered.
pub fn find_record_list<'a>(
    value: &'a Value,
    fields: &FieldSet,
    depth: usize,
) -> Option<&'a Vec<Value>> {
    match value {
        Value::Array(items) => {
            if looks_like_record_list(items.iter().map(Value::as_object), fields) {
                return Some(items);
            }
            if depth == 0 {
                return None;
            }
            items
                .iter()
                .find_map(|v| find_record_list(v, fields, depth - 1))
        }
        Value::Object(map) => {
            if depth == 0 {
                return None;
            }
            if let Some(list) = container_list(map, fields)
                && looks_like_record_list(list.iter().map(Value::as_object), fields)
            {
                return Some(list);
            }
            map.values()
                .find_map(|v| find_record_list(v, fields, depth - 1))
        }
        _ => None,
    }
}

/// Majority of the first few elements carry a diagnostic field.
fn looks_like_record_list<'a, I>(items: I, fields: &FieldSet) -> bool
where
    I: Iterator<Item = Option<&'a Map<String, Value>>>,
{
    let mut sampled = 0usize;
    let mut hits = 0usize;
    for item in items.take(SAMPLE_SIZE) {
        sampled += 1;
        if item.is_some_and(|obj| fields.diagnostics.iter().any(|k| obj.contains_key(*k))) {
            hits += 1;
        }
    }
    sampled > 0 && hits * 2 > sampled
}

pub fn roster_entry_from_map(obj: &Map<String, Value>) -> RosterEntry {
    RosterEntry {
        position: pick_string(obj, POSITION_KEYS),
        number: pick_string(obj, NUMBER_KEYS),
        name: pick_string(obj, NAME_KEYS).unwrap_or_default(),
        appearances: pick_string(obj, APPEARANCE_KEYS),
        goals: pick_string(obj, GOAL_KEYS),
        nationality: pick_string(obj, NATIONALITY_KEYS),
        nationality_flag: pick_string(obj, FLAG_KEYS),
        avatar: pick_string(obj, AVATAR_KEYS),
        person_id: pick_string(obj, PERSON_ID_KEYS),
        detailed_type: pick_string(obj, TYPE_KEYS),
        match_method: None,
    }
}

pub fn team_record_from_map(obj: &Map<String, Value>) -> TeamRecord {
    let standings = Standings {
        rank: pick_i64(obj, &["rank", "position"]),
        points: pick_i64(obj, &["points", "pts"]),
        played: pick_i64(obj, &["matches_total", "played"]),
        won: pick_i64(obj, &["matches_won", "won"]),
        drawn: pick_i64(obj, &["matches_draw", "drawn"]),
        lost: pick_i64(obj, &["matches_lost", "lost"]),
        goals_for: pick_i64(obj, &["goals_pro", "goals_for"]),
        goals_against: pick_i64(obj, &["goals_against"]),
    };
    TeamRecord {
        team_id: pick_string(obj, &["team_id", "id"]).unwrap_or_default(),
        team_name: pick_string(obj, &["team_name", "name"]).unwrap_or_default(),
        logo: pick_string(obj, &["team_logo", "logo"]),
        scheme: pick_string(obj, &["scheme"]),
        league: pick_string(obj, &["league_name", "competition_name"]),
        standings: (!standings.is_empty()).then_some(standings),
    }
}

pub fn pick_string(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| obj.get(*key).and_then(as_string))
}

fn pick_i64(obj: &Map<String, Value>, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|key| {
        let v = obj.get(*key)?;
        v.as_i64()
            .or_else(|| v.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .or_else(|| v.as_str().and_then(|s| s.trim().parse::<i64>().ok()))
    })
}

fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn maps(v: Value) -> Vec<Map<String, Value>> {
        v.as_array()
            .unwrap()
            .iter()
            .map(|x| x.as_object().unwrap().clone())
            .collect()
    }

    #[test]
    fn records_used_directly_when_they_are_records() {
        let objs = maps(json!([
            {"person_id": 50001, "person_name": "Mike Maignan", "type": "goalkeeper", "nationality_name": "France"},
            {"person_id": "50002", "person_name": "Theo Hernandez", "age": 27},
        ]));
        let mut ctx = ExtractContext::new("mem://t");
        let entries = assemble_roster_entries(&objs, &mut ctx);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].person_id.as_deref(), Some("50001"));
        assert_eq!(entries[0].detailed_type.as_deref(), Some("goalkeeper"));
        assert_eq!(entries[0].nationality.as_deref(), Some("France"));
        assert_eq!(entries[1].name, "Theo Hernandez");
    }

    #[test]
    fn container_key_is_preferred() {
        let objs = maps(json!([
            {"title": "Squad", "players": [{"name": "A"}, {"name": "B"}], "other": [{"name": "Z"}]}
        ]));
        let mut ctx = ExtractContext::new("mem://t");
        let names: Vec<String> = assemble_roster_entries(&objs, &mut ctx)
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn structural_search_finds_nested_list_within_depth() {
        let deep = json!({"a": {"b": {"c": [{"x": 1}, {"id": 7, "name": "Found"}, {"name": "Too"}]}}});
        let list = find_record_list(&deep, &ROSTER_FIELDS, MAX_SEARCH_DEPTH).unwrap();
        assert_eq!(list.len(), 3);

        let too_deep = json!({"a": {"b": {"c": {"d": {"e": {"f": [{"name": "X"}]}}}}}});
        assert!(find_record_list(&too_deep, &ROSTER_FIELDS, MAX_SEARCH_DEPTH).is_none());
    }

    #[test]
    fn minority_of_diagnostic_fields_is_not_a_list() {
        let v = json!([{"name": "only"}, {"x": 1}, {"y": 2}]);
        assert!(find_record_list(&v, &ROSTER_FIELDS, 0).is_none());
        let v = json!([{"name": "a"}, {"name": "b"}, {"y": 2}]);
        assert!(find_record_list(&v, &ROSTER_FIELDS, 0).is_some());
    }

    #[test]
    fn nameless_entries_are_discarded_and_counted() {
        let objs = maps(json!([
            {"person_id": "1", "person_name": "", "type": "coach", "person_logo": "x.png"},
            {"person_id": "2", "person_name": null},
            {"person_id": "3", "person_name": "Real"},
        ]));
        let mut ctx = ExtractContext::new("mem://t");
        let entries = assemble_roster_entries(&objs, &mut ctx);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "Real");
        assert_eq!(ctx.stats.records_invalid, 2);
    }

    #[test]
    fn team_records_carry_standings() {
        let objs = maps(json!([{
            "data": [
                {"rank": "1", "team_id": 50000513, "team_name": "Liverpool", "team_logo": "l.png",
                 "scheme": "dongqiudi:///team/50000513", "points": 84, "matches_total": 38,
                 "matches_won": 25, "matches_draw": 9, "matches_lost": 4, "goals_pro": 86, "goals_against": 41},
                {"team_id": "50000514", "team_name": "Arsenal"},
                {"team_name": "No Id"}
            ]
        }]));
        let mut ctx = ExtractContext::new("mem://t");
        let teams = assemble_team_records(&objs, &mut ctx);
        assert_eq!(teams.len(), 2);
        let lfc = &teams[0];
        assert_eq!(lfc.team_id, "50000513");
        let s = lfc.standings.as_ref().unwrap();
        assert_eq!((s.rank, s.points, s.played), (Some(1), Some(84), Some(38)));
        assert_eq!((s.won, s.drawn, s.lost), (Some(25), Some(9), Some(4)));
        assert_eq!((s.goals_for, s.goals_against), (Some(86), Some(41)));
        assert!(teams[1].standings.is_none());
        assert_eq!(ctx.stats.records_invalid, 1);
    }
}
