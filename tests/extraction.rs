use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde_json::json;

use team_roster_scraper::league;
use team_roster_scraper::locator::EmbeddedStateBlob;
use team_roster_scraper::observe::{ExtractContext, ExtractObserver};
use team_roster_scraper::pipeline::{
    extract_base_info, extract_roster, extract_rosters_parallel, extract_rosters_parallel_quiet,
    extract_team_page, extract_teams,
};
use team_roster_scraper::{ExtractError, MatchMethod, RawDocument};

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

fn fixture_doc(name: &str) -> RawDocument {
    RawDocument::new(format!("https://www.dongqiudi.com/fixture/{name}"), read_fixture(name))
}

#[test]
fn team_page_roster_is_reconciled_against_state() {
    let doc = fixture_doc("team_page.html");
    let mut ctx = ExtractContext::new(&doc.url);
    let roster = extract_roster(&doc, &mut ctx);

    let names: Vec<&str> = roster.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(
        names,
        ["Rafael Leão", "Ruben Loftus-Cheek", "Fikayo Tomori", "Mike Maignan", "Paulo Fonseca"]
    );

    let leao = &roster[0];
    assert_eq!(leao.match_method, Some(MatchMethod::ExactName));
    assert_eq!(leao.person_id.as_deref(), Some("50001"));
    assert_eq!(leao.detailed_type.as_deref(), Some("forward"));
    assert_eq!(leao.position.as_deref(), Some("前锋"));
    assert_eq!(leao.number.as_deref(), Some("10"));
    assert_eq!(leao.appearances.as_deref(), Some("20"));
    assert_eq!(leao.goals.as_deref(), Some("8"));
    assert_eq!(leao.nationality.as_deref(), Some("葡萄牙"));
    assert_eq!(
        leao.avatar.as_deref(),
        Some("https://img.example.com/person/50001.png")
    );

    assert_eq!(roster[1].match_method, Some(MatchMethod::NormalizedName));
    assert_eq!(roster[1].person_id.as_deref(), Some("50002"));

    // Missing DOM fields are filled from state.
    assert_eq!(roster[2].nationality.as_deref(), Some("英格兰"));
    assert_eq!(
        roster[2].nationality_flag.as_deref(),
        Some("https://img.example.com/flag/en.png")
    );

    assert_eq!(roster[3].match_method, Some(MatchMethod::Position));
    assert_eq!(roster[3].person_id.as_deref(), Some("50004"));
    assert_eq!(roster[3].detailed_type.as_deref(), Some("goalkeeper"));

    let coach = &roster[4];
    assert_eq!(coach.match_method, Some(MatchMethod::Unmatched));
    assert_eq!(coach.person_id, None);
    assert_eq!(coach.detailed_type, None);
    assert_eq!(coach.number, None);
}

#[test]
fn bad_records_are_counted_not_fatal() {
    let doc = fixture_doc("team_page.html");
    let mut ctx = ExtractContext::new(&doc.url);
    let roster = extract_roster(&doc, &mut ctx);

    assert_eq!(roster.len(), 5);
    assert!(roster.iter().all(|e| !e.name.trim().is_empty()));
    // `f.name()` in the last state literal.
    assert_eq!(ctx.stats.records_dropped, 1);
    // Nameless DOM row plus nameless state record.
    assert_eq!(ctx.stats.records_invalid, 2);
    assert_eq!(ctx.stats.blobs_located, 1);
    assert_eq!(ctx.stats.strategy.as_deref(), Some("dom_roster"));
}

#[test]
fn team_page_base_info_comes_from_team_detail() {
    let doc = fixture_doc("team_page.html");
    let mut ctx = ExtractContext::new(&doc.url);
    let info = extract_base_info(&doc, &mut ctx).expect("base_info present");

    assert_eq!(info.get("team_en_name"), Some(&json!("AC Milan")));
    assert_eq!(info.get("founded"), Some(&json!(1899)));
    assert_eq!(info.get("venue_name"), Some(&json!("San Siro")));
    assert_eq!(info.get("website"), Some(&json!(null)));
    assert_eq!(info.get("is_national"), Some(&json!(false)));
}

#[test]
fn team_page_parses_once_for_both_outputs() {
    let doc = fixture_doc("team_page.html");
    let mut ctx = ExtractContext::new(&doc.url);
    let page = extract_team_page(&doc, &mut ctx);
    assert_eq!(ctx.stats.blobs_located, 1);
    assert_eq!(page.roster.len(), 5);
    assert_eq!(
        page.base_info.as_ref().and_then(|i| i.get("capacity")),
        Some(&json!(75817))
    );
}

#[test]
fn legacy_state_uses_container_keys() {
    let doc = fixture_doc("object_state_page.html");
    let mut ctx = ExtractContext::new(&doc.url);
    let roster = extract_roster(&doc, &mut ctx);

    assert_eq!(ctx.stats.strategy.as_deref(), Some("state_container_keys"));
    assert_eq!(roster.len(), 3);
    assert_eq!(roster[0].name, "Lautaro Martínez");
    assert_eq!(roster[0].person_id.as_deref(), Some("501"));
    assert_eq!(roster[0].number.as_deref(), Some("10"));
    assert_eq!(roster[1].name, "Nicolò Barella");
    assert_eq!(roster[2].name, "Yann Sommer");
    assert_eq!(roster[2].number, None);
    assert!(roster.iter().all(|e| e.match_method.is_none()));
}

#[test]
fn league_state_yields_standings() {
    let doc = fixture_doc("league_page.html");
    let mut ctx = ExtractContext::new(&doc.url);
    let serie_a = league::lookup(3);
    let teams = extract_teams(&doc, serie_a, &mut ctx);

    assert_eq!(teams.len(), 3);
    assert_eq!(ctx.stats.records_invalid, 1);
    assert_eq!(ctx.stats.strategy.as_deref(), Some("state_standings_keys"));

    let inter = &teams[0];
    assert_eq!(inter.team_id, "50001042");
    assert_eq!(inter.team_name, "国际米兰");
    assert_eq!(inter.league.as_deref(), Some("意甲"));
    assert_eq!(inter.scheme.as_deref(), Some("Champions League"));
    let s = inter.standings.as_ref().expect("standings");
    assert_eq!(s.rank, Some(1));
    assert_eq!(s.points, Some(81));
    assert_eq!(s.played, Some(38));
    assert_eq!((s.won, s.drawn, s.lost), (Some(24), Some(9), Some(5)));
    assert_eq!((s.goals_for, s.goals_against), (Some(79), Some(35)));

    assert_eq!(teams[2].team_name, "AC米兰");
    assert_eq!(teams[2].logo, None);
}

#[test]
fn standings_table_is_the_fallback() {
    let doc = fixture_doc("dom_standings.html");
    let mut ctx = ExtractContext::new(&doc.url);
    let teams = extract_teams(&doc, None, &mut ctx);

    assert_eq!(ctx.stats.strategy.as_deref(), Some("dom_standings"));
    assert_eq!(teams.len(), 3);
    assert_eq!(teams[0].team_id, "50000534");
    assert_eq!(teams[0].team_name, "利物浦");
    assert_eq!(
        teams[0].logo.as_deref(),
        Some("https://img.example.com/team/50000534.png")
    );
    let s = teams[0].standings.as_ref().expect("standings");
    assert_eq!((s.goals_for, s.goals_against, s.points), (Some(86), Some(41), Some(84)));
    let city = teams[2].standings.as_ref().expect("standings");
    assert_eq!((city.goals_for, city.goals_against), (Some(72), Some(44)));
    assert!(teams.iter().all(|t| t.league.is_none()));
}

#[test]
fn truncated_state_degrades_to_empty() {
    let html = read_fixture("team_page.html");
    let cut = html.find("teamMemberData").expect("marker") + 40;
    let doc = RawDocument::new("mem://truncated", format!("{}</script>", &html[..cut]));
    let mut ctx = ExtractContext::new(&doc.url);
    let roster = extract_roster(&doc, &mut ctx);
    // The DOM rows are intact; only enrichment is lost.
    assert_eq!(roster.len(), 5);
    assert!(roster.iter().all(|e| e.person_id.is_none()));
    assert!(roster.iter().all(|e| e.match_method == Some(MatchMethod::Unmatched)));
}

#[test]
fn extraction_is_deterministic() {
    let doc = fixture_doc("team_page.html");
    let first = extract_roster(&doc, &mut ExtractContext::new(&doc.url));
    let second = extract_roster(&doc, &mut ExtractContext::new(&doc.url));
    assert_eq!(first, second);
}

#[derive(Default)]
struct Seen {
    blobs: Vec<String>,
    spans: Vec<String>,
    dropped: usize,
    strategies: Vec<(String, usize)>,
}

struct Recorder(Arc<Mutex<Seen>>);

impl ExtractObserver for Recorder {
    fn on_blob(&mut self, _url: &str, blob: &EmbeddedStateBlob<'_>) {
        self.0.lock().unwrap().blobs.push(blob.pattern.id().to_string());
    }

    fn on_span(&mut self, _url: &str, key: &str, _span: &str) {
        self.0.lock().unwrap().spans.push(key.to_string());
    }

    fn on_record_dropped(&mut self, _url: &str, _raw: &str, error: &ExtractError) {
        assert!(matches!(error, ExtractError::MalformedRecord { .. }));
        self.0.lock().unwrap().dropped += 1;
    }

    fn on_strategy(&mut self, _url: &str, strategy: &str, records: usize) {
        self.0
            .lock()
            .unwrap()
            .strategies
            .push((strategy.to_string(), records));
    }
}

#[test]
fn observer_sees_intermediate_state() {
    let seen = Arc::new(Mutex::new(Seen::default()));
    let doc = fixture_doc("team_page.html");
    let mut ctx = ExtractContext::with_observer(&doc.url, Box::new(Recorder(seen.clone())));
    extract_roster(&doc, &mut ctx);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.blobs, ["nuxt_closure"]);
    assert_eq!(seen.spans, ["teamMemberData"]);
    assert_eq!(seen.dropped, 1);
    assert_eq!(
        seen.strategies,
        [
            ("dom_roster".to_string(), 5),
            ("state_member_data".to_string(), 4)
        ]
    );
}

#[test]
fn parallel_extraction_matches_sequential() {
    let docs = vec![
        fixture_doc("team_page.html"),
        fixture_doc("object_state_page.html"),
        RawDocument::new("mem://empty", "<html><body></body></html>"),
    ];
    let results = extract_rosters_parallel_quiet(&docs);

    assert_eq!(results.len(), 3);
    for (doc, result) in docs.iter().zip(&results) {
        assert_eq!(result.url, doc.url);
        let sequential = extract_roster(doc, &mut ExtractContext::new(&doc.url));
        assert_eq!(result.roster, sequential);
    }
    assert_eq!(results[1].stats.strategy.as_deref(), Some("state_container_keys"));
    assert!(results[2].roster.is_empty());
}

#[test]
fn parallel_extraction_builds_an_observer_per_document() {
    let seen = Arc::new(Mutex::new(Seen::default()));
    let docs = vec![fixture_doc("team_page.html"), fixture_doc("team_page.html")];
    let factory = {
        let seen = seen.clone();
        move || Box::new(Recorder(seen.clone())) as Box<dyn ExtractObserver>
    };
    let results = extract_rosters_parallel(&docs, factory);

    assert_eq!(results.len(), 2);
    assert_eq!(seen.lock().unwrap().blobs.len(), 2);
}
