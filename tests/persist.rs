use serde_json::{Map, json};

use team_roster_scraper::persist::{SqliteStore, TeamStore, UpsertOutcome};
use team_roster_scraper::{RosterEntry, Standings, TeamRecord};

fn milan() -> TeamRecord {
    TeamRecord {
        logo: Some("https://img.example.com/team/50000716.png".to_string()),
        league: Some("意甲".to_string()),
        standings: Some(Standings {
            rank: Some(3),
            points: Some(63),
            ..Standings::default()
        }),
        ..TeamRecord::new("50000716", "AC米兰")
    }
}

#[test]
fn upserting_the_same_team_twice_keeps_one_row() {
    let mut store = SqliteStore::open_in_memory().unwrap();
    assert_eq!(store.upsert_team(&milan()).unwrap(), UpsertOutcome::Inserted);
    let first = store.find_team("AC米兰", "50000716").unwrap().unwrap();

    let mut updated = milan();
    updated.standings = Some(Standings {
        rank: Some(2),
        points: Some(66),
        ..Standings::default()
    });
    assert_eq!(store.upsert_team(&updated).unwrap(), UpsertOutcome::Updated);
    assert_eq!(store.count_teams().unwrap(), 1);

    let second = store.find_team("AC米兰", "50000716").unwrap().unwrap();
    assert_eq!(second.team, updated);
    assert_eq!(second.created_at, first.created_at);
    assert!(second.updated_at >= first.updated_at);
}

#[test]
fn same_name_different_id_is_a_different_team() {
    let mut store = SqliteStore::open_in_memory().unwrap();
    store.upsert_team(&milan()).unwrap();
    store
        .upsert_team(&TeamRecord::new("50009999", "AC米兰"))
        .unwrap();
    assert_eq!(store.count_teams().unwrap(), 2);
    assert!(store.find_team("AC米兰", "1").unwrap().is_none());
}

#[test]
fn roster_snapshot_replaces_and_skips_nameless() {
    let mut store = SqliteStore::open_in_memory().unwrap();
    store.upsert_team(&milan()).unwrap();

    let mut leao = RosterEntry::named("Rafael Leão");
    leao.person_id = Some("50001".to_string());
    let blank = RosterEntry {
        number: Some("99".to_string()),
        ..RosterEntry::named("   ")
    };
    let written = store
        .upsert_roster_for_team("50000716", &[leao.clone(), blank])
        .unwrap();
    assert_eq!(written, 1);
    assert_eq!(
        store.load_roster("50000716").unwrap(),
        Some(vec![leao.clone()])
    );

    let tomori = RosterEntry::named("Fikayo Tomori");
    store
        .upsert_roster_for_team("50000716", &[leao.clone(), tomori.clone()])
        .unwrap();
    assert_eq!(
        store.load_roster("50000716").unwrap(),
        Some(vec![leao, tomori])
    );
    assert_eq!(store.load_roster("404").unwrap(), None);
}

#[test]
fn base_info_is_attached_by_team_id() {
    let mut store = SqliteStore::open_in_memory().unwrap();
    store.upsert_team(&milan()).unwrap();

    let mut info = Map::new();
    info.insert("founded".to_string(), json!(1899));
    info.insert("venue_name".to_string(), json!("San Siro"));
    assert_eq!(store.update_team_base_info("50000716", &info).unwrap(), 1);
    assert_eq!(store.update_team_base_info("404", &info).unwrap(), 0);

    let stored = store.find_team("AC米兰", "50000716").unwrap().unwrap();
    assert_eq!(stored.base_info, Some(info));
    // Standings survive a base_info update.
    assert_eq!(stored.team.standings, milan().standings);
}

#[test]
fn load_teams_filters_by_league_in_rank_order() {
    let mut store = SqliteStore::open_in_memory().unwrap();
    let mut inter = TeamRecord::new("50001042", "国际米兰");
    inter.league = Some("意甲".to_string());
    inter.standings = Some(Standings {
        rank: Some(1),
        ..Standings::default()
    });
    let mut liverpool = TeamRecord::new("50000534", "利物浦");
    liverpool.league = Some("英超".to_string());

    store.upsert_team(&milan()).unwrap();
    store.upsert_team(&inter).unwrap();
    store.upsert_team(&liverpool).unwrap();

    let serie_a: Vec<String> = store
        .load_teams(Some("意甲"))
        .unwrap()
        .into_iter()
        .map(|t| t.team_name)
        .collect();
    assert_eq!(serie_a, ["国际米兰", "AC米兰"]);
    assert_eq!(store.load_teams(None).unwrap().len(), 3);
}

#[test]
fn file_store_reopens_with_data() {
    let dir = std::env::temp_dir().join(format!("team_roster_scraper_{}", std::process::id()));
    let path = dir.join("nested").join("teams.sqlite");
    {
        let mut store = SqliteStore::open(&path).unwrap();
        store.upsert_team(&milan()).unwrap();
    }
    let store = SqliteStore::open(&path).unwrap();
    assert_eq!(store.count_teams().unwrap(), 1);
    drop(store);
    let _ = std::fs::remove_dir_all(&dir);
}
