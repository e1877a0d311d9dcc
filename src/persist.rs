use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use tracing::debug;

use crate::model::{BaseInfo, RosterEntry, Standings, TeamRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// A team row as stored, with its bookkeeping timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTeam {
    pub team: TeamRecord,
    pub base_info: Option<BaseInfo>,
    pub created_at: String,
    pub updated_at: String,
}

/// Document store the crawler writes into.
///
/// `(team_name, team_id)` is the team key; writing an existing key updates it.
pub trait TeamStore {
    fn upsert_team(&mut self, team: &TeamRecord) -> Result<UpsertOutcome>;
    /// Replaces the team's roster snapshot; returns how many entries were kept.
    fn upsert_roster_for_team(&mut self, team_id: &str, roster: &[RosterEntry]) -> Result<usize>;
    /// Returns how many team rows were touched.
    fn update_team_base_info(&mut self, team_id: &str, info: &BaseInfo) -> Result<usize>;
    fn find_team(&self, team_name: &str, team_id: &str) -> Result<Option<StoredTeam>>;
    fn load_teams(&self, league: Option<&str>) -> Result<Vec<TeamRecord>>;
    fn load_roster(&self, team_id: &str) -> Result<Option<Vec<RosterEntry>>>;
    fn count_teams(&self) -> Result<usize>;
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)
            .with_context(|| format!("open sqlite db {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .context("enable wal")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self { conn })
    }
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS teams (
            team_name TEXT NOT NULL,
            team_id TEXT NOT NULL,
            team_logo TEXT NULL,
            scheme TEXT NULL,
            league TEXT NULL,
            rank INTEGER NULL,
            points INTEGER NULL,
            played INTEGER NULL,
            won INTEGER NULL,
            drawn INTEGER NULL,
            lost INTEGER NULL,
            goals_for INTEGER NULL,
            goals_against INTEGER NULL,
            base_info_json TEXT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (team_name, team_id)
        );
        CREATE INDEX IF NOT EXISTS idx_teams_team_id ON teams(team_id);
        CREATE INDEX IF NOT EXISTS idx_teams_league ON teams(league);

        CREATE TABLE IF NOT EXISTS rosters (
            team_id TEXT PRIMARY KEY,
            members_json TEXT NOT NULL,
            member_count INTEGER NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

const TEAM_COLUMNS: &str = "team_name, team_id, team_logo, scheme, league, rank, points, played, \
     won, drawn, lost, goals_for, goals_against";

impl TeamStore for SqliteStore {
    fn upsert_team(&mut self, team: &TeamRecord) -> Result<UpsertOutcome> {
        let tx = self.conn.transaction().context("begin team upsert")?;
        let existed = tx
            .query_row(
                "SELECT 1 FROM teams WHERE team_name = ?1 AND team_id = ?2",
                params![team.team_name, team.team_id],
                |_| Ok(()),
            )
            .optional()
            .context("check existing team")?
            .is_some();

        let s = team.standings.clone().unwrap_or_default();
        let now = Utc::now().to_rfc3339();
        tx.execute(
            r#"
            INSERT INTO teams (
                team_name, team_id, team_logo, scheme, league,
                rank, points, played, won, drawn, lost, goals_for, goals_against,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                ?14, ?14
            )
            ON CONFLICT(team_name, team_id) DO UPDATE SET
                team_logo = excluded.team_logo,
                scheme = excluded.scheme,
                league = excluded.league,
                rank = excluded.rank,
                points = excluded.points,
                played = excluded.played,
                won = excluded.won,
                drawn = excluded.drawn,
                lost = excluded.lost,
                goals_for = excluded.goals_for,
                goals_against = excluded.goals_against,
                updated_at = excluded.updated_at
            "#,
            params![
                team.team_name,
                team.team_id,
                team.logo,
                team.scheme,
                team.league,
                s.rank,
                s.points,
                s.played,
                s.won,
                s.drawn,
                s.lost,
                s.goals_for,
                s.goals_against,
                now,
            ],
        )
        .context("upsert team")?;
        tx.commit().context("commit team upsert")?;

        let outcome = if existed {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        };
        debug!(team = %team.team_name, id = %team.team_id, ?outcome, "team stored");
        Ok(outcome)
    }

    fn upsert_roster_for_team(&mut self, team_id: &str, roster: &[RosterEntry]) -> Result<usize> {
        let valid: Vec<&RosterEntry> = roster.iter().filter(|e| e.is_valid()).collect();
        if valid.len() < roster.len() {
            debug!(
                team_id,
                dropped = roster.len() - valid.len(),
                "nameless roster entries not stored"
            );
        }
        let json = serde_json::to_string(&valid).context("serialize roster")?;
        self.conn
            .execute(
                r#"
                INSERT INTO rosters (team_id, members_json, member_count, updated_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(team_id) DO UPDATE SET
                    members_json = excluded.members_json,
                    member_count = excluded.member_count,
                    updated_at = excluded.updated_at
                "#,
                params![team_id, json, valid.len() as i64, Utc::now().to_rfc3339()],
            )
            .context("upsert roster")?;
        Ok(valid.len())
    }

    fn update_team_base_info(&mut self, team_id: &str, info: &BaseInfo) -> Result<usize> {
        let json = serde_json::to_string(info).context("serialize base_info")?;
        let touched = self
            .conn
            .execute(
                "UPDATE teams SET base_info_json = ?1, updated_at = ?2 WHERE team_id = ?3",
                params![json, Utc::now().to_rfc3339(), team_id],
            )
            .context("update base_info")?;
        Ok(touched)
    }

    fn find_team(&self, team_name: &str, team_id: &str) -> Result<Option<StoredTeam>> {
        let sql = format!(
            "SELECT {TEAM_COLUMNS}, base_info_json, created_at, updated_at
             FROM teams WHERE team_name = ?1 AND team_id = ?2"
        );
        let row = self
            .conn
            .query_row(&sql, params![team_name, team_id], |row| {
                Ok((
                    team_from_row(row)?,
                    row.get::<_, Option<String>>(13)?,
                    row.get::<_, String>(14)?,
                    row.get::<_, String>(15)?,
                ))
            })
            .optional()
            .context("query team")?;
        let Some((team, base_info_json, created_at, updated_at)) = row else {
            return Ok(None);
        };
        let base_info = match base_info_json {
            Some(raw) => Some(serde_json::from_str(&raw).context("decode base_info")?),
            None => None,
        };
        Ok(Some(StoredTeam {
            team,
            base_info,
            created_at,
            updated_at,
        }))
    }

    fn load_teams(&self, league: Option<&str>) -> Result<Vec<TeamRecord>> {
        let sql = format!(
            "SELECT {TEAM_COLUMNS} FROM teams
             WHERE ?1 IS NULL OR league = ?1
             ORDER BY league, rank IS NULL, rank, team_name"
        );
        let mut stmt = self.conn.prepare(&sql).context("prepare load teams query")?;
        let rows = stmt
            .query_map(params![league], team_from_row)
            .context("query load teams")?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("decode team row")?);
        }
        Ok(out)
    }

    fn load_roster(&self, team_id: &str) -> Result<Option<Vec<RosterEntry>>> {
        let raw = self
            .conn
            .query_row(
                "SELECT members_json FROM rosters WHERE team_id = ?1",
                params![team_id],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .context("query roster")?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw).context("decode roster")?)),
            None => Ok(None),
        }
    }

    fn count_teams(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM teams", [], |row| row.get(0))
            .context("count teams")?;
        Ok(n as usize)
    }
}

fn team_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TeamRecord> {
    let standings = Standings {
        rank: row.get(5)?,
        points: row.get(6)?,
        played: row.get(7)?,
        won: row.get(8)?,
        drawn: row.get(9)?,
        lost: row.get(10)?,
        goals_for: row.get(11)?,
        goals_against: row.get(12)?,
    };
    Ok(TeamRecord {
        team_name: row.get(0)?,
        team_id: row.get(1)?,
        logo: row.get(2)?,
        scheme: row.get(3)?,
        league: row.get(4)?,
        standings: (!standings.is_empty()).then_some(standings),
    })
}
