use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{SyncError, SyncResult};

pub mod models;
use models::*;

/// Write side of the match collection, as seen by the sync scheduler.
pub trait MatchStore: Send + Sync {
    /// Replace-or-insert the full record keyed by `match_id`.
    fn upsert(&self, record: &Match) -> SyncResult<()>;
}

/// Thread-safe SQLite connection pool (single connection with mutex)
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the SQLite database at the given path
    pub fn open(path: &str) -> SyncResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::from_connection(conn)
    }

    /// Private in-memory database, used by tests and `--database-path :memory:`
    pub fn open_in_memory() -> SyncResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> SyncResult<Self> {
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Run schema migrations (idempotent)
    fn run_migrations(&self) -> SyncResult<()> {
        self.conn()?.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    fn conn(&self) -> SyncResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| SyncError::Storage("connection mutex poisoned".to_string()))
    }

    // ── Writes ────────────────────────────────────────────────────────────────

    /// Upsert a match. Every column is overwritten, so fields missing from the
    /// latest feed record become NULL rather than keeping stale values.
    pub fn upsert_match(&self, m: &Match) -> SyncResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO matches (
                match_id, league_id, league_name, league_logo, league_country,
                home_team, away_team, home_logo, away_logo,
                home_score, away_score, status, date, synced_at
             ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14)
             ON CONFLICT(match_id) DO UPDATE SET
                league_id=excluded.league_id,
                league_name=excluded.league_name,
                league_logo=excluded.league_logo,
                league_country=excluded.league_country,
                home_team=excluded.home_team,
                away_team=excluded.away_team,
                home_logo=excluded.home_logo,
                away_logo=excluded.away_logo,
                home_score=excluded.home_score,
                away_score=excluded.away_score,
                status=excluded.status,
                date=excluded.date,
                synced_at=excluded.synced_at",
            params![
                m.match_id,
                m.league_id,
                m.league_name,
                m.league_logo,
                m.league_country,
                m.home_team,
                m.away_team,
                m.home_logo,
                m.away_logo,
                m.home_score,
                m.away_score,
                m.status,
                m.date,
                Utc::now(),
            ],
        )?;
        Ok(())
    }

    // ── Reads ─────────────────────────────────────────────────────────────────

    pub fn get_match(&self, match_id: &str) -> SyncResult<Option<StoredMatch>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {MATCH_COLUMNS} FROM matches WHERE match_id = ?1"),
                params![match_id],
                map_match,
            )
            .optional()?;
        Ok(row)
    }

    /// All stored matches, soonest kickoff first (undated last)
    pub fn list_matches(&self) -> SyncResult<Vec<StoredMatch>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {MATCH_COLUMNS} FROM matches ORDER BY {MATCH_ORDER}"
        ))?;
        let matches = stmt
            .query_map([], map_match)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(matches)
    }

    /// Matches whose status code falls in the given bucket
    pub fn list_matches_by_state(&self, state: MatchState) -> SyncResult<Vec<StoredMatch>> {
        let (op, codes): (&str, Vec<&str>) = match state {
            MatchState::Other => (
                "NOT IN",
                [MatchState::Upcoming, MatchState::Live, MatchState::Finished]
                    .iter()
                    .flat_map(|s| s.status_codes().iter().copied())
                    .collect(),
            ),
            _ => ("IN", state.status_codes().to_vec()),
        };
        let placeholders = vec!["?"; codes.len()].join(",");
        let sql = format!(
            "SELECT {MATCH_COLUMNS} FROM matches
             WHERE UPPER(TRIM(status)) {op} ({placeholders})
             ORDER BY {MATCH_ORDER}"
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let matches = stmt
            .query_map(params_from_iter(codes), map_match)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(matches)
    }

    pub fn count_matches(&self) -> SyncResult<i64> {
        let conn = self.conn()?;
        let n = conn.query_row("SELECT COUNT(*) FROM matches", [], |r| r.get(0))?;
        Ok(n)
    }
}

impl MatchStore for Database {
    fn upsert(&self, record: &Match) -> SyncResult<()> {
        self.upsert_match(record)
    }
}

// ── SQL helpers ────────────────────────────────────────────────────────────────

const MATCH_COLUMNS: &str = "match_id, league_id, league_name, league_logo, league_country,
    home_team, away_team, home_logo, away_logo,
    home_score, away_score, status, date, synced_at";

const MATCH_ORDER: &str = "date IS NULL, date ASC, match_id ASC";

fn map_match(row: &rusqlite::Row) -> rusqlite::Result<StoredMatch> {
    Ok(StoredMatch {
        record: Match {
            match_id: row.get(0)?,
            league_id: row.get(1)?,
            league_name: row.get(2)?,
            league_logo: row.get(3)?,
            league_country: row.get(4)?,
            home_team: row.get(5)?,
            away_team: row.get(6)?,
            home_logo: row.get(7)?,
            away_logo: row.get(8)?,
            home_score: row.get(9)?,
            away_score: row.get(10)?,
            status: row.get(11)?,
            date: row.get(12)?,
        },
        synced_at: row.get(13)?,
    })
}

/// SQLite schema (idempotent CREATE IF NOT EXISTS)
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS matches (
    match_id        TEXT    PRIMARY KEY CHECK (length(trim(match_id)) > 0),
    league_id       TEXT,
    league_name     TEXT,
    league_logo     TEXT,
    league_country  TEXT,
    home_team       TEXT,
    away_team       TEXT,
    home_logo       TEXT,
    away_logo       TEXT,
    home_score      INTEGER,
    away_score      INTEGER,
    status          TEXT    NOT NULL DEFAULT '',
    date            TEXT,
    synced_at       TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_matches_status ON matches(status);
CREATE INDEX IF NOT EXISTS idx_matches_date ON matches(date);
"#;
