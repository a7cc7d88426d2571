use crate::app_dirs::AppDirs;
use crate::sink::{AttemptRecord, OutcomeSink, SessionSummary, SinkError};
use chrono::{DateTime, Local};
use rusqlite::{params, Connection, Result};
use std::path::{Path, PathBuf};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS attempts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        player TEXT NOT NULL,
        kanji_id TEXT NOT NULL,
        character TEXT NOT NULL,
        mode TEXT NOT NULL,
        user_answer TEXT NOT NULL,
        correct_answers TEXT NOT NULL,
        is_correct BOOLEAN NOT NULL,
        reaction_ms INTEGER NOT NULL,
        timestamp TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_attempts_player_kanji ON attempts(player, kanji_id);

    CREATE TABLE IF NOT EXISTS sessions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        player TEXT NOT NULL,
        mode TEXT NOT NULL,
        level TEXT NOT NULL,
        speed TEXT NOT NULL,
        score INTEGER NOT NULL,
        successes INTEGER NOT NULL,
        attempts INTEGER NOT NULL,
        accuracy REAL NOT NULL,
        duration_secs INTEGER NOT NULL,
        cleared_ids TEXT NOT NULL,
        verdict TEXT NOT NULL,
        timestamp TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_sessions_player_timestamp ON sessions(player, timestamp);
"#;

/// A stored session as read back for `--history`
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRow {
    pub mode: String,
    pub level: String,
    pub speed: String,
    pub score: i64,
    pub successes: u32,
    pub attempts: u32,
    pub accuracy: f64,
    pub duration_secs: u64,
    pub cleared: usize,
    pub verdict: String,
    pub timestamp: DateTime<Local>,
}

/// Per-kanji totals across all sessions of a player
#[derive(Debug, Clone, PartialEq)]
pub struct KanjiSummary {
    pub kanji_id: String,
    pub character: String,
    pub attempts: i64,
    pub misses: i64,
    pub avg_reaction_ms: Option<f64>,
}

impl KanjiSummary {
    pub fn miss_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.misses as f64 / self.attempts as f64 * 100.0
        }
    }
}

/// SQLite-backed outcome store
#[derive(Debug)]
pub struct StatsDb {
    conn: Connection,
}

impl StatsDb {
    /// Open the database in the state directory
    pub fn new() -> std::result::Result<Self, SinkError> {
        let path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("kanji_cockpit_stats.db"));
        Self::open(path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> std::result::Result<Self, SinkError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Ok(Self::init(conn)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(StatsDb { conn })
    }

    pub fn insert_attempt(&self, attempt: &AttemptRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO attempts
            (player, kanji_id, character, mode, user_answer, correct_answers, is_correct, reaction_ms, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                attempt.player,
                attempt.kanji_id,
                attempt.character,
                attempt.mode.to_string(),
                attempt.user_answer,
                attempt.correct_answers.join(", "),
                attempt.is_correct,
                attempt.reaction_ms,
                attempt.timestamp.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn insert_session(&self, summary: &SessionSummary) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO sessions
            (player, mode, level, speed, score, successes, attempts, accuracy, duration_secs, cleared_ids, verdict, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                summary.player,
                summary.mode.to_string(),
                summary.level.to_string(),
                summary.speed.to_string(),
                summary.score,
                summary.successes,
                summary.attempts,
                summary.accuracy,
                summary.duration_secs,
                summary.cleared_ids.join(","),
                summary.verdict.to_string(),
                summary.timestamp.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Most recent sessions first
    pub fn recent_sessions(&self, player: &str, limit: usize) -> Result<Vec<SessionRow>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT mode, level, speed, score, successes, attempts, accuracy,
                   duration_secs, cleared_ids, verdict, timestamp
            FROM sessions
            WHERE player = ?1
            ORDER BY timestamp DESC, id DESC
            LIMIT ?2
            "#,
        )?;

        let rows = stmt.query_map(params![player, limit as i64], |row| {
            let cleared: String = row.get(8)?;
            Ok(SessionRow {
                mode: row.get(0)?,
                level: row.get(1)?,
                speed: row.get(2)?,
                score: row.get(3)?,
                successes: row.get(4)?,
                attempts: row.get(5)?,
                accuracy: row.get(6)?,
                duration_secs: row.get(7)?,
                cleared: cleared.split(',').filter(|s| !s.is_empty()).count(),
                verdict: row.get(9)?,
                timestamp: parse_timestamp(row, 10)?,
            })
        })?;

        rows.collect()
    }

    /// Kanji ordered by misses, worst first
    pub fn kanji_summary(&self, player: &str) -> Result<Vec<KanjiSummary>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT
                kanji_id,
                character,
                COUNT(*) as total_attempts,
                SUM(CASE WHEN is_correct = 0 THEN 1 ELSE 0 END) as misses,
                AVG(CASE WHEN is_correct = 1 THEN reaction_ms END) as avg_reaction
            FROM attempts
            WHERE player = ?1
            GROUP BY kanji_id, character
            ORDER BY misses DESC, kanji_id
            "#,
        )?;

        let rows = stmt.query_map([player], |row| {
            Ok(KanjiSummary {
                kanji_id: row.get(0)?,
                character: row.get(1)?,
                attempts: row.get(2)?,
                misses: row.get(3)?,
                avg_reaction_ms: row.get(4)?,
            })
        })?;

        rows.collect()
    }

    pub fn clear_all(&self) -> Result<()> {
        self.conn
            .execute_batch("DELETE FROM attempts; DELETE FROM sessions;")
    }
}

fn parse_timestamp(row: &rusqlite::Row<'_>, idx: usize) -> Result<DateTime<Local>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Local))
        .map_err(|_| {
            rusqlite::Error::InvalidColumnType(idx, "timestamp".to_string(), rusqlite::types::Type::Text)
        })
}

impl OutcomeSink for StatsDb {
    fn record_attempt(&mut self, attempt: &AttemptRecord) -> std::result::Result<(), SinkError> {
        Ok(self.insert_attempt(attempt)?)
    }

    fn record_session(&mut self, summary: &SessionSummary) -> std::result::Result<(), SinkError> {
        Ok(self.insert_session(summary)?)
    }
}
