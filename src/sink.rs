//! Outcome sinks. Recording is fire-and-forget from the game's side: a
//! failing sink is logged and never rolls back or blocks game state.

use crate::config::SpeedTier;
use crate::kanji::{Level, Mode};
use crate::mission::Verdict;
use chrono::{DateTime, Local};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("stats database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("stats storage unavailable: {0}")]
    Io(#[from] std::io::Error),
    #[error("sink worker has shut down")]
    Disconnected,
}

/// One evaluated answer, wrong guesses and arrival misses included
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRecord {
    pub player: String,
    pub kanji_id: String,
    pub character: String,
    pub mode: Mode,
    /// empty for a miss by arrival
    pub user_answer: String,
    pub correct_answers: Vec<String>,
    pub is_correct: bool,
    pub reaction_ms: u64,
    pub timestamp: DateTime<Local>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub player: String,
    pub mode: Mode,
    pub level: Level,
    pub speed: SpeedTier,
    pub score: i64,
    pub successes: u32,
    pub attempts: u32,
    /// percent
    pub accuracy: f64,
    pub duration_secs: u64,
    pub cleared_ids: Vec<String>,
    pub verdict: Verdict,
    pub timestamp: DateTime<Local>,
}

pub trait OutcomeSink {
    fn record_attempt(&mut self, attempt: &AttemptRecord) -> Result<(), SinkError>;
    fn record_session(&mut self, summary: &SessionSummary) -> Result<(), SinkError>;
}

impl<S: OutcomeSink + ?Sized> OutcomeSink for Box<S> {
    fn record_attempt(&mut self, attempt: &AttemptRecord) -> Result<(), SinkError> {
        (**self).record_attempt(attempt)
    }

    fn record_session(&mut self, summary: &SessionSummary) -> Result<(), SinkError> {
        (**self).record_session(summary)
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl OutcomeSink for NullSink {
    fn record_attempt(&mut self, _attempt: &AttemptRecord) -> Result<(), SinkError> {
        Ok(())
    }

    fn record_session(&mut self, _summary: &SessionSummary) -> Result<(), SinkError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SinkEntry {
    Attempt(AttemptRecord),
    Session(SessionSummary),
}

/// Keeps every record in a shared buffer; clones see the same records
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<SinkEntry>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<SinkEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn attempts(&self) -> Vec<AttemptRecord> {
        self.entries()
            .into_iter()
            .filter_map(|e| match e {
                SinkEntry::Attempt(a) => Some(a),
                SinkEntry::Session(_) => None,
            })
            .collect()
    }

    pub fn sessions(&self) -> Vec<SessionSummary> {
        self.entries()
            .into_iter()
            .filter_map(|e| match e {
                SinkEntry::Session(s) => Some(s),
                SinkEntry::Attempt(_) => None,
            })
            .collect()
    }

    fn push(&self, entry: SinkEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }
}

impl OutcomeSink for MemorySink {
    fn record_attempt(&mut self, attempt: &AttemptRecord) -> Result<(), SinkError> {
        self.push(SinkEntry::Attempt(attempt.clone()));
        Ok(())
    }

    fn record_session(&mut self, summary: &SessionSummary) -> Result<(), SinkError> {
        self.push(SinkEntry::Session(summary.clone()));
        Ok(())
    }
}

/// Runs a sink on its own thread. Sends never block; failures are logged by
/// the worker. Dropping the worker drains the queue and joins the thread.
pub struct SinkWorker {
    tx: Option<Sender<SinkEntry>>,
    handle: Option<JoinHandle<()>>,
}

impl SinkWorker {
    pub fn spawn<S: OutcomeSink + Send + 'static>(mut sink: S) -> Self {
        let (tx, rx) = mpsc::channel::<SinkEntry>();
        let handle = std::thread::spawn(move || {
            for entry in rx {
                let result = match &entry {
                    SinkEntry::Attempt(a) => sink.record_attempt(a),
                    SinkEntry::Session(s) => sink.record_session(s),
                };
                if let Err(e) = result {
                    log::warn!("failed to record outcome: {e}");
                }
            }
            log::debug!("sink worker stopped");
        });
        Self {
            tx: Some(tx),
            handle: Some(handle),
        }
    }

    fn send(&self, entry: SinkEntry) -> Result<(), SinkError> {
        self.tx
            .as_ref()
            .ok_or(SinkError::Disconnected)?
            .send(entry)
            .map_err(|_| SinkError::Disconnected)
    }
}

impl OutcomeSink for SinkWorker {
    fn record_attempt(&mut self, attempt: &AttemptRecord) -> Result<(), SinkError> {
        self.send(SinkEntry::Attempt(attempt.clone()))
    }

    fn record_session(&mut self, summary: &SessionSummary) -> Result<(), SinkError> {
        self.send(SinkEntry::Session(summary.clone()))
    }
}

impl Drop for SinkWorker {
    fn drop(&mut self) {
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("sink worker panicked");
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn attempt(kanji_id: &str, is_correct: bool) -> AttemptRecord {
        AttemptRecord {
            player: "tester".to_string(),
            kanji_id: kanji_id.to_string(),
            character: "水".to_string(),
            mode: Mode::Meaning,
            user_answer: if is_correct { "water" } else { "fire" }.to_string(),
            correct_answers: vec!["water".to_string()],
            is_correct,
            reaction_ms: 1200,
            timestamp: Local::now(),
        }
    }

    pub(crate) fn summary(score: i64) -> SessionSummary {
        SessionSummary {
            player: "tester".to_string(),
            mode: Mode::Meaning,
            level: Level::N5,
            speed: SpeedTier::Normal,
            score,
            successes: 3,
            attempts: 4,
            accuracy: 75.0,
            duration_secs: 42,
            cleared_ids: vec!["n5-001".into(), "n5-002".into(), "n5-003".into()],
            verdict: Verdict::Win,
            timestamp: Local::now(),
        }
    }

    struct FailingSink;

    impl OutcomeSink for FailingSink {
        fn record_attempt(&mut self, _attempt: &AttemptRecord) -> Result<(), SinkError> {
            Err(SinkError::Disconnected)
        }

        fn record_session(&mut self, _summary: &SessionSummary) -> Result<(), SinkError> {
            Err(SinkError::Disconnected)
        }
    }

    #[test]
    fn memory_sink_clones_share_records() {
        let sink = MemorySink::new();
        let mut writer = sink.clone();
        writer.record_attempt(&attempt("n5-001", true)).unwrap();
        writer.record_session(&summary(300)).unwrap();

        assert_eq!(sink.attempts().len(), 1);
        assert_eq!(sink.sessions()[0].score, 300);
        assert_eq!(sink.entries().len(), 2);
    }

    #[test]
    fn worker_delivers_in_order_before_drop_returns() {
        let sink = MemorySink::new();
        let mut worker = SinkWorker::spawn(sink.clone());
        for i in 0..50 {
            worker
                .record_attempt(&attempt(&format!("n5-{i:03}"), i % 2 == 0))
                .unwrap();
        }
        worker.record_session(&summary(100)).unwrap();
        drop(worker);

        let entries = sink.entries();
        assert_eq!(entries.len(), 51);
        match &entries[7] {
            SinkEntry::Attempt(a) => assert_eq!(a.kanji_id, "n5-007"),
            other => panic!("unexpected entry {other:?}"),
        }
        assert!(matches!(entries.last(), Some(SinkEntry::Session(_))));
    }

    #[test]
    fn worker_swallows_sink_failures() {
        let mut worker = SinkWorker::spawn(FailingSink);
        assert!(worker.record_attempt(&attempt("n5-001", true)).is_ok());
        assert!(worker.record_session(&summary(0)).is_ok());
    }

    #[test]
    fn boxed_sink_forwards() {
        let sink = MemorySink::new();
        let mut boxed: Box<dyn OutcomeSink + Send> = Box::new(sink.clone());
        boxed.record_attempt(&attempt("n5-001", false)).unwrap();
        assert_eq!(sink.attempts().len(), 1);
    }
}
