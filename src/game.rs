//! Mission orchestration: selector → round → mission → sink.
//!
//! The host calls [`Game::on_frame`] once per frame with a monotonic
//! timestamp and forwards player actions through the other methods. Nothing
//! here blocks on persistence; sink failures are logged and dropped.

use crate::answer;
use crate::config::{Settings, SpeedTier};
use crate::kanji::selector::eligible;
use crate::kanji::{Catalog, KanjiEntry, KanjiSelector, Level, Mode};
use crate::mission::{EndReason, MissionController, MissionEvent, MissionState, Verdict};
use crate::round::{OutcomeKind, RoundConfig, RoundError, RoundMachine, RoundNotice, RoundOutcome, RoundView};
use crate::sink::{AttemptRecord, NullSink, OutcomeSink, SessionSummary};
use crate::trajectory::TrajectoryGenerator;
use chrono::Local;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum GameError {
    #[error(transparent)]
    Round(#[from] RoundError),
}

/// Everything the presentation layer needs for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameView {
    /// `None` when no round is live or resolving
    pub round: Option<RoundView>,
    pub score: i64,
    pub successes: u32,
    pub target: Option<u32>,
    pub failures: u32,
    pub error_budget: Option<u32>,
    pub attempts: u32,
    pub cleared: usize,
    pub pool_size: usize,
    pub paused: bool,
    pub verdict: Verdict,
    pub end_reason: Option<EndReason>,
    pub mode: Mode,
    pub level: Level,
    pub speed: SpeedTier,
}

pub struct Game {
    settings: Settings,
    catalog: Catalog,
    selector: Box<dyn KanjiSelector>,
    round: RoundMachine,
    mission: MissionController,
    sink: Box<dyn OutcomeSink>,
    rng: Box<dyn RngCore>,
    started_at: Option<Duration>,
    paused: bool,
    summary_recorded: bool,
    last_missed: Option<KanjiEntry>,
}

impl Game {
    pub fn new(
        settings: Settings,
        catalog: Catalog,
        mut rng: Box<dyn RngCore>,
        sink: Box<dyn OutcomeSink>,
    ) -> Self {
        let pool_size = eligible(&catalog, settings.level, settings.mode, &BTreeSet::new()).count();
        let round_config = RoundConfig {
            generator: TrajectoryGenerator::new(settings.mobile),
            ..RoundConfig::new(settings.round_duration(), settings.mode)
        };
        // trajectories draw from their own stream
        let round_rng = ChaCha8Rng::seed_from_u64(rng.next_u64());

        Self {
            selector: settings.selection.build(settings.level, settings.mode),
            round: RoundMachine::new(round_config, Box::new(round_rng)),
            mission: MissionController::new(settings.mission_rules(), pool_size),
            settings,
            catalog,
            sink,
            rng,
            started_at: None,
            paused: false,
            summary_recorded: false,
            last_missed: None,
        }
    }

    /// Start the mission and deliver the first kanji
    pub fn begin(&mut self, now: Duration) -> Result<Vec<RoundNotice>, GameError> {
        if self.started_at.is_some() {
            return Ok(Vec::new());
        }
        self.started_at = Some(now);
        log::info!(
            "mission start: player={} level={} mode={} speed={} pool={}",
            self.settings.player,
            self.settings.level,
            self.settings.mode,
            self.settings.speed,
            self.mission.state().pool_size
        );
        let mut notices = Vec::new();
        self.deliver_next(now, &mut notices)?;
        Ok(notices)
    }

    pub fn on_frame(&mut self, now: Duration) -> Result<Vec<RoundNotice>, GameError> {
        if self.started_at.is_none() || self.paused {
            return Ok(Vec::new());
        }
        let mut notices = Vec::new();
        let produced = self.round.on_frame(now);
        self.handle_notices(produced, now, &mut notices)?;
        Ok(notices)
    }

    pub fn submit_answer(&mut self, text: &str) {
        if self.paused || self.mission.state().is_over() {
            return;
        }
        self.round.submit_answer(text);
    }

    pub fn pause(&mut self, now: Duration) {
        if self.paused || self.started_at.is_none() || self.is_finished() {
            return;
        }
        self.paused = true;
        self.round.set_paused(true, now);
        log::debug!("paused");
    }

    pub fn resume(&mut self, now: Duration) {
        if !self.paused {
            return;
        }
        self.paused = false;
        self.round.set_paused(false, now);
        log::debug!("resumed");
    }

    pub fn toggle_pause(&mut self, now: Duration) {
        if self.paused {
            self.resume(now);
        } else {
            self.pause(now);
        }
    }

    /// Leave the mission: cancel pending timers, settle any hit still in its
    /// resolution window, and record the session if anything was attempted.
    pub fn return_to_menu(&mut self, now: Duration) {
        let flushed = self.round.cancel();
        self.paused = false;
        for notice in flushed {
            if let RoundNotice::Outcome(outcome) = notice {
                self.apply_outcome(&outcome);
            }
        }
        if self.summary_recorded {
            return;
        }
        if !self.mission.state().is_over() {
            self.mission.on_event(&MissionEvent::Abandon);
        }
        if self.mission.state().attempts > 0 {
            self.record_summary(now);
        } else {
            self.summary_recorded = true;
        }
    }

    fn handle_notices(
        &mut self,
        produced: Vec<RoundNotice>,
        now: Duration,
        notices: &mut Vec<RoundNotice>,
    ) -> Result<(), GameError> {
        for notice in produced {
            match &notice {
                RoundNotice::Rejected { answer } => self.apply_wrong_answer(answer),
                RoundNotice::Outcome(outcome) => self.apply_outcome(outcome),
                RoundNotice::Started { .. } | RoundNotice::Exploding { .. } | RoundNotice::Ready => {}
            }
            let ready = matches!(notice, RoundNotice::Ready);
            notices.push(notice);
            if ready {
                self.deliver_next(now, notices)?;
            }
        }

        if self.mission.state().is_over() {
            // a strict-penalty loss can land while the kanji is still falling
            if self.round.accepts_input() {
                self.round.cancel();
            }
            self.record_summary(now);
        }
        Ok(())
    }

    fn deliver_next(&mut self, now: Duration, notices: &mut Vec<RoundNotice>) -> Result<(), GameError> {
        if self.mission.state().is_over() {
            self.record_summary(now);
            return Ok(());
        }
        let excluded = &self.mission.state().cleared;
        match self
            .selector
            .next_kanji(&self.catalog, excluded, self.rng.as_mut())
        {
            Some(kanji) => {
                let started = self.round.start(kanji, now).map_err(|e| {
                    log::error!("round delivery out of order: {e}");
                    e
                })?;
                notices.extend(started);
            }
            None => {
                log::info!("no kanji left at level {}", self.settings.level);
                self.mission.on_event(&MissionEvent::PoolExhausted);
                self.record_summary(now);
            }
        }
        Ok(())
    }

    fn apply_wrong_answer(&mut self, answer: &str) {
        debug_assert!(self.round.seed().is_some(), "rejected answer without a live round");
        let Some(seed) = self.round.seed() else {
            log::error!("wrong answer {answer:?} reported without a live round");
            return;
        };
        let record = self.attempt_record(&seed.kanji, answer, false, self.round.elapsed());
        self.record_attempt(&record);
        self.mission.on_event(&MissionEvent::WrongAnswer);
    }

    fn apply_outcome(&mut self, outcome: &RoundOutcome) {
        let record = self.attempt_record(&outcome.kanji, &outcome.answer, outcome.correct, outcome.reaction);
        self.record_attempt(&record);
        if outcome.kind == OutcomeKind::Missed {
            self.last_missed = Some(outcome.kanji.clone());
        }
        self.mission.on_outcome(outcome);
    }

    fn attempt_record(&self, kanji: &KanjiEntry, answer: &str, is_correct: bool, reaction: Duration) -> AttemptRecord {
        AttemptRecord {
            player: self.settings.player.clone(),
            kanji_id: kanji.id.clone(),
            character: kanji.character.clone(),
            mode: self.settings.mode,
            user_answer: answer.to_string(),
            correct_answers: answer::expected_answers(kanji, self.settings.mode),
            is_correct,
            reaction_ms: u64::try_from(reaction.as_millis()).unwrap_or(u64::MAX),
            timestamp: Local::now(),
        }
    }

    fn record_attempt(&mut self, record: &AttemptRecord) {
        if let Err(e) = self.sink.record_attempt(record) {
            log::warn!("attempt for {} not recorded: {e}", record.kanji_id);
        }
    }

    fn record_summary(&mut self, now: Duration) {
        if self.summary_recorded {
            return;
        }
        self.summary_recorded = true;

        let state = self.mission.state();
        let summary = SessionSummary {
            player: self.settings.player.clone(),
            mode: self.settings.mode,
            level: self.settings.level,
            speed: self.settings.speed,
            score: state.score,
            successes: state.successes,
            attempts: state.attempts,
            accuracy: state.accuracy(),
            duration_secs: self
                .started_at
                .map_or(0, |start| now.saturating_sub(start).as_secs()),
            cleared_ids: state.cleared.iter().cloned().collect(),
            verdict: state.verdict(),
            timestamp: Local::now(),
        };
        if let Err(e) = self.sink.record_session(&summary) {
            log::warn!("session summary not recorded: {e}");
        }
    }

    pub fn view(&self) -> FrameView {
        let state = self.mission.state();
        FrameView {
            round: self.round.view(),
            score: state.score,
            successes: state.successes,
            target: self.mission.target(),
            failures: state.failures,
            error_budget: self.mission.rules().error_budget,
            attempts: state.attempts,
            cleared: state.cleared.len(),
            pool_size: state.pool_size,
            paused: self.paused,
            verdict: state.verdict(),
            end_reason: state.end,
            mode: self.settings.mode,
            level: self.settings.level,
            speed: self.settings.speed,
        }
    }

    /// Mission decided and the last resolution window has played out
    pub fn is_finished(&self) -> bool {
        self.mission.state().is_over() && self.round.is_idle()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn mission(&self) -> &MissionState {
        self.mission.state()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Most recent kanji that reached the cockpit
    pub fn last_missed(&self) -> Option<&KanjiEntry> {
        self.last_missed.as_ref()
    }

    /// Fresh mission with the same settings and sink
    pub fn reset(&mut self, rng: Box<dyn RngCore>) {
        let sink = std::mem::replace(&mut self.sink, Box::new(NullSink));
        *self = Game::new(self.settings.clone(), self.catalog.clone(), rng, sink);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mission::Penalty;
    use crate::round::PhaseTag;
    use crate::sink::MemorySink;
    use assert_matches::assert_matches;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn catalog() -> Catalog {
        Catalog::from_json(
            r#"[
                {"id": "a", "character": "一", "meanings": ["one"], "group": "N5"},
                {"id": "b", "character": "二", "meanings": ["two"], "group": "N5"},
                {"id": "c", "character": "三", "meanings": ["three"], "group": "N5"}
            ]"#,
        )
        .unwrap()
    }

    fn settings(target: Option<u32>, budget: Option<u32>) -> Settings {
        Settings {
            player: "tester".into(),
            mission_target: target,
            error_budget: budget,
            ..Settings::default()
        }
    }

    fn game(settings: Settings) -> (Game, MemorySink) {
        let sink = MemorySink::new();
        let game = Game::new(
            settings,
            catalog(),
            Box::new(ChaCha8Rng::seed_from_u64(42)),
            Box::new(sink.clone()),
        );
        (game, sink)
    }

    fn current_answer(game: &Game) -> String {
        let id = game.view().round.unwrap().kanji_id;
        match id.as_str() {
            "a" => "one",
            "b" => "two",
            _ => "three",
        }
        .to_string()
    }

    /// Answer correctly and play out the resolution window
    fn clear_round(game: &mut Game, now: &mut u64) {
        let answer = current_answer(game);
        game.submit_answer(&answer);
        *now += 16;
        game.on_frame(ms(*now)).unwrap();
        *now += 600;
        game.on_frame(ms(*now)).unwrap();
    }

    #[test]
    fn test_begin_delivers_first_round() {
        let (mut g, _) = game(settings(Some(2), Some(3)));
        assert!(g.view().round.is_none());

        let notices = g.begin(ms(0)).unwrap();
        assert_matches!(notices.as_slice(), [RoundNotice::Started { .. }]);
        let view = g.view();
        assert_eq!(view.round.unwrap().phase, PhaseTag::Falling);
        assert_eq!(view.pool_size, 3);
        assert_eq!(view.verdict, Verdict::Ongoing);
    }

    #[test]
    fn test_target_win_records_attempts_and_summary() {
        let (mut g, sink) = game(settings(Some(2), Some(3)));
        g.begin(ms(0)).unwrap();
        let mut now = 0;

        clear_round(&mut g, &mut now);
        assert!(!g.is_finished());
        clear_round(&mut g, &mut now);

        assert!(g.is_finished());
        let view = g.view();
        assert_eq!(view.verdict, Verdict::Win);
        assert_eq!(view.score, 200);
        assert_eq!(view.end_reason, Some(EndReason::TargetReached));

        assert_eq!(sink.attempts().len(), 2);
        assert!(sink.attempts().iter().all(|a| a.is_correct));
        let sessions = sink.sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].successes, 2);
        assert_eq!(sessions[0].cleared_ids.len(), 2);
    }

    #[test]
    fn test_cleared_kanji_not_repeated() {
        let (mut g, _) = game(settings(None, None));
        g.begin(ms(0)).unwrap();
        let mut now = 0;
        let mut seen = BTreeSet::new();

        for _ in 0..3 {
            seen.insert(g.view().round.unwrap().kanji_id);
            clear_round(&mut g, &mut now);
        }

        assert_eq!(seen.len(), 3);
        assert_eq!(g.view().end_reason, Some(EndReason::PoolCleared));
        assert_eq!(g.view().verdict, Verdict::Win);
    }

    #[test]
    fn test_arrival_records_miss_and_loses_budget() {
        let (mut g, sink) = game(settings(Some(5), Some(1)));
        g.begin(ms(0)).unwrap();
        let kanji = g.view().round.unwrap().kanji_id;

        let notices = g.on_frame(ms(5001)).unwrap();
        assert!(notices
            .iter()
            .any(|n| matches!(n, RoundNotice::Outcome(o) if o.kind == OutcomeKind::Missed)));
        assert_eq!(g.view().verdict, Verdict::Loss);
        // mission decided, cockpit-hit window still playing
        assert!(!g.is_finished());

        g.on_frame(ms(5600)).unwrap();
        assert!(g.is_finished());
        assert!(g.view().round.is_none());
        assert_eq!(g.last_missed().unwrap().id, kanji);

        let attempts = sink.attempts();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].user_answer, "");
        assert!(!attempts[0].is_correct);
        assert_eq!(sink.sessions().len(), 1);
    }

    #[test]
    fn test_wrong_answers_are_attempts() {
        let (mut g, sink) = game(settings(Some(5), Some(3)));
        g.begin(ms(0)).unwrap();

        g.submit_answer("nope");
        g.on_frame(ms(16)).unwrap();
        g.submit_answer("still no");
        g.on_frame(ms(32)).unwrap();

        let view = g.view();
        assert_eq!(view.attempts, 2);
        assert_eq!(view.failures, 0);
        assert_eq!(view.round.unwrap().phase, PhaseTag::Falling);
        assert_eq!(sink.attempts().len(), 2);
        assert_eq!(sink.attempts()[0].correct_answers.len(), 1);
    }

    #[test]
    fn test_strict_penalty_can_end_mid_round() {
        let mut s = settings(Some(5), Some(1));
        s.penalty = Penalty::Strict;
        let (mut g, sink) = game(s);
        g.begin(ms(0)).unwrap();

        g.submit_answer("nope");
        g.on_frame(ms(16)).unwrap();

        assert_eq!(g.view().verdict, Verdict::Loss);
        assert_eq!(g.view().score, -50);
        assert!(g.is_finished());
        assert_eq!(sink.sessions().len(), 1);
    }

    #[test]
    fn test_pause_blocks_input_and_time() {
        let (mut g, _) = game(settings(Some(5), Some(3)));
        g.begin(ms(0)).unwrap();
        g.on_frame(ms(1000)).unwrap();

        g.toggle_pause(ms(1000));
        assert!(g.view().paused);
        g.submit_answer(&current_answer(&g));
        assert!(g.on_frame(ms(20_000)).unwrap().is_empty());

        g.toggle_pause(ms(20_000));
        g.on_frame(ms(20_500)).unwrap();
        let round = g.view().round.unwrap();
        assert_eq!(round.phase, PhaseTag::Falling);
        assert!((round.progress - 0.3).abs() < 1e-9);
        assert_eq!(round.seconds_remaining, 4);
    }

    #[test]
    fn test_empty_level_is_immediate_loss() {
        let mut s = settings(Some(5), Some(3));
        s.level = Level::N1;
        let (mut g, sink) = game(s);

        let notices = g.begin(ms(0)).unwrap();
        assert!(notices.is_empty());
        assert!(g.is_finished());
        assert_eq!(g.view().end_reason, Some(EndReason::EmptyPool));
        assert_eq!(g.view().verdict, Verdict::Loss);
        assert_eq!(sink.sessions().len(), 1);

        // further frames are inert
        assert!(g.on_frame(ms(100)).unwrap().is_empty());
    }

    #[test]
    fn test_return_to_menu_records_once() {
        let (mut g, sink) = game(settings(Some(5), Some(3)));
        g.begin(ms(0)).unwrap();
        g.submit_answer("nope");
        g.on_frame(ms(16)).unwrap();

        g.return_to_menu(ms(2000));
        g.return_to_menu(ms(3000));

        assert!(g.view().round.is_none());
        assert_eq!(g.view().end_reason, Some(EndReason::Abandoned));
        assert_eq!(sink.sessions().len(), 1);
        assert_eq!(sink.sessions()[0].duration_secs, 2);
    }

    #[test]
    fn test_return_to_menu_without_attempts_records_nothing() {
        let (mut g, sink) = game(settings(Some(5), Some(3)));
        g.begin(ms(0)).unwrap();
        g.return_to_menu(ms(100));

        assert!(sink.sessions().is_empty());
        assert!(g.is_finished());
    }

    #[test]
    fn test_return_to_menu_settles_pending_hit() {
        let (mut g, sink) = game(settings(Some(5), Some(3)));
        g.begin(ms(0)).unwrap();
        g.submit_answer(&current_answer(&g));
        g.on_frame(ms(16)).unwrap();

        g.return_to_menu(ms(100));
        assert_eq!(g.view().successes, 1);
        assert_eq!(sink.sessions()[0].successes, 1);
    }

    #[test]
    fn test_seeded_games_are_reproducible() {
        let (mut a, _) = game(settings(None, None));
        let (mut b, _) = game(settings(None, None));
        a.begin(ms(0)).unwrap();
        b.begin(ms(0)).unwrap();

        assert_eq!(a.view().round, b.view().round);
    }

    #[test]
    fn test_attempt_reaction_saturates() {
        let (g, _) = game(settings(None, None));
        let kanji = catalog().entries()[0].clone();
        let record = g.attempt_record(&kanji, "one", true, Duration::MAX);
        assert_eq!(record.reaction_ms, u64::MAX);
        let record = g.attempt_record(&kanji, "one", true, ms(1234));
        assert_eq!(record.reaction_ms, 1234);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "without a live round")]
    fn test_wrong_answer_without_round_is_loud() {
        let (mut g, _) = game(settings(None, None));
        g.apply_wrong_answer("stray");
    }
}
