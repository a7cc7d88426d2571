use std::sync::mpsc::{self, Sender};
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use kanji_cockpit::config::Settings;
use kanji_cockpit::game::Game;
use kanji_cockpit::kanji::Catalog;
use kanji_cockpit::mission::{EndReason, Penalty, Verdict};
use kanji_cockpit::round::PhaseTag;
use kanji_cockpit::runtime::{AppEvent, Clock, FixedTicker, ManualClock, Runner, TestEventSource};
use kanji_cockpit::sink::MemorySink;

// Headless integration: the library game driven by the runtime Runner,
// a TestEventSource and a hand-advanced clock. No TTY involved.

fn new_game(settings: Settings) -> (Game, Catalog, MemorySink) {
    let catalog = Catalog::embedded().unwrap();
    let sink = MemorySink::new();
    let game = Game::new(
        settings,
        catalog.clone(),
        Box::new(ChaCha8Rng::seed_from_u64(7)),
        Box::new(sink.clone()),
    );
    (game, catalog, sink)
}

fn send_line(tx: &Sender<AppEvent>, text: &str) {
    for c in text.chars() {
        tx.send(AppEvent::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)))
            .unwrap();
    }
    tx.send(AppEvent::Key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)))
        .unwrap();
}

/// Minimal host loop: keys edit a buffer, Enter submits, ticks advance the
/// clock by `frame` and feed the game.
struct Host {
    runner: Runner<TestEventSource, FixedTicker>,
    clock: ManualClock,
    frame: Duration,
    input: String,
}

impl Host {
    fn new(rx: mpsc::Receiver<AppEvent>, frame: Duration) -> Self {
        let es = TestEventSource::new(rx);
        let ticker = FixedTicker::new(Duration::from_millis(1));
        Self {
            runner: Runner::new(es, ticker),
            clock: ManualClock::new(),
            frame,
            input: String::new(),
        }
    }

    fn step(&mut self, game: &mut Game) {
        match self.runner.step() {
            AppEvent::Tick => {
                let now = self.clock.advance(self.frame);
                game.on_frame(now).unwrap();
            }
            AppEvent::Resize => {}
            AppEvent::Key(key) => match key.code {
                KeyCode::Char(c) => self.input.push(c),
                KeyCode::Enter => {
                    game.submit_answer(&self.input);
                    self.input.clear();
                }
                _ => {}
            },
        }
    }
}

#[test]
fn headless_mission_reaches_target() {
    let settings = Settings {
        player: "pilot".into(),
        mission_target: Some(3),
        error_budget: Some(2),
        ..Settings::default()
    };
    let (mut game, catalog, sink) = new_game(settings);
    let (tx, rx) = mpsc::channel();
    let mut host = Host::new(rx, Duration::from_millis(16));

    game.begin(host.clock.now()).unwrap();
    let mut answered: Option<String> = None;

    for _ in 0..5_000u32 {
        if game.is_finished() {
            break;
        }
        if let Some(round) = game.view().round {
            if round.phase == PhaseTag::Falling && answered.as_deref() != Some(round.kanji_id.as_str()) {
                let kanji = catalog.get(&round.kanji_id).unwrap();
                send_line(&tx, &kanji.meanings[0]);
                answered = Some(round.kanji_id);
            }
        }
        host.step(&mut game);
    }

    assert!(game.is_finished(), "mission should finish after three hits");
    let view = game.view();
    assert_eq!(view.verdict, Verdict::Win);
    assert_eq!(view.end_reason, Some(EndReason::TargetReached));
    assert_eq!(view.successes, 3);
    assert_eq!(view.score, 300);
    assert_eq!(view.failures, 0);
    assert!(view.round.is_none());

    assert_eq!(sink.attempts().len(), 3);
    assert_eq!(sink.sessions().len(), 1);
    assert_eq!(sink.sessions()[0].verdict, Verdict::Win);
}

#[test]
fn headless_unanswered_kanji_spend_the_budget() {
    let settings = Settings {
        player: "pilot".into(),
        mission_target: Some(5),
        error_budget: Some(2),
        ..Settings::default()
    };
    let (mut game, _, sink) = new_game(settings);
    let (_tx, rx) = mpsc::channel();
    let mut host = Host::new(rx, Duration::from_millis(100));

    game.begin(host.clock.now()).unwrap();
    for _ in 0..1_000u32 {
        if game.is_finished() {
            break;
        }
        host.step(&mut game);
    }

    assert!(game.is_finished(), "two misses should end the mission");
    let view = game.view();
    assert_eq!(view.verdict, Verdict::Loss);
    assert_eq!(view.end_reason, Some(EndReason::ErrorBudgetSpent));
    assert_eq!(view.failures, 2);
    assert_eq!(view.attempts, 2);
    assert!(game.last_missed().is_some());

    let attempts = sink.attempts();
    assert_eq!(attempts.len(), 2);
    assert!(attempts.iter().all(|a| !a.is_correct && a.user_answer.is_empty()));
    assert_eq!(sink.sessions().len(), 1);
}

#[test]
fn headless_pause_freezes_the_falling_kanji() {
    let (mut game, _, _) = new_game(Settings {
        player: "pilot".into(),
        ..Settings::default()
    });
    let (_tx, rx) = mpsc::channel();
    let mut host = Host::new(rx, Duration::from_millis(100));

    game.begin(host.clock.now()).unwrap();
    for _ in 0..10 {
        host.step(&mut game);
    }
    let before = game.view().round.unwrap();
    assert_eq!(before.phase, PhaseTag::Falling);

    game.pause(host.clock.now());
    // ten seconds of wall time while paused
    for _ in 0..100 {
        host.step(&mut game);
    }
    let during = game.view().round.unwrap();
    assert!(game.is_paused());
    assert_eq!(during.progress, before.progress);

    game.resume(host.clock.now());
    host.step(&mut game);
    let after = game.view().round.unwrap();
    assert_eq!(after.phase, PhaseTag::Falling);
    assert!(after.progress > before.progress);
    assert!(after.progress < 0.5);
}

#[test]
fn headless_strict_penalty_charges_wrong_answers() {
    let settings = Settings {
        player: "pilot".into(),
        mission_target: Some(1),
        error_budget: Some(3),
        penalty: Penalty::Strict,
        ..Settings::default()
    };
    let (mut game, catalog, sink) = new_game(settings);
    let (tx, rx) = mpsc::channel();
    let mut host = Host::new(rx, Duration::from_millis(16));

    game.begin(host.clock.now()).unwrap();
    let id = game.view().round.unwrap().kanji_id;
    send_line(&tx, "definitely not it");
    send_line(&tx, &catalog.get(&id).unwrap().meanings[0]);

    for _ in 0..500u32 {
        if game.is_finished() {
            break;
        }
        host.step(&mut game);
    }

    let view = game.view();
    assert_eq!(view.verdict, Verdict::Win);
    assert_eq!(view.score, 50);
    assert_eq!(view.failures, 1);
    assert_eq!(view.attempts, 2);
    let attempts = sink.attempts();
    assert_eq!(attempts.len(), 2);
    assert!(!attempts[0].is_correct);
    assert_eq!(attempts[0].user_answer, "definitely not it");
    assert!(attempts[1].is_correct);
}
