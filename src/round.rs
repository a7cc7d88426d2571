//! Per-round lifecycle: `Idle → Falling → {Exploding | Missed} → Idle`.
//!
//! Every input funnels through [`RoundMachine::apply`], a single transition
//! function over `(phase, event)`. Submissions are buffered and evaluated at
//! the start of the next frame, before the timer is ticked, so an answer that
//! lands in the same frame as arrival still counts as a hit.

use crate::answer;
use crate::kanji::{KanjiEntry, Mode};
use crate::timer::RoundTimer;
use crate::trajectory::{Lane, Point, Trajectory, TrajectoryGenerator};
use rand::RngCore;
use std::time::Duration;
use thiserror::Error;

/// How long the explosion / cockpit-hit animation holds the round
pub const RESOLUTION_WINDOW: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum PhaseTag {
    Idle,
    Falling,
    Exploding,
    Missed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum OutcomeKind {
    Hit,
    Missed,
}

/// Everything fixed for the lifetime of one round
#[derive(Debug, Clone, PartialEq)]
pub struct RoundSeed {
    pub kanji: KanjiEntry,
    pub trajectory: Trajectory,
    pub duration: Duration,
}

/// Produced exactly once per round
#[derive(Debug, Clone, PartialEq)]
pub struct RoundOutcome {
    pub kind: OutcomeKind,
    pub kanji: KanjiEntry,
    /// empty when the kanji arrived unanswered
    pub answer: String,
    pub correct: bool,
    /// round time consumed before resolution
    pub reaction: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RoundEvent {
    Deliver(KanjiEntry),
    Submit(String),
    Frame,
    Pause,
    Resume,
    Abandon,
}

/// Side effects the host should react to
#[derive(Debug, Clone, PartialEq)]
pub enum RoundNotice {
    Started { lane: Lane },
    Rejected { answer: String },
    Exploding { at: Point },
    Outcome(RoundOutcome),
    /// resolution window over, a new kanji can be delivered
    Ready,
}

#[derive(Debug, Error, PartialEq)]
pub enum RoundError {
    #[error("cannot start a round while the previous one is {0}")]
    RoundInProgress(PhaseTag),
}

#[derive(Debug, Clone)]
pub struct RoundConfig {
    pub duration: Duration,
    pub window: Duration,
    pub mode: Mode,
    pub generator: TrajectoryGenerator,
}

impl RoundConfig {
    pub fn new(duration: Duration, mode: Mode) -> Self {
        Self {
            duration,
            window: RESOLUTION_WINDOW,
            mode,
            generator: TrajectoryGenerator::default(),
        }
    }
}

#[derive(Debug, Clone)]
struct LiveRound {
    seed: RoundSeed,
    position: Point,
}

#[derive(Debug, Clone)]
enum Phase {
    Idle,
    Falling(LiveRound),
    Exploding { round: LiveRound, answer: String },
    Missed(LiveRound),
}

impl Phase {
    fn tag(&self) -> PhaseTag {
        match self {
            Phase::Idle => PhaseTag::Idle,
            Phase::Falling(_) => PhaseTag::Falling,
            Phase::Exploding { .. } => PhaseTag::Exploding,
            Phase::Missed(_) => PhaseTag::Missed,
        }
    }

    fn round(&self) -> Option<&LiveRound> {
        match self {
            Phase::Idle => None,
            Phase::Falling(round) | Phase::Missed(round) => Some(round),
            Phase::Exploding { round, .. } => Some(round),
        }
    }
}

/// Snapshot for the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub struct RoundView {
    pub phase: PhaseTag,
    pub kanji_id: String,
    pub character: String,
    pub lane: Lane,
    pub position: Point,
    pub progress: f64,
    pub seconds_remaining: u64,
    /// progress through the resolution window, 0 while falling
    pub resolution: f64,
}

pub struct RoundMachine {
    config: RoundConfig,
    rng: Box<dyn RngCore>,
    phase: Phase,
    timer: RoundTimer,
    window: RoundTimer,
    pending: Vec<String>,
    paused: bool,
}

impl std::fmt::Debug for RoundMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoundMachine")
            .field("phase", &self.phase)
            .field("timer", &self.timer)
            .field("pending", &self.pending)
            .field("paused", &self.paused)
            .finish()
    }
}

impl RoundMachine {
    pub fn new(config: RoundConfig, rng: Box<dyn RngCore>) -> Self {
        Self {
            config,
            rng,
            phase: Phase::Idle,
            timer: RoundTimer::new(),
            window: RoundTimer::new(),
            pending: Vec::new(),
            paused: false,
        }
    }

    /// The single transition function
    pub fn apply(
        &mut self,
        event: RoundEvent,
        now: Duration,
    ) -> Result<Vec<RoundNotice>, RoundError> {
        let notices = match event {
            RoundEvent::Deliver(kanji) => self.deliver(kanji, now)?,
            RoundEvent::Submit(text) => {
                self.submit(text);
                Vec::new()
            }
            RoundEvent::Frame => self.frame(now),
            RoundEvent::Pause => {
                self.pause(now);
                Vec::new()
            }
            RoundEvent::Resume => {
                self.resume(now);
                Vec::new()
            }
            RoundEvent::Abandon => self.abandon(),
        };
        Ok(notices)
    }

    fn deliver(&mut self, kanji: KanjiEntry, now: Duration) -> Result<Vec<RoundNotice>, RoundError> {
        if !matches!(self.phase, Phase::Idle) {
            return Err(RoundError::RoundInProgress(self.phase.tag()));
        }
        let trajectory = self.config.generator.generate(self.rng.as_mut());
        let seed = RoundSeed {
            kanji,
            trajectory,
            duration: self.config.duration,
        };
        log::debug!(
            "round start: {} on {} lane over {:?}",
            seed.kanji.id,
            trajectory.lane,
            seed.duration
        );

        self.pending.clear();
        self.window.cancel();
        self.timer.start(seed.duration, now);
        if self.paused {
            self.timer.pause(now);
        }
        self.phase = Phase::Falling(LiveRound {
            position: trajectory.start,
            seed,
        });
        Ok(vec![RoundNotice::Started {
            lane: trajectory.lane,
        }])
    }

    fn submit(&mut self, text: String) {
        if self.accepts_input() && !text.trim().is_empty() {
            self.pending.push(text);
        }
    }

    fn frame(&mut self, now: Duration) -> Vec<RoundNotice> {
        if self.paused {
            return Vec::new();
        }
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Idle => Vec::new(),
            Phase::Falling(round) => self.frame_falling(round, now),
            Phase::Exploding { round, answer } => {
                if !self.window.tick(now).arrived {
                    self.phase = Phase::Exploding { round, answer };
                    return Vec::new();
                }
                let outcome = RoundOutcome {
                    kind: OutcomeKind::Hit,
                    reaction: self.timer.elapsed(),
                    kanji: round.seed.kanji,
                    answer,
                    correct: true,
                };
                log::debug!("round hit: {}", outcome.kanji.id);
                vec![RoundNotice::Outcome(outcome), RoundNotice::Ready]
            }
            Phase::Missed(round) => {
                if !self.window.tick(now).arrived {
                    self.phase = Phase::Missed(round);
                    return Vec::new();
                }
                vec![RoundNotice::Ready]
            }
        }
    }

    fn frame_falling(&mut self, mut round: LiveRound, now: Duration) -> Vec<RoundNotice> {
        let mut notices = Vec::new();

        // input registered before this frame wins over arrival
        for answer in std::mem::take(&mut self.pending) {
            if answer::is_correct(&round.seed.kanji, self.config.mode, &answer) {
                self.timer.tick(now);
                self.timer.cancel();
                self.window.start(self.config.window, now);
                notices.push(RoundNotice::Exploding { at: round.position });
                self.phase = Phase::Exploding { round, answer };
                return notices;
            }
            notices.push(RoundNotice::Rejected { answer });
        }

        let reading = self.timer.tick(now);
        round.position = round.seed.trajectory.position(reading.progress);
        if reading.arrived {
            log::debug!("round missed: {}", round.seed.kanji.id);
            self.window.start(self.config.window, now);
            notices.push(RoundNotice::Outcome(RoundOutcome {
                kind: OutcomeKind::Missed,
                kanji: round.seed.kanji.clone(),
                answer: String::new(),
                correct: false,
                reaction: self.timer.elapsed(),
            }));
            self.phase = Phase::Missed(round);
        } else {
            self.phase = Phase::Falling(round);
        }
        notices
    }

    fn pause(&mut self, now: Duration) {
        if self.paused {
            return;
        }
        self.paused = true;
        self.pending.clear();
        self.timer.pause(now);
        self.window.pause(now);
    }

    fn resume(&mut self, now: Duration) {
        if !self.paused {
            return;
        }
        self.paused = false;
        self.timer.resume(now);
        self.window.resume(now);
    }

    /// Cancel timers and drop the round. A hit still inside its resolution
    /// window is reported so it is not lost.
    fn abandon(&mut self) -> Vec<RoundNotice> {
        self.timer.cancel();
        self.window.cancel();
        self.pending.clear();
        self.paused = false;
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Exploding { round, answer } => vec![RoundNotice::Outcome(RoundOutcome {
                kind: OutcomeKind::Hit,
                reaction: self.timer.elapsed(),
                kanji: round.seed.kanji,
                answer,
                correct: true,
            })],
            _ => Vec::new(),
        }
    }

    pub fn start(&mut self, kanji: KanjiEntry, now: Duration) -> Result<Vec<RoundNotice>, RoundError> {
        self.apply(RoundEvent::Deliver(kanji), now)
    }

    pub fn submit_answer(&mut self, text: impl Into<String>) {
        self.submit(text.into());
    }

    pub fn on_frame(&mut self, now: Duration) -> Vec<RoundNotice> {
        self.frame(now)
    }

    pub fn set_paused(&mut self, paused: bool, now: Duration) {
        if paused {
            self.pause(now);
        } else {
            self.resume(now);
        }
    }

    pub fn cancel(&mut self) -> Vec<RoundNotice> {
        self.abandon()
    }

    pub fn phase(&self) -> PhaseTag {
        self.phase.tag()
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.phase, Phase::Idle)
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn accepts_input(&self) -> bool {
        !self.paused && matches!(self.phase, Phase::Falling(_))
    }

    /// Round time consumed so far; frozen while paused
    pub fn elapsed(&self) -> Duration {
        self.timer.elapsed()
    }

    pub fn seed(&self) -> Option<&RoundSeed> {
        self.phase.round().map(|r| &r.seed)
    }

    /// `None` when no round is live or resolving
    pub fn view(&self) -> Option<RoundView> {
        let round = self.phase.round()?;
        let resolving = !matches!(self.phase, Phase::Falling(_));
        Some(RoundView {
            phase: self.phase.tag(),
            kanji_id: round.seed.kanji.id.clone(),
            character: round.seed.kanji.character.clone(),
            lane: round.seed.trajectory.lane,
            position: round.position,
            progress: self.timer.progress(),
            seconds_remaining: self.timer.seconds_remaining(),
            resolution: if resolving { self.window.progress() } else { 0.0 },
        })
    }
}
