//! Mission aggregation: a pure reducer over round-level events.

use crate::round::{OutcomeKind, RoundOutcome};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const HIT_SCORE: i64 = 100;
pub const PENALTY_SCORE: i64 = 50;

/// What a miss or a wrong submission costs
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Penalty {
    /// misses cost one failure, wrong guesses are free
    #[default]
    None,
    /// misses also cost score
    Miss,
    /// every wrong submission costs score and a failure
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// win after this many hits
    Target(u32),
    /// win once every kanji of the level is cleared
    Attrition,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissionRules {
    pub completion: Completion,
    /// `None` never loses on failures
    pub error_budget: Option<u32>,
    pub penalty: Penalty,
    pub hit_score: i64,
    pub penalty_score: i64,
}

impl Default for MissionRules {
    fn default() -> Self {
        Self {
            completion: Completion::Target(10),
            error_budget: Some(3),
            penalty: Penalty::None,
            hit_score: HIT_SCORE,
            penalty_score: PENALTY_SCORE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
pub enum Verdict {
    Ongoing,
    Win,
    Loss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum EndReason {
    TargetReached,
    PoolCleared,
    ErrorBudgetSpent,
    /// nothing to play at mission start
    EmptyPool,
    Abandoned,
}

impl EndReason {
    pub fn verdict(self) -> Verdict {
        match self {
            EndReason::TargetReached | EndReason::PoolCleared => Verdict::Win,
            EndReason::ErrorBudgetSpent | EndReason::EmptyPool | EndReason::Abandoned => Verdict::Loss,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissionEvent {
    Outcome { kind: OutcomeKind, kanji_id: String },
    /// a non-empty answer that did not match, round still falling
    WrongAnswer,
    /// the selector had nothing left to offer
    PoolExhausted,
    Abandon,
}

impl From<&RoundOutcome> for MissionEvent {
    fn from(outcome: &RoundOutcome) -> Self {
        MissionEvent::Outcome {
            kind: outcome.kind,
            kanji_id: outcome.kanji.id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MissionState {
    pub score: i64,
    pub successes: u32,
    pub failures: u32,
    pub attempts: u32,
    pub cleared: BTreeSet<String>,
    /// eligible kanji for the level at mission start
    pub pool_size: usize,
    pub end: Option<EndReason>,
}

impl MissionState {
    pub fn new(pool_size: usize) -> Self {
        Self {
            pool_size,
            ..Self::default()
        }
    }

    pub fn verdict(&self) -> Verdict {
        self.end.map_or(Verdict::Ongoing, EndReason::verdict)
    }

    pub fn is_over(&self) -> bool {
        self.end.is_some()
    }

    /// successes / attempts as a percentage
    pub fn accuracy(&self) -> f64 {
        if self.attempts == 0 {
            return 0.0;
        }
        f64::from(self.successes) / f64::from(self.attempts) * 100.0
    }
}

/// `(state, event) -> state`. Events after the mission ended are ignored.
pub fn reduce(rules: &MissionRules, state: &MissionState, event: &MissionEvent) -> MissionState {
    let mut next = state.clone();
    if state.is_over() {
        return next;
    }

    match event {
        MissionEvent::Outcome {
            kind: OutcomeKind::Hit,
            kanji_id,
        } => {
            next.attempts += 1;
            next.successes += 1;
            next.score += rules.hit_score;
            next.cleared.insert(kanji_id.clone());

            if let Completion::Target(target) = rules.completion {
                if next.successes >= target {
                    next.end = Some(EndReason::TargetReached);
                    return next;
                }
            }
            if next.pool_size > 0 && next.cleared.len() >= next.pool_size {
                next.end = Some(EndReason::PoolCleared);
            }
        }
        MissionEvent::Outcome {
            kind: OutcomeKind::Missed,
            ..
        } => {
            next.attempts += 1;
            if rules.penalty != Penalty::None {
                next.score -= rules.penalty_score;
            }
            charge_failure(rules, &mut next);
        }
        MissionEvent::WrongAnswer => {
            next.attempts += 1;
            if rules.penalty == Penalty::Strict {
                next.score -= rules.penalty_score;
                charge_failure(rules, &mut next);
            }
        }
        MissionEvent::PoolExhausted => {
            next.end = Some(if next.successes > 0 {
                EndReason::PoolCleared
            } else {
                EndReason::EmptyPool
            });
        }
        MissionEvent::Abandon => next.end = Some(EndReason::Abandoned),
    }
    next
}

fn charge_failure(rules: &MissionRules, state: &mut MissionState) {
    state.failures += 1;
    if let Some(budget) = rules.error_budget {
        if state.failures >= budget {
            state.end = Some(EndReason::ErrorBudgetSpent);
        }
    }
}

#[derive(Debug, Clone)]
pub struct MissionController {
    rules: MissionRules,
    state: MissionState,
}

impl MissionController {
    pub fn new(rules: MissionRules, pool_size: usize) -> Self {
        Self {
            rules,
            state: MissionState::new(pool_size),
        }
    }

    pub fn on_event(&mut self, event: &MissionEvent) -> Verdict {
        let before = self.state.is_over();
        self.state = reduce(&self.rules, &self.state, event);
        if !before {
            if let Some(reason) = self.state.end {
                log::info!(
                    "mission over: {} ({}), score {}",
                    reason.verdict(),
                    reason,
                    self.state.score
                );
            }
        }
        self.state.verdict()
    }

    pub fn on_outcome(&mut self, outcome: &RoundOutcome) -> Verdict {
        self.on_event(&MissionEvent::from(outcome))
    }

    pub fn is_terminal(&self) -> Verdict {
        self.state.verdict()
    }

    pub fn state(&self) -> &MissionState {
        &self.state
    }

    pub fn rules(&self) -> &MissionRules {
        &self.rules
    }

    pub fn target(&self) -> Option<u32> {
        match self.rules.completion {
            Completion::Target(n) => Some(n),
            Completion::Attrition => None,
        }
    }
}
