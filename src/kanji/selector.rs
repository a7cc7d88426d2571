use super::core::{Catalog, KanjiEntry, Level, Mode};
use crate::answer::expected_answers;
use itertools::Itertools;
use rand::seq::SliceRandom;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Kanji still available at `level` once `excluded` ids are removed.
/// Entries with nothing to answer in `mode` are never eligible.
pub fn eligible<'a: 'b, 'b>(
    catalog: &'a Catalog,
    level: Level,
    mode: Mode,
    excluded: &'b BTreeSet<String>,
) -> impl Iterator<Item = &'a KanjiEntry> + 'b {
    catalog
        .level(level)
        .filter(move |k| !excluded.contains(&k.id) && !expected_answers(k, mode).is_empty())
}

/// Uniformly random eligible kanji, or `None` once the pool is exhausted
pub fn next<'a>(
    catalog: &'a Catalog,
    level: Level,
    mode: Mode,
    excluded: &BTreeSet<String>,
    rng: &mut dyn RngCore,
) -> Option<&'a KanjiEntry> {
    let pool = eligible(catalog, level, mode, excluded).collect_vec();
    pool.choose(rng).copied()
}

/// Uniform permutation of `pool` (Fisher–Yates)
pub fn shuffle<T>(mut pool: Vec<T>, rng: &mut dyn RngCore) -> Vec<T> {
    pool.shuffle(rng);
    pool
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "lowercase")]
pub enum SelectionStrategy {
    /// fresh uniform pick from the remaining pool every round
    #[default]
    Random,
    /// walk a shuffled queue front to back, reshuffling when it runs dry
    Shuffled,
}

impl SelectionStrategy {
    pub fn build(self, level: Level, mode: Mode) -> Box<dyn KanjiSelector> {
        match self {
            SelectionStrategy::Random => Box::new(RandomSelector::new(level, mode)),
            SelectionStrategy::Shuffled => Box::new(QueueSelector::new(level, mode)),
        }
    }
}

/// Strategy for choosing the next kanji of a mission
pub trait KanjiSelector {
    /// Next kanji to present. `None` signals the eligible pool is exhausted.
    fn next_kanji(
        &mut self,
        catalog: &Catalog,
        excluded: &BTreeSet<String>,
        rng: &mut dyn RngCore,
    ) -> Option<KanjiEntry>;
}

pub struct RandomSelector {
    level: Level,
    mode: Mode,
}

impl RandomSelector {
    pub fn new(level: Level, mode: Mode) -> Self {
        Self { level, mode }
    }
}

impl KanjiSelector for RandomSelector {
    fn next_kanji(
        &mut self,
        catalog: &Catalog,
        excluded: &BTreeSet<String>,
        rng: &mut dyn RngCore,
    ) -> Option<KanjiEntry> {
        next(catalog, self.level, self.mode, excluded, rng).cloned()
    }
}

/// Shuffled queue of kanji ids; the cursor is the only state it keeps
pub struct QueueSelector {
    level: Level,
    mode: Mode,
    queue: Vec<String>,
    cursor: usize,
}

impl QueueSelector {
    pub fn new(level: Level, mode: Mode) -> Self {
        Self {
            level,
            mode,
            queue: Vec::new(),
            cursor: 0,
        }
    }

    fn refill(&mut self, catalog: &Catalog, excluded: &BTreeSet<String>, rng: &mut dyn RngCore) {
        let ids = eligible(catalog, self.level, self.mode, excluded)
            .map(|k| k.id.clone())
            .collect_vec();
        self.queue = shuffle(ids, rng);
        self.cursor = 0;
    }

    fn pop(&mut self, catalog: &Catalog, excluded: &BTreeSet<String>) -> Option<KanjiEntry> {
        while let Some(id) = self.queue.get(self.cursor) {
            self.cursor += 1;
            // ids cleared since the last shuffle are skipped
            if excluded.contains(id) {
                continue;
            }
            if let Some(entry) = catalog.get(id) {
                return Some(entry.clone());
            }
        }
        None
    }
}

impl KanjiSelector for QueueSelector {
    fn next_kanji(
        &mut self,
        catalog: &Catalog,
        excluded: &BTreeSet<String>,
        rng: &mut dyn RngCore,
    ) -> Option<KanjiEntry> {
        if let Some(entry) = self.pop(catalog, excluded) {
            return Some(entry);
        }
        self.refill(catalog, excluded, rng);
        self.pop(catalog, excluded)
    }
}
