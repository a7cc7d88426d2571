use super::core::{Catalog, KanjiEntry, Level, Mode};
use crate::answer::strip_annotations;
use clap::ValueEnum;

/// Kanji matching `query` in the answer list for `mode`.
///
/// A blank query lists `level` in catalog order. Otherwise the whole catalog is
/// searched, whatever the level: case-insensitive substring match against the
/// stored answers with their annotations stripped.
pub fn search<'a>(catalog: &'a Catalog, level: Level, mode: Mode, query: &str) -> Vec<&'a KanjiEntry> {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return catalog.level(level).collect();
    }
    catalog
        .entries()
        .iter()
        .filter(|k| {
            k.answers(mode)
                .iter()
                .any(|a| strip_annotations(a).to_lowercase().contains(&q))
        })
        .collect()
}

/// Cursor over a search result, for the learning screen
#[derive(Debug, Clone)]
pub struct Browser {
    catalog: Catalog,
    level: Level,
    mode: Mode,
    query: String,
    hits: Vec<KanjiEntry>,
    cursor: usize,
}

impl Browser {
    pub fn new(catalog: Catalog, level: Level, mode: Mode) -> Self {
        let mut browser = Self {
            catalog,
            level,
            mode,
            query: String::new(),
            hits: Vec::new(),
            cursor: 0,
        };
        browser.refresh();
        browser
    }

    fn refresh(&mut self) {
        self.hits = search(&self.catalog, self.level, self.mode, &self.query)
            .into_iter()
            .cloned()
            .collect();
        self.cursor = 0;
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn current(&self) -> Option<&KanjiEntry> {
        self.hits.get(self.cursor)
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// 1-based position of the current kanji, 0 when nothing matched
    pub fn position(&self) -> usize {
        if self.hits.is_empty() {
            0
        } else {
            self.cursor + 1
        }
    }

    pub fn first(&mut self) {
        self.cursor = 0;
    }

    pub fn last(&mut self) {
        self.cursor = self.hits.len().saturating_sub(1);
    }

    /// Wraps to the last kanji
    pub fn prev(&mut self) {
        if self.hits.is_empty() {
            return;
        }
        self.cursor = if self.cursor == 0 {
            self.hits.len() - 1
        } else {
            self.cursor - 1
        };
    }

    /// Wraps to the first kanji
    pub fn next(&mut self) {
        if self.hits.is_empty() {
            return;
        }
        self.cursor = (self.cursor + 1) % self.hits.len();
    }

    pub fn push_char(&mut self, c: char) {
        self.query.push(c);
        self.refresh();
    }

    pub fn pop_char(&mut self) {
        if self.query.pop().is_some() {
            self.refresh();
        }
    }

    /// Changing level clears the search
    pub fn set_level(&mut self, level: Level) {
        self.level = level;
        self.query.clear();
        self.refresh();
    }

    pub fn cycle_level(&mut self, forward: bool) {
        let levels = Level::value_variants();
        let Some(i) = levels.iter().position(|l| *l == self.level) else {
            return;
        };
        let n = levels.len();
        let j = if forward { (i + 1) % n } else { (i + n - 1) % n };
        self.set_level(levels[j]);
    }

    pub fn cycle_mode(&mut self) {
        self.mode = match self.mode {
            Mode::Meaning => Mode::OnYomi,
            Mode::OnYomi => Mode::KunYomi,
            Mode::KunYomi => Mode::Meaning,
        };
        self.refresh();
    }
}
