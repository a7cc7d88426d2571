use clap::ValueEnum;
use include_dir::{include_dir, Dir};
use serde::{Deserialize, Serialize};
use serde_json::from_str;
use thiserror::Error;

static KANJI_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/kanji/data");

/// JLPT / Jōyō grouping a kanji belongs to
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    ValueEnum,
    strum_macros::Display,
)]
pub enum Level {
    N5,
    N4,
    N3,
    N2,
    N1,
    #[serde(rename = "Jōyō1", alias = "Joyo1")]
    #[strum(serialize = "Jōyō1")]
    #[value(name = "joyo1")]
    Joyo1,
    #[serde(rename = "Jōyō2", alias = "Joyo2")]
    #[strum(serialize = "Jōyō2")]
    #[value(name = "joyo2")]
    Joyo2,
}

/// Which answer list a mission quizzes on
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "camelCase")]
pub enum Mode {
    #[strum(serialize = "meaning")]
    Meaning,
    #[strum(serialize = "on'yomi")]
    #[value(name = "on")]
    OnYomi,
    #[strum(serialize = "kun'yomi")]
    #[value(name = "kun")]
    KunYomi,
}

impl Mode {
    /// Short prompt shown next to the input line
    pub fn prompt(&self) -> &'static str {
        match self {
            Mode::Meaning => "meaning:",
            Mode::OnYomi => "on'yomi (katakana):",
            Mode::KunYomi => "kun'yomi (hiragana):",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KanjiEntry {
    pub id: String,
    pub character: String,
    pub meanings: Vec<String>,
    #[serde(default)]
    pub on_yomi: Vec<String>,
    #[serde(default)]
    pub kun_yomi: Vec<String>,
    pub group: Level,
    #[serde(default)]
    pub difficulty: Option<u8>,
    #[serde(default)]
    pub strokes: Option<u8>,
    #[serde(default)]
    pub frequency: Option<u32>,
}

impl KanjiEntry {
    /// Stored answers for `mode`, annotations included
    pub fn answers(&self, mode: Mode) -> &[String] {
        match mode {
            Mode::Meaning => &self.meanings,
            Mode::OnYomi => &self.on_yomi,
            Mode::KunYomi => &self.kun_yomi,
        }
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("kanji data file {0} is not valid UTF-8")]
    Encoding(String),
    #[error("kanji data file {file} could not be parsed: {source}")]
    Parse {
        file: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("duplicate kanji id {0}")]
    DuplicateId(String),
}

/// Read-only, ordered kanji catalog. Static for the process lifetime.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<KanjiEntry>,
}

impl Catalog {
    pub fn new(entries: Vec<KanjiEntry>) -> Result<Self, CatalogError> {
        let mut seen = std::collections::HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.id.as_str()) {
                return Err(CatalogError::DuplicateId(entry.id.clone()));
            }
        }
        Ok(Self { entries })
    }

    /// Catalog built from the JSON files compiled into the binary
    pub fn embedded() -> Result<Self, CatalogError> {
        let mut files: Vec<_> = KANJI_DIR
            .files()
            .filter(|f| f.path().extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort_by_key(|f| f.path());

        let mut entries = Vec::new();
        for file in files {
            let name = file.path().display().to_string();
            let text = file
                .contents_utf8()
                .ok_or_else(|| CatalogError::Encoding(name.clone()))?;
            entries.extend(parse_entries(&name, text)?);
        }
        Self::new(entries)
    }

    pub fn from_json(text: &str) -> Result<Self, CatalogError> {
        Self::new(parse_entries("<inline>", text)?)
    }

    pub fn entries(&self) -> &[KanjiEntry] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&KanjiEntry> {
        self.entries.iter().find(|k| k.id == id)
    }

    pub fn level(&self, level: Level) -> impl Iterator<Item = &KanjiEntry> {
        self.entries.iter().filter(move |k| k.group == level)
    }

    pub fn level_size(&self, level: Level) -> usize {
        self.level(level).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_entries(file: &str, text: &str) -> Result<Vec<KanjiEntry>, CatalogError> {
    from_str(text).map_err(|source| CatalogError::Parse {
        file: file.to_string(),
        source,
    })
}
