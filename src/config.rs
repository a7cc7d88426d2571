use crate::app_dirs::AppDirs;
use crate::kanji::{Level, Mode, SelectionStrategy};
use crate::mission::{Completion, MissionRules, Penalty};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Per-round fall duration
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SpeedTier {
    Slow,
    #[default]
    Normal,
    Fast,
}

impl SpeedTier {
    pub fn duration(self) -> Duration {
        match self {
            SpeedTier::Slow => Duration::from_secs(8),
            SpeedTier::Normal => Duration::from_secs(5),
            SpeedTier::Fast => Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub player: String,
    pub mode: Mode,
    pub speed: SpeedTier,
    pub level: Level,
    /// `None` switches the mission to attrition: clear the whole level
    pub mission_target: Option<u32>,
    /// `None` means failures never end the mission
    pub error_budget: Option<u32>,
    pub penalty: Penalty,
    pub selection: SelectionStrategy,
    /// narrow layout, centre lane only
    pub mobile: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            player: default_player(),
            mode: Mode::Meaning,
            speed: SpeedTier::Normal,
            level: Level::N5,
            mission_target: Some(10),
            error_budget: Some(3),
            penalty: Penalty::None,
            selection: SelectionStrategy::Random,
            mobile: false,
        }
    }
}

fn default_player() -> String {
    std::env::var("USER")
        .ok()
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| "player".to_string())
}

impl Settings {
    pub fn round_duration(&self) -> Duration {
        self.speed.duration()
    }

    /// Resolve the completion, budget and penalty policies for one mission.
    /// A zero target is treated as attrition.
    pub fn mission_rules(&self) -> MissionRules {
        MissionRules {
            completion: match self.mission_target {
                Some(n) if n > 0 => Completion::Target(n),
                _ => Completion::Attrition,
            },
            error_budget: self.error_budget,
            penalty: self.penalty,
            ..MissionRules::default()
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Settings;
    fn save(&self, settings: &Settings) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            path: AppDirs::config_path(),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Settings {
        match fs::read(&self.path) {
            Ok(bytes) => match serde_json::from_slice::<Settings>(&bytes) {
                Ok(settings) => return settings,
                Err(e) => log::warn!("ignoring config at {}: {e}", self.path.display()),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("cannot read config at {}: {e}", self.path.display()),
        }
        Settings::default()
    }

    fn save(&self, settings: &Settings) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(settings)?;
        fs::write(&self.path, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_default_settings() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("config.json"));
        let settings = Settings::default();
        store.save(&settings).unwrap();
        assert_eq!(store.load(), settings);
    }

    #[test]
    fn save_and_load_custom_settings() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::with_path(dir.path().join("nested").join("config.json"));
        let settings = Settings {
            player: "hana".into(),
            mode: Mode::KunYomi,
            speed: SpeedTier::Fast,
            level: Level::Joyo1,
            mission_target: None,
            error_budget: None,
            penalty: Penalty::Strict,
            selection: SelectionStrategy::Shuffled,
            mobile: true,
        };
        store.save(&settings).unwrap();
        assert_eq!(store.load(), settings);
    }

    #[test]
    fn missing_or_corrupt_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = FileConfigStore::with_path(&path);
        assert_eq!(store.load(), Settings::default());

        fs::write(&path, b"{ not json").unwrap();
        assert_eq!(store.load(), Settings::default());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"mode":"onYomi","level":"Jōyō2","missionTarget":null}"#).unwrap();
        assert_eq!(settings.mode, Mode::OnYomi);
        assert_eq!(settings.level, Level::Joyo2);
        assert_eq!(settings.mission_target, None);
        assert_eq!(settings.speed, SpeedTier::Normal);
        assert_eq!(settings.error_budget, Some(3));
    }

    #[test]
    fn speed_tier_durations() {
        assert_eq!(SpeedTier::Slow.duration(), Duration::from_secs(8));
        assert_eq!(SpeedTier::Normal.duration(), Duration::from_secs(5));
        assert_eq!(SpeedTier::Fast.duration(), Duration::from_secs(3));
    }

    #[test]
    fn mission_rules_resolution() {
        let mut settings = Settings::default();
        assert_eq!(settings.mission_rules().completion, Completion::Target(10));

        settings.mission_target = None;
        assert_eq!(settings.mission_rules().completion, Completion::Attrition);

        settings.mission_target = Some(0);
        settings.penalty = Penalty::Miss;
        let rules = settings.mission_rules();
        assert_eq!(rules.completion, Completion::Attrition);
        assert_eq!(rules.penalty, Penalty::Miss);
        assert_eq!(rules.error_budget, Some(3));
    }
}
