use gambit_ai::{EngineOptions, ModelKind, Strength};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;
use thiserror::Error;

pub const CONFIG_ENV: &str = "GAMBIT_CONFIG";
pub const LEVEL_ENV: &str = "GAMBIT_DEFAULT_LEVEL";
pub const MODEL_ENV: &str = "GAMBIT_DEFAULT_MODEL";
pub const SEARCH_PATH_ENV: &str = "GAMBIT_SEARCH_PATH";

/// Engine defaults applied to new sessions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppSettings {
    /// Difficulty a fresh session starts at (0-10)
    pub default_level: u8,
    /// Backend loaded for a new AI game
    pub default_model: ModelKind,
    /// Executable started for the search backend
    pub search_path: PathBuf,
    /// Extra arguments passed to the search executable
    pub search_args: Vec<String>,
    pub handshake_timeout_ms: u64,
    pub move_timeout_ms: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        let engine = EngineOptions::default();
        Self {
            default_level: Strength::default().level(),
            default_model: ModelKind::Search,
            search_path: engine.search_path,
            search_args: engine.search_args,
            handshake_timeout_ms: engine.handshake_timeout.as_millis() as u64,
            move_timeout_ms: engine.move_timeout.as_millis() as u64,
        }
    }
}

impl AppSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.default_level > Strength::MAX {
            return Err(SettingsError::InvalidValue(format!(
                "default_level must be between 0 and {}",
                Strength::MAX
            )));
        }

        if self.search_path.as_os_str().is_empty() {
            return Err(SettingsError::InvalidValue(
                "search_path cannot be empty".to_string(),
            ));
        }

        if self.handshake_timeout_ms == 0 || self.move_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "engine timeouts must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn default_strength(&self) -> Strength {
        Strength::new(i64::from(self.default_level))
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            search_path: self.search_path.clone(),
            search_args: self.search_args.clone(),
            handshake_timeout: Duration::from_millis(self.handshake_timeout_ms),
            move_timeout: Duration::from_millis(self.move_timeout_ms),
        }
    }

    /// Defaults, then the file named by `GAMBIT_CONFIG`, then the
    /// `GAMBIT_*` variables. `lookup` reads one environment variable.
    pub fn load<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = match lookup(CONFIG_ENV).filter(|path| !path.is_empty()) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        settings.apply_env(lookup)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_env() -> Result<Self, SettingsError> {
        Self::load(|key| std::env::var(key).ok())
    }

    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path)?;
        let settings: AppSettings = toml::from_str(&text)?;
        Ok(settings)
    }

    fn apply_env<F>(&mut self, lookup: F) -> Result<(), SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup(LEVEL_ENV).filter(|v| !v.is_empty()) {
            self.default_level = level.trim().parse().map_err(|_| {
                SettingsError::InvalidValue(format!("{LEVEL_ENV} must be a number, got {level:?}"))
            })?;
        }
        if let Some(model) = lookup(MODEL_ENV).filter(|v| !v.is_empty()) {
            self.default_model = model
                .parse()
                .map_err(|err: gambit_ai::EngineError| SettingsError::InvalidValue(err.to_string()))?;
        }
        if let Some(path) = lookup(SEARCH_PATH_ENV).filter(|v| !v.is_empty()) {
            self.search_path = PathBuf::from(path);
        }
        Ok(())
    }
}

/// Runtime-adjustable settings shared by all connections.
#[derive(Debug)]
pub struct SettingsStore {
    settings: RwLock<AppSettings>,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self {
            settings: RwLock::new(AppSettings::default()),
        }
    }

    pub fn with_settings(settings: AppSettings) -> Result<Self, SettingsError> {
        settings.validate()?;
        Ok(Self {
            settings: RwLock::new(settings),
        })
    }

    pub fn get(&self) -> Result<AppSettings, SettingsError> {
        self.settings
            .read()
            .map(|guard| guard.clone())
            .map_err(|_| SettingsError::StoragePoisoned)
    }

    /// Replaces the settings if they validate.
    pub fn update(&self, new_settings: AppSettings) -> Result<AppSettings, SettingsError> {
        new_settings.validate()?;

        let mut guard = self
            .settings
            .write()
            .map_err(|_| SettingsError::StoragePoisoned)?;
        *guard = new_settings.clone();
        Ok(new_settings)
    }

    /// Restores the built-in defaults.
    pub fn reset(&self) -> Result<AppSettings, SettingsError> {
        self.update(AppSettings::default())
    }

    pub fn engine_options(&self) -> Result<EngineOptions, SettingsError> {
        self.get().map(|settings| settings.engine_options())
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Invalid settings value: {0}")]
    InvalidValue(String),
    #[error("Settings storage poisoned")]
    StoragePoisoned,
    #[error("Failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse settings file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_settings_are_valid() {
        let settings = AppSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.default_level, 1);
        assert_eq!(settings.default_model, ModelKind::Search);
    }

    #[test]
    fn validates_level_range() {
        let settings = AppSettings {
            default_level: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_ok());

        let settings = AppSettings {
            default_level: 11,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn validates_path_and_timeouts() {
        let settings = AppSettings {
            search_path: PathBuf::new(),
            ..Default::default()
        };
        assert!(settings.validate().is_err());

        let settings = AppSettings {
            move_timeout_ms: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn engine_options_follow_settings() {
        let settings = AppSettings {
            search_path: PathBuf::from("/opt/engines/sf"),
            search_args: vec!["--threads".into(), "1".into()],
            handshake_timeout_ms: 1500,
            move_timeout_ms: 2500,
            ..Default::default()
        };
        let options = settings.engine_options();
        assert_eq!(options.search_path, PathBuf::from("/opt/engines/sf"));
        assert_eq!(options.search_args.len(), 2);
        assert_eq!(options.handshake_timeout, Duration::from_millis(1500));
        assert_eq!(options.move_timeout, Duration::from_millis(2500));
    }

    #[test]
    fn env_overrides_defaults() {
        let settings = AppSettings::load(env(&[
            (LEVEL_ENV, "4"),
            (MODEL_ENV, "minimax"),
            (SEARCH_PATH_ENV, "/usr/games/stockfish"),
        ]))
        .expect("load");

        assert_eq!(settings.default_level, 4);
        assert_eq!(settings.default_model, ModelKind::Minimax);
        assert_eq!(settings.search_path, PathBuf::from("/usr/games/stockfish"));
    }

    #[test]
    fn invalid_env_values_are_rejected() {
        assert!(AppSettings::load(env(&[(LEVEL_ENV, "hard")])).is_err());
        assert!(AppSettings::load(env(&[(LEVEL_ENV, "12")])).is_err());
        assert!(AppSettings::load(env(&[(MODEL_ENV, "leela")])).is_err());
    }

    #[test]
    fn file_then_env_precedence() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "default_level = 6\ndefault_model = \"minimax\"\nsearch_path = \"/from/file\""
        )
        .expect("write config");
        let path = file.path().to_string_lossy().to_string();

        let settings = AppSettings::load(env(&[(CONFIG_ENV, path.as_str())])).expect("load");
        assert_eq!(settings.default_level, 6);
        assert_eq!(settings.default_model, ModelKind::Minimax);
        assert_eq!(settings.search_path, PathBuf::from("/from/file"));
        assert_eq!(settings.move_timeout_ms, AppSettings::default().move_timeout_ms);

        let settings =
            AppSettings::load(env(&[(CONFIG_ENV, path.as_str()), (LEVEL_ENV, "2")])).expect("load");
        assert_eq!(settings.default_level, 2);
    }

    #[test]
    fn missing_or_malformed_file_is_an_error() {
        let err = AppSettings::load(env(&[(CONFIG_ENV, "/nonexistent/gambit.toml")])).unwrap_err();
        assert!(matches!(err, SettingsError::Io(_)));

        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "default_level = \"loud\"").expect("write config");
        let path = file.path().to_string_lossy().to_string();
        let err = AppSettings::load(env(&[(CONFIG_ENV, path.as_str())])).unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }

    #[test]
    fn settings_store_rejects_invalid_updates() {
        let store = SettingsStore::new();

        let invalid = AppSettings {
            default_level: 99,
            ..Default::default()
        };
        assert!(store.update(invalid).is_err());

        let current = store.get().expect("get");
        assert_eq!(current, AppSettings::default());
    }

    #[test]
    fn settings_store_updates_engine_options() {
        let store = SettingsStore::new();
        store
            .update(AppSettings {
                search_path: PathBuf::from("fake-engine"),
                ..Default::default()
            })
            .expect("update");

        let options = store.engine_options().expect("options");
        assert_eq!(options.search_path, PathBuf::from("fake-engine"));

        let restored = store.reset().expect("reset");
        assert_eq!(restored, AppSettings::default());
    }
}
