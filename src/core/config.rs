use crate::core::session_manager::SessionConfig;
use crate::models::exercise::{EngineError, EngineResult, ExerciseProfile};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Profile used for sessions started without an explicit exercise
    pub default_exercise: String,
    /// Exercise profiles by name
    pub profiles: BTreeMap<String, ExerciseProfile>,
    /// Where learned phase models are cached
    pub model_dir: PathBuf,
    /// Repetitions that make up one set
    pub reps_per_set: u32,
    /// Sessions idle this long are dropped
    pub session_idle_timeout_minutes: u32,
    /// How often idle sessions are swept, in seconds
    pub monitor_interval_secs: u64,
}

fn home_dir() -> Option<String> {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .ok()
}

impl Default for Config {
    fn default() -> Self {
        let mut model_dir = PathBuf::from(home_dir().unwrap_or_else(|| ".".to_string()));
        model_dir.push(".repcoach");
        model_dir.push("models");

        let mut profiles = BTreeMap::new();
        for profile in [ExerciseProfile::push_up(), ExerciseProfile::deadlift()] {
            profiles.insert(profile.name.clone(), profile);
        }

        Self {
            default_exercise: "push_up".to_string(),
            profiles,
            model_dir,
            reps_per_set: 10,
            session_idle_timeout_minutes: 30,
            monitor_interval_secs: 30,
        }
    }
}

impl Config {
    /// Load configuration from file, creating with defaults if it doesn't exist
    pub fn load() -> EngineResult<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    /// Save configuration to file
    pub fn save(&self) -> EngineResult<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> EngineResult<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path).map_err(|e| {
                EngineError::InvalidConfig(format!("Cannot read {:?}: {}", path, e))
            })?;
            let config: Config = serde_json::from_str(&contents)
                .map_err(|e| EngineError::InvalidConfig(format!("{:?}: {}", path, e)))?;
            config.validate()?;
            Ok(config)
        } else {
            // Create default config and save it
            let config = Self::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> EngineResult<()> {
        self.validate()?;

        let write = || -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let contents = serde_json::to_string_pretty(self)?;
            std::fs::write(path, contents)
        };

        write().map_err(|e| EngineError::InvalidConfig(format!("Cannot write {:?}: {}", path, e)))
    }

    /// Validate configuration values
    pub fn validate(&self) -> EngineResult<()> {
        for (name, profile) in &self.profiles {
            if name != &profile.name {
                return Err(EngineError::InvalidConfig(format!(
                    "Profile stored under '{}' is named '{}'",
                    name, profile.name
                )));
            }
            profile.validate()?;
        }

        if !self.profiles.contains_key(&self.default_exercise) {
            return Err(EngineError::InvalidConfig(format!(
                "Default exercise '{}' has no profile. Known: {:?}",
                self.default_exercise,
                self.profiles.keys().collect::<Vec<_>>()
            )));
        }

        if self.reps_per_set == 0 || self.reps_per_set > 1000 {
            return Err(EngineError::InvalidConfig(format!(
                "Invalid reps per set: {}. Must be between 1 and 1000",
                self.reps_per_set
            )));
        }

        if self.session_idle_timeout_minutes == 0 || self.session_idle_timeout_minutes > 1440 {
            return Err(EngineError::InvalidConfig(format!(
                "Invalid session idle timeout: {}. Must be between 1 and 1440 minutes",
                self.session_idle_timeout_minutes
            )));
        }

        if self.monitor_interval_secs == 0 || self.monitor_interval_secs > 3600 {
            return Err(EngineError::InvalidConfig(format!(
                "Invalid monitor interval: {}. Must be between 1 and 3600 seconds",
                self.monitor_interval_secs
            )));
        }

        Ok(())
    }

    /// Reset to default configuration
    pub fn reset() -> EngineResult<Self> {
        let config = Self::default();
        config.save()?;
        Ok(config)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            default_exercise: self.default_exercise.clone(),
            reps_per_set: self.reps_per_set,
            idle_timeout_minutes: self.session_idle_timeout_minutes,
            monitor_interval_secs: self.monitor_interval_secs,
        }
    }

    /// Get the configuration file path
    pub fn get_config_path() -> EngineResult<PathBuf> {
        let home = home_dir().ok_or_else(|| {
            EngineError::InvalidConfig("Could not determine home directory".to_string())
        })?;

        let mut path = PathBuf::from(home);
        path.push(".repcoach");
        path.push("config");
        path.push("settings.json");

        Ok(path)
    }
}
