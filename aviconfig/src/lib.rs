//! # AVInformer configuration module
//!
//! Configuration management for the announcement unit:
//! - loading from a YAML file merged over embedded defaults
//! - environment variable overrides
//! - type-safe getters with per-key defaults
//! - thread-safe singleton access
//!
//! ## Usage
//!
//! ```no_run
//! use aviconfig::get_config;
//!
//! let config = get_config();
//! let period = config.gps_poll_period_ms();
//! let media_dir = config.media_dir()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::{env, fs};

use anyhow::{anyhow, Result};
use dirs::home_dir;
use lazy_static::lazy_static;
use serde_yaml::{Mapping, Value};
use tracing::info;

/// Embedded default configuration.
const DEFAULT_CONFIG: &str = include_str!("avinformer.yaml");

const ENV_CONFIG_DIR: &str = "AVINFORMER_CONFIG";
const ENV_PREFIX: &str = "AVINFORMER_CONFIG__";
const CONFIG_DIR_NAME: &str = ".avinformer";

const DEFAULT_GPS_POLL_PERIOD_MS: u64 = 1000;
const DEFAULT_GPS_TICK_MS: u64 = 250;
const DEFAULT_GPS_VALID_THRESHOLD: u64 = 4;
const DEFAULT_GPS_MIN_VALID_SPEED: f64 = 6.0;
const DEFAULT_AUDIO_DRIVER: &str = "null";
const DEFAULT_PLAYER_COMMAND: &str = "mpg123 -q";
const DEFAULT_NULL_DURATION_MS: u64 = 2000;

lazy_static! {
    static ref CONFIG: Arc<Config> =
        Arc::new(Config::load("").expect("Failed to load AVInformer configuration"));
}

/// Global configuration singleton.
pub fn get_config() -> Arc<Config> {
    Arc::clone(&CONFIG)
}

/// Macro to generate a getter for u64 values with a default.
macro_rules! impl_u64_config {
    ($getter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> u64 {
            match self.get_value($path) {
                Some(Value::Number(n)) => n.as_u64().unwrap_or($default),
                _ => $default,
            }
        }
    };
}

/// Macro to generate a getter for f64 values with a default.
macro_rules! impl_f64_config {
    ($getter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> f64 {
            match self.get_value($path) {
                Some(Value::Number(n)) => n.as_f64().unwrap_or($default),
                _ => $default,
            }
        }
    };
}

/// Macro to generate a getter for non-empty string values with a default.
macro_rules! impl_string_config {
    ($getter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> String {
            match self.get_value($path) {
                Some(Value::String(s)) if !s.is_empty() => s,
                _ => $default.to_string(),
            }
        }
    };
}

/// Configuration manager for the announcement unit.
#[derive(Debug)]
pub struct Config {
    config_dir: PathBuf,
    data: Mutex<Value>,
}

impl Config {
    /// Finds the config directory by trying, in order: the provided
    /// directory, the `AVINFORMER_CONFIG` environment variable,
    /// `.avinformer` in the current directory, `.avinformer` in the home
    /// directory.
    fn find_config_dir(directory: &str) -> PathBuf {
        if !directory.is_empty() {
            return PathBuf::from(directory);
        }

        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %env_path, "Trying to load config from env");
            return PathBuf::from(env_path);
        }

        if Path::new(CONFIG_DIR_NAME).exists() {
            return PathBuf::from(CONFIG_DIR_NAME);
        }

        if let Some(home) = home_dir() {
            return home.join(CONFIG_DIR_NAME);
        }

        PathBuf::from(CONFIG_DIR_NAME)
    }

    fn validate_config_dir(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }
        if !path.is_dir() {
            return Err(anyhow!("config path {} is not a directory", path.display()));
        }
        Ok(())
    }

    /// Loads the configuration: embedded defaults, merged with the external
    /// `config.yaml` if present, then environment overrides applied.
    pub fn load(directory: &str) -> Result<Self> {
        let config_dir = Self::find_config_dir(directory);
        Self::validate_config_dir(&config_dir)?;
        info!(config_dir = %config_dir.display(), "Using config directory");

        let mut merged: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;

        let config_file = config_dir.join("config.yaml");
        match fs::read(&config_file) {
            Ok(data) => {
                info!(config_file = %config_file.display(), "Loaded config file");
                let external: Value = serde_yaml::from_slice(&data)?;
                merge_yaml(&mut merged, &external);
            }
            Err(_) => {
                info!(
                    config_file = %config_file.display(),
                    "Config file not found, using embedded defaults"
                );
            }
        }

        Self::apply_env_overrides(&mut merged);

        Ok(Self {
            config_dir,
            data: Mutex::new(merged),
        })
    }

    /// Applies `AVINFORMER_CONFIG__SECTION__KEY=value` overrides. Values are
    /// parsed as YAML scalars so numbers and booleans keep their type.
    fn apply_env_overrides(value: &mut Value) {
        for (name, raw) in env::vars() {
            let Some(suffix) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let path = suffix.to_lowercase().replace("__", ".");
            let parsed: Value =
                serde_yaml::from_str(&raw).unwrap_or(Value::String(raw.clone()));
            info!(key = %path, value = %raw, "Applying config override from environment");
            set_path(value, &path, parsed);
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Reads a value by dotted path, e.g. `gps.poll_period_ms`.
    pub fn get_value(&self, path: &str) -> Option<Value> {
        let data = self.data.lock().unwrap();
        let mut current = &*data;
        for key in path.split('.') {
            current = current.get(key)?;
        }
        Some(current.clone())
    }

    /// Sets a value by dotted path, creating intermediate mappings.
    pub fn set_value(&self, path: &str, value: Value) {
        let mut data = self.data.lock().unwrap();
        set_path(&mut data, path, value);
    }

    /// Persists the current configuration to `config.yaml`.
    pub fn save(&self) -> Result<()> {
        let data = self.data.lock().unwrap();
        let rendered = serde_yaml::to_string(&*data)?;
        fs::write(self.config_dir.join("config.yaml"), rendered)?;
        Ok(())
    }

    impl_u64_config!(gps_poll_period_ms, "gps.poll_period_ms", DEFAULT_GPS_POLL_PERIOD_MS);
    impl_u64_config!(gps_tick_ms, "gps.tick_ms", DEFAULT_GPS_TICK_MS);
    impl_u64_config!(gps_valid_threshold, "gps.valid_threshold", DEFAULT_GPS_VALID_THRESHOLD);
    impl_u64_config!(audio_null_duration_ms, "audio.null_duration_ms", DEFAULT_NULL_DURATION_MS);
    impl_f64_config!(gps_min_valid_speed_kmh, "gps.min_valid_speed_kmh", DEFAULT_GPS_MIN_VALID_SPEED);
    impl_string_config!(audio_driver, "audio.driver", DEFAULT_AUDIO_DRIVER);
    impl_string_config!(audio_player_command, "audio.player_command", DEFAULT_PLAYER_COMMAND);

    /// Route selected at startup; `None` until one is configured.
    pub fn selected_route(&self) -> Option<i32> {
        match self.get_value("routes.selected") {
            Some(Value::Number(n)) => n.as_i64().filter(|id| *id >= 0).map(|id| id as i32),
            _ => None,
        }
    }

    fn path_or(&self, key: &str, fallback: PathBuf) -> PathBuf {
        match self.get_value(key) {
            Some(Value::String(s)) if !s.is_empty() => PathBuf::from(s),
            _ => fallback,
        }
    }

    /// Data directory, created on first access.
    pub fn data_dir(&self) -> Result<PathBuf> {
        let dir = self.path_or("app.data_dir", self.config_dir.join("data"));
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn media_dir(&self) -> Result<PathBuf> {
        let dir = self.path_or("app.media_dir", self.data_dir()?.join("media"));
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn track_path(&self) -> Result<PathBuf> {
        Ok(self.path_or("gps.track_path", self.data_dir()?.join("gps.track")))
    }

    pub fn routes_db_path(&self) -> Result<PathBuf> {
        Ok(self.path_or("routes.db_path", self.data_dir()?.join("routes.yaml")))
    }

    pub fn replay_path(&self) -> Option<PathBuf> {
        match self.get_value("gps.replay_path") {
            Some(Value::String(s)) if !s.is_empty() => Some(PathBuf::from(s)),
            _ => None,
        }
    }
}

/// Recursively merges `other` over `base`; mappings merge key by key,
/// everything else is replaced.
fn merge_yaml(base: &mut Value, other: &Value) {
    match (base, other) {
        (Value::Mapping(base_map), Value::Mapping(other_map)) => {
            for (key, value) in other_map {
                match base_map.get_mut(key) {
                    Some(existing) => merge_yaml(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, other) => *base = other.clone(),
    }
}

fn set_path(root: &mut Value, path: &str, value: Value) {
    let mut current = root;
    let keys: Vec<&str> = path.split('.').collect();

    for (i, key) in keys.iter().enumerate() {
        let key_value = Value::String((*key).to_string());

        if !current.is_mapping() {
            *current = Value::Mapping(Mapping::new());
        }
        let map = current.as_mapping_mut().expect("mapping ensured above");

        if i == keys.len() - 1 {
            map.insert(key_value, value);
            return;
        }

        current = map
            .entry(key_value)
            .or_insert_with(|| Value::Mapping(Mapping::new()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_from(yaml: &str) -> Config {
        let mut merged: Value = serde_yaml::from_str(DEFAULT_CONFIG).unwrap();
        let external: Value = serde_yaml::from_str(yaml).unwrap();
        merge_yaml(&mut merged, &external);
        Config {
            config_dir: PathBuf::from("/tmp"),
            data: Mutex::new(merged),
        }
    }

    #[test]
    fn defaults_apply_when_keys_are_missing() {
        let config = config_from("{}");
        assert_eq!(config.gps_poll_period_ms(), 1000);
        assert_eq!(config.gps_tick_ms(), 250);
        assert_eq!(config.gps_valid_threshold(), 4);
        assert_eq!(config.gps_min_valid_speed_kmh(), 6.0);
        assert_eq!(config.audio_driver(), "null");
        assert_eq!(config.selected_route(), None);
    }

    #[test]
    fn external_values_override_defaults() {
        let config = config_from(
            "gps:\n  poll_period_ms: 500\n  min_valid_speed_kmh: 3.5\nroutes:\n  selected: 12\n",
        );
        assert_eq!(config.gps_poll_period_ms(), 500);
        assert_eq!(config.gps_min_valid_speed_kmh(), 3.5);
        assert_eq!(config.selected_route(), Some(12));
        // Untouched siblings keep their defaults.
        assert_eq!(config.gps_tick_ms(), 250);
    }

    #[test]
    fn set_value_creates_intermediate_mappings() {
        let config = config_from("{}");
        config.set_value("audio.driver", Value::String("process".into()));
        assert_eq!(config.audio_driver(), "process");

        config.set_value("new.nested.key", Value::Number(7.into()));
        assert_eq!(
            config.get_value("new.nested.key"),
            Some(Value::Number(7.into()))
        );
    }

    #[test]
    fn negative_selected_route_means_none() {
        let config = config_from("routes:\n  selected: -1\n");
        assert_eq!(config.selected_route(), None);
    }

    #[test]
    fn load_merges_the_external_config_file_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.yaml"),
            "gps:\n  poll_period_ms: 2000\naudio:\n  driver: process\n",
        )
        .unwrap();

        let config = Config::load(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(config.gps_poll_period_ms(), 2000);
        assert_eq!(config.audio_driver(), "process");
        // Keys absent from the file keep their embedded defaults.
        assert_eq!(config.gps_valid_threshold(), 4);
    }

    #[test]
    fn save_persists_changes_for_the_next_load() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().to_str().unwrap()).unwrap();

        config.set_value("routes.selected", Value::Number(12.into()));
        config.save().unwrap();

        let reloaded = Config::load(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(reloaded.selected_route(), Some(12));
    }
}
