//! # PMOCast Configuration Module
//!
//! This module provides configuration management for PMOCast, including:
//! - Loading configuration from YAML files
//! - Merging with embedded default configuration
//! - Environment variable overrides
//! - Type-safe getters and setters for configuration values
//! - Thread-safe singleton access pattern
//!
//! ## Usage
//!
//! ```no_run
//! use pmoconfig::get_config;
//!
//! let config = get_config();
//! let port = config.get_media_server_port();
//! let root = config.get_media_root()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{anyhow, Result};
use dirs::home_dir;
use lazy_static::lazy_static;
use serde_yaml::{Mapping, Number, Value};
use std::{
    env, fs,
    net::UdpSocket,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tracing::info;

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("pmocast.yaml");

lazy_static! {
    static ref CONFIG: Arc<Config> =
        Arc::new(Config::load_config("").expect("Failed to load PMOCast configuration"));
}

const ENV_CONFIG_DIR: &str = "PMOCAST_CONFIG";
const ENV_PREFIX: &str = "PMOCAST_CONFIG__";

// Default values for configuration
const DEFAULT_MEDIA_PORT: u16 = 8090;
const DEFAULT_MEDIA_ROOT: &str = "~/Music";
const DEFAULT_RECEIVER_APP_ID: &str = "CC1AD845";
const DEFAULT_WORKER_THREAD: &str = "pmocast-session";
const DEFAULT_LOG_MIN_LEVEL: &str = "INFO";
const DEFAULT_LOG_ENABLE_CONSOLE: bool = true;

/// Macro to generate getter/setter for bool values with default
macro_rules! impl_bool_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<bool> {
            match self.get_value($path) {
                Ok(Value::Bool(b)) => Ok(b),
                _ => Ok($default),
            }
        }

        pub fn $setter(&self, value: bool) -> Result<()> {
            self.set_value($path, Value::Bool(value))
        }
    };
}

/// Macro to generate getter/setter for string values with default
macro_rules! impl_string_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> String {
            match self.get_value($path) {
                Ok(Value::String(s)) if !s.trim().is_empty() => s,
                _ => $default.to_string(),
            }
        }

        pub fn $setter(&self, value: String) -> Result<()> {
            self.set_value($path, Value::String(value))
        }
    };
}

/// Configuration manager for PMOCast
///
/// Holds the merged YAML tree (embedded defaults, user `config.yaml`,
/// environment overrides) behind a mutex, and exposes typed accessors.
///
/// A configuration built with [`Config::from_yaml_str`] has no backing
/// file: setters update the in-memory tree only.
#[derive(Debug)]
pub struct Config {
    config_dir: String,
    path: String,
    data: Mutex<Value>,
}

impl Clone for Config {
    fn clone(&self) -> Self {
        let data = self.lock_data().clone();
        Self {
            config_dir: self.config_dir.clone(),
            path: self.path.clone(),
            data: Mutex::new(data),
        }
    }
}

impl Config {
    /// Finds a config directory by trying different locations in order
    fn find_config_dir(directory: &str) -> String {
        if !directory.is_empty() {
            return directory.to_string();
        }

        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %env_path, "Trying to load config from env");
            return env_path;
        }

        if Path::new(".pmocast").exists() {
            return ".pmocast".to_string();
        }

        if let Some(home) = home_dir() {
            let home_config = home.join(".pmocast");
            if home_config.exists() {
                return home_config.to_string_lossy().to_string();
            }
        }

        ".pmocast".to_string()
    }

    /// Validates and prepares a config directory
    fn validate_config_dir(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(anyhow!("{} is not a directory", path.display()));
        }

        let test_file = path.join(".write_test");
        fs::write(&test_file, b"test")?;
        fs::remove_file(&test_file)?;

        Ok(())
    }

    /// Loads the configuration from the specified directory
    ///
    /// The directory is searched in the following order:
    /// 1. The provided `directory` parameter if not empty
    /// 2. The `PMOCAST_CONFIG` environment variable
    /// 3. `.pmocast` in the current directory
    /// 4. `.pmocast` in the user's home directory
    ///
    /// The embedded defaults are merged with `config.yaml` from that
    /// directory, `PMOCAST_CONFIG__*` overrides are applied, and the merged
    /// tree is written back.
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::find_config_dir(directory);
        Self::validate_config_dir(Path::new(&config_dir))?;
        info!(config_dir = %config_dir, "Using config directory");

        let config_file_path = Path::new(&config_dir).join("config.yaml");
        let path = config_file_path.to_string_lossy().to_string();

        let mut config_value = lower_keys_value(serde_yaml::from_str(DEFAULT_CONFIG)?);

        if let Ok(data) = fs::read(&path) {
            info!(config_file = %path, "Loaded config file");
            let external_value = lower_keys_value(serde_yaml::from_slice(&data)?);
            merge_yaml(&mut config_value, &external_value);
        } else {
            info!(config_file = %path, "Config file not found, using default embedded config");
        }

        apply_env_overrides(&mut config_value, env::vars());

        let config = Config {
            config_dir,
            path,
            data: Mutex::new(config_value),
        };

        config.save()?;
        Ok(config)
    }

    /// Builds an in-memory configuration from a YAML document merged over
    /// the embedded defaults. Environment overrides are not applied.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let mut value = lower_keys_value(serde_yaml::from_str(DEFAULT_CONFIG)?);
        if !yaml.trim().is_empty() {
            let external = lower_keys_value(serde_yaml::from_str(yaml)?);
            merge_yaml(&mut value, &external);
        }
        Ok(Config {
            config_dir: String::new(),
            path: String::new(),
            data: Mutex::new(value),
        })
    }

    fn lock_data(&self) -> std::sync::MutexGuard<'_, Value> {
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Directory the configuration was loaded from (empty for in-memory configs).
    pub fn config_dir(&self) -> &str {
        &self.config_dir
    }

    /// Saves the current configuration to the config.yaml file
    pub fn save(&self) -> Result<()> {
        if self.path.is_empty() {
            return Ok(());
        }
        let yaml = serde_yaml::to_string(&*self.lock_data())?;
        fs::write(&self.path, yaml)?;
        Ok(())
    }

    /// Sets a configuration value at the specified path and saves it
    ///
    /// * `path` - Array of keys representing the path (e.g., `&["host", "media_server", "http_port"]`)
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        {
            let mut data = self.lock_data();
            set_value_internal(&mut data, path, value)?;
        }
        self.save()
    }

    /// Gets a configuration value at the specified path
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.lock_data();
        get_value_internal(&data, path)
    }

    impl_string_config!(
        get_media_server_address_raw,
        set_media_server_address,
        &["host", "media_server", "address"],
        ""
    );

    /// Address announced to the receiver in media URLs.
    ///
    /// Falls back to the local IP used to reach the network when not configured.
    pub fn get_media_server_address(&self) -> String {
        let configured = self.get_media_server_address_raw();
        if configured.is_empty() {
            guess_local_ip()
        } else {
            configured
        }
    }

    /// Gets the media HTTP port from configuration
    pub fn get_media_server_port(&self) -> u16 {
        match self.get_value(&["host", "media_server", "http_port"]) {
            Ok(Value::Number(n)) => n
                .as_u64()
                .and_then(|p| u16::try_from(p).ok())
                .unwrap_or_else(|| {
                    tracing::warn!("Invalid media port {}, using default {}", n, DEFAULT_MEDIA_PORT);
                    DEFAULT_MEDIA_PORT
                }),
            Ok(Value::String(s)) => s.parse::<u16>().unwrap_or_else(|_| {
                tracing::warn!("Invalid media port '{}', using default {}", s, DEFAULT_MEDIA_PORT);
                DEFAULT_MEDIA_PORT
            }),
            _ => DEFAULT_MEDIA_PORT,
        }
    }

    /// Sets the media HTTP port in configuration
    pub fn set_media_server_port(&self, port: u16) -> Result<()> {
        self.set_value(
            &["host", "media_server", "http_port"],
            Value::Number(Number::from(port)),
        )
    }

    /// Root directory of the local library served to the receiver.
    ///
    /// A leading `~` is expanded to the home directory; relative paths are
    /// resolved against the configuration directory.
    pub fn get_media_root(&self) -> Result<PathBuf> {
        let raw = match self.get_value(&["host", "media_server", "root"]) {
            Ok(Value::String(s)) if !s.trim().is_empty() => s,
            _ => DEFAULT_MEDIA_ROOT.to_string(),
        };

        if let Some(rest) = raw.strip_prefix("~") {
            let home = home_dir().ok_or_else(|| anyhow!("Cannot expand ~: no home directory"))?;
            return Ok(home.join(rest.trim_start_matches('/')));
        }

        let path = PathBuf::from(&raw);
        if path.is_absolute() || self.config_dir.is_empty() {
            Ok(path)
        } else {
            Ok(Path::new(&self.config_dir).join(path))
        }
    }

    pub fn set_media_root(&self, root: String) -> Result<()> {
        self.set_value(&["host", "media_server", "root"], Value::String(root))
    }

    impl_string_config!(
        get_receiver_app_id,
        set_receiver_app_id,
        &["receiver", "app_id"],
        DEFAULT_RECEIVER_APP_ID
    );

    impl_string_config!(
        get_worker_thread_name,
        set_worker_thread_name,
        &["session", "worker_thread"],
        DEFAULT_WORKER_THREAD
    );

    impl_bool_config!(
        get_log_enable_console,
        set_log_enable_console,
        &["host", "logger", "enable_console"],
        DEFAULT_LOG_ENABLE_CONSOLE
    );

    impl_string_config!(
        get_log_min_level,
        set_log_min_level,
        &["host", "logger", "min_level"],
        DEFAULT_LOG_MIN_LEVEL
    );
}

/// Returns the global configuration instance, loaded on first access.
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}

/// Best guess of the local address reachable by devices on the LAN.
pub fn guess_local_ip() -> String {
    match UdpSocket::bind("0.0.0.0:0") {
        Ok(socket) => {
            if socket.connect("8.8.8.8:80").is_ok() {
                if let Ok(local_addr) = socket.local_addr() {
                    return local_addr.ip().to_string();
                }
            }
            "127.0.0.1".to_string()
        }
        Err(_) => "127.0.0.1".to_string(),
    }
}

fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
    if path.is_empty() {
        *data = value;
        return Ok(());
    }
    if let Value::Mapping(map) = data {
        let key_value = Value::String(path[0].to_lowercase());
        if path.len() == 1 {
            map.insert(key_value, value);
        } else {
            let entry = map
                .entry(key_value)
                .or_insert(Value::Mapping(Mapping::new()));
            set_value_internal(entry, &path[1..], value)?;
        }
        Ok(())
    } else {
        Err(anyhow!("Current node is not a map"))
    }
}

fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
    let mut current = data;
    for (i, key) in path.iter().enumerate() {
        if let Value::Mapping(map) = current {
            match map.get(&Value::String(key.to_lowercase())) {
                Some(next) => current = next,
                None => return Err(anyhow!("Path {} does not exist", path[..=i].join("."))),
            }
        } else {
            return Err(anyhow!("Path {} is not a Config", path[..i].join(".")));
        }
    }
    Ok(current.clone())
}

fn apply_env_overrides(config: &mut Value, vars: impl Iterator<Item = (String, String)>) {
    for (key, value) in vars {
        if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
            let key_path = stripped.split("__").collect::<Vec<_>>();
            let yaml_value = convert_env_value(&value);
            if let Err(err) = set_value_internal(config, &key_path, yaml_value) {
                tracing::warn!(variable = %key, "Ignoring config override: {}", err);
            }
        }
    }
}

fn convert_env_value(value: &str) -> Value {
    serde_yaml::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.to_string()))
}

fn lower_keys_value(value: Value) -> Value {
    match value {
        Value::Mapping(map) => {
            let mut new_map = Mapping::new();
            for (k, v) in map {
                let key = match k {
                    Value::String(s) => Value::String(s.to_lowercase()),
                    other => other,
                };
                new_map.insert(key, lower_keys_value(v));
            }
            Value::Mapping(new_map)
        }
        Value::Sequence(seq) => Value::Sequence(seq.into_iter().map(lower_keys_value).collect()),
        _ => value,
    }
}

/// Merges external YAML configuration into default configuration
///
/// Mappings are merged key by key; scalars and sequences from `external`
/// replace the default value.
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(),
    }
}
