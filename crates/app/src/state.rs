use std::{fs, path::PathBuf};

use common::crypto::{DEFAULT_KEY_SIZE, MIN_KEY_SIZE};
use common::keystore::{FsKeyStorage, KeyStore, StorageError};
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "vouch";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const KEYS_DIR_NAME: &str = "keys";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// RSA modulus size for newly generated identities
    #[serde(default = "default_key_size")]
    pub key_size: usize,
    /// Key directory (defaults to vouch_dir/keys)
    #[serde(default)]
    pub keys_dir: Option<PathBuf>,
    /// Default log level, overridden by --log-level and RUST_LOG
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_key_size() -> usize {
    DEFAULT_KEY_SIZE
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            key_size: default_key_size(),
            keys_dir: None,
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the vouch directory (~/.vouch)
    pub vouch_dir: PathBuf,
    /// Path to the key directory
    pub keys_path: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

impl AppState {
    /// Get the vouch directory path (custom or default ~/.vouch)
    pub fn vouch_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    fn keys_path(vouch_dir: &std::path::Path, config: &AppConfig) -> PathBuf {
        config
            .keys_dir
            .clone()
            .unwrap_or_else(|| vouch_dir.join(KEYS_DIR_NAME))
    }

    /// Initialize a new vouch state directory
    pub fn init(
        custom_path: Option<PathBuf>,
        config: Option<AppConfig>,
    ) -> Result<Self, StateError> {
        let vouch_dir = Self::vouch_dir(custom_path)?;

        if vouch_dir.exists() {
            return Err(StateError::AlreadyInitialized);
        }

        let config = config.unwrap_or_default();
        if config.key_size < MIN_KEY_SIZE {
            return Err(StateError::InvalidConfig(format!(
                "key_size {} is below the minimum of {} bits",
                config.key_size, MIN_KEY_SIZE
            )));
        }

        fs::create_dir_all(&vouch_dir)?;

        let keys_path = Self::keys_path(&vouch_dir, &config);
        fs::create_dir_all(&keys_path)?;

        let config_path = vouch_dir.join(CONFIG_FILE_NAME);
        let config_toml = toml::to_string_pretty(&config)?;
        fs::write(&config_path, config_toml)?;

        Ok(Self {
            vouch_dir,
            keys_path,
            config_path,
            config,
        })
    }

    /// Load existing state from the vouch directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let vouch_dir = Self::vouch_dir(custom_path)?;

        if !vouch_dir.exists() {
            return Err(StateError::NotInitialized);
        }

        let config_path = vouch_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            return Err(StateError::MissingFile(CONFIG_FILE_NAME.to_string()));
        }

        let config_toml = fs::read_to_string(&config_path)?;
        let config: AppConfig = toml::from_str(&config_toml)?;

        let keys_path = Self::keys_path(&vouch_dir, &config);
        if !keys_path.exists() {
            return Err(StateError::MissingFile(format!("{}/", keys_path.display())));
        }

        Ok(Self {
            vouch_dir,
            keys_path,
            config_path,
            config,
        })
    }

    /// Key store over the configured key directory
    pub fn key_store(&self) -> Result<KeyStore<FsKeyStorage>, StateError> {
        let storage = FsKeyStorage::open(&self.keys_path)?;
        Ok(KeyStore::new(storage).with_key_size(self.config.key_size))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("vouch directory not initialized. Run 'vouch init' first")]
    NotInitialized,

    #[error("vouch directory already initialized")]
    AlreadyInitialized,

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("missing required file: {0}")]
    MissingFile(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("key storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_then_load() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("vouch");

        let state = AppState::init(Some(dir.clone()), None).unwrap();
        assert_eq!(state.vouch_dir, dir);
        assert_eq!(state.keys_path, dir.join("keys"));
        assert!(state.keys_path.is_dir());
        assert!(state.config_path.is_file());

        let loaded = AppState::load(Some(dir)).unwrap();
        assert_eq!(loaded.config, AppConfig::default());
        assert_eq!(loaded.keys_path, state.keys_path);
    }

    #[test]
    fn test_init_twice_fails() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("vouch");

        AppState::init(Some(dir.clone()), None).unwrap();
        let result = AppState::init(Some(dir), None);
        assert!(matches!(result, Err(StateError::AlreadyInitialized)));
    }

    #[test]
    fn test_load_uninitialized() {
        let temp = TempDir::new().unwrap();
        let result = AppState::load(Some(temp.path().join("missing")));
        assert!(matches!(result, Err(StateError::NotInitialized)));
    }

    #[test]
    fn test_load_reports_missing_config() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("vouch");
        AppState::init(Some(dir.clone()), None).unwrap();
        fs::remove_file(dir.join(CONFIG_FILE_NAME)).unwrap();

        match AppState::load(Some(dir)) {
            Err(StateError::MissingFile(name)) => assert_eq!(name, "config.toml"),
            other => panic!("expected MissingFile, got {:?}", other),
        }
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("vouch");
        AppState::init(Some(dir.clone()), None).unwrap();
        fs::write(dir.join(CONFIG_FILE_NAME), "key_size = 3072\n").unwrap();

        let state = AppState::load(Some(dir)).unwrap();
        assert_eq!(state.config.key_size, 3072);
        assert_eq!(state.config.log_level, "info");
        assert!(state.config.keys_dir.is_none());
        assert_eq!(state.key_store().unwrap().key_size(), 3072);
    }

    #[test]
    fn test_custom_keys_dir() {
        let temp = TempDir::new().unwrap();
        let keys_dir = temp.path().join("elsewhere");
        let config = AppConfig {
            keys_dir: Some(keys_dir.clone()),
            ..AppConfig::default()
        };

        let state = AppState::init(Some(temp.path().join("vouch")), Some(config)).unwrap();
        assert_eq!(state.keys_path, keys_dir);
        assert!(keys_dir.is_dir());
        assert_eq!(state.key_store().unwrap().storage().root(), keys_dir.as_path());
    }

    #[test]
    fn test_rejects_small_key_size() {
        let temp = TempDir::new().unwrap();
        let config = AppConfig {
            key_size: 1024,
            ..AppConfig::default()
        };
        let result = AppState::init(Some(temp.path().join("vouch")), Some(config));
        assert!(matches!(result, Err(StateError::InvalidConfig(_))));
        assert!(!temp.path().join("vouch").exists());
    }
}
