use crate::error::AppError;
use crate::models::{GlobalSettings, ReconnectChangeCategory, ReconnectChoice};
use crate::services::ChoiceStore;
use async_trait::async_trait;
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

const CONFIG_FILENAME: &str = "harborvpn_settings.json";

static CONFIG_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

#[derive(Serialize, Deserialize, Default, PartialEq, Clone, Debug)]
pub struct AppConfig {
    pub settings: Option<GlobalSettings>,
    pub reconnect_choices: Option<HashMap<ReconnectChangeCategory, ReconnectChoice>>,
}

pub fn get_config_path() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("com", "harborvpn", "HarborVPN") {
        let config_dir = proj_dirs.config_dir();
        if !config_dir.exists() {
            let _ = fs::create_dir_all(config_dir);
        }
        return config_dir.join(CONFIG_FILENAME);
    }

    std::env::current_dir()
        .unwrap_or_default()
        .join(CONFIG_FILENAME)
}

pub fn load_config() -> Result<AppConfig, AppError> {
    load_config_from(&get_config_path())
}

pub fn save_config(config: &AppConfig) -> Result<(), AppError> {
    save_config_to(&get_config_path(), config)
}

pub fn load_config_from(path: &Path) -> Result<AppConfig, AppError> {
    let _lock = CONFIG_LOCK.lock();
    load_config_inner(path)
}

pub fn save_config_to(path: &Path, config: &AppConfig) -> Result<(), AppError> {
    let _lock = CONFIG_LOCK.lock();
    save_config_inner(path, config)
}

/// Read-modify-write under the config lock, so concurrent writers cannot
/// drop each other's fields.
pub fn update_config_at(
    path: &Path,
    transform: impl FnOnce(&mut AppConfig),
) -> Result<(), AppError> {
    let _lock = CONFIG_LOCK.lock();
    let mut config = match load_config_inner(path) {
        Ok(config) => config,
        Err(err) => {
            warn!("Unreadable config, starting from defaults: {}", err);
            AppConfig::default()
        }
    };
    transform(&mut config);
    save_config_inner(path, &config)
}

fn load_config_inner(path: &Path) -> Result<AppConfig, AppError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(AppConfig::default())
        }
        Err(err) => return Err(AppError::Io(err)),
    };

    // Early builds stored a single custom DNS server in a flat field.
    let legacy_dns = serde_json::from_str::<serde_json::Value>(&contents)
        .ok()
        .and_then(|value| {
            value
                .get("custom_dns_server")
                .and_then(|server| server.as_str())
                .map(|server| server.to_string())
        });

    let mut config: AppConfig = serde_json::from_str(&contents)?;

    if let Some(server) = legacy_dns {
        info!("Migrating legacy custom DNS server entry");
        let settings = config.settings.get_or_insert_with(GlobalSettings::default);
        if settings.custom_dns.addresses.is_empty() {
            settings.custom_dns.addresses.push(server);
        }
    }

    Ok(config)
}

fn save_config_inner(path: &Path, config: &AppConfig) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    let contents = serde_json::to_string_pretty(config)?;
    fs::write(path, contents)?;
    Ok(())
}

pub struct MemoryChoiceStore {
    choices: Mutex<HashMap<ReconnectChangeCategory, ReconnectChoice>>,
}

impl MemoryChoiceStore {
    pub fn new() -> Self {
        Self {
            choices: Mutex::new(HashMap::new()),
        }
    }

    fn lock_choices(&self) -> MutexGuard<'_, HashMap<ReconnectChangeCategory, ReconnectChoice>> {
        self.choices
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemoryChoiceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChoiceStore for MemoryChoiceStore {
    async fn get(&self, category: ReconnectChangeCategory) -> ReconnectChoice {
        self.lock_choices()
            .get(&category)
            .copied()
            .unwrap_or_default()
    }

    async fn set(&self, category: ReconnectChangeCategory, choice: ReconnectChoice) {
        self.lock_choices().insert(category, choice);
    }
}

/// Persists the remembered reconnect choices in the shared config file.
pub struct FileChoiceStore {
    path: PathBuf,
}

impl FileChoiceStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn at_default_path() -> Self {
        Self::new(get_config_path())
    }
}

#[async_trait]
impl ChoiceStore for FileChoiceStore {
    async fn get(&self, category: ReconnectChangeCategory) -> ReconnectChoice {
        match load_config_from(&self.path) {
            Ok(config) => config
                .reconnect_choices
                .and_then(|choices| choices.get(&category).copied())
                .unwrap_or_default(),
            Err(err) => {
                warn!("Failed to read reconnect choices: {}", err);
                ReconnectChoice::default()
            }
        }
    }

    async fn set(&self, category: ReconnectChangeCategory, choice: ReconnectChoice) {
        let result = update_config_at(&self.path, |config| {
            config
                .reconnect_choices
                .get_or_insert_with(HashMap::new)
                .insert(category, choice);
        });
        if let Err(err) = result {
            warn!("Failed to persist reconnect choice: {}", err);
        }
    }
}
