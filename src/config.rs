use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const MIN_ACTIVATION_DELAY_MS: u64 = 100;
pub const MAX_ACTIVATION_DELAY_MS: u64 = 2000;

const CONFIG_ENV: &str = "SPACEBOOT_CONFIG";

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub palette: PaletteConfig,
    #[serde(default)]
    pub system: SystemConfig,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DispatchConfig {
    /// Re-dispatching the same alias inside this window is ignored (0 disables).
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
    /// Upper bound for any external tool (tasklist, pgrep, wmctrl, osascript...).
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StorageConfig {
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default = "default_seed_sample")]
    pub seed_sample: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_enabled")]
    pub enabled: bool,
    #[serde(default = "default_rpc_address")]
    pub address: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NotificationsConfig {
    #[serde(default = "default_notifications_enabled")]
    pub enabled: bool,
}

/// Settings consumed by the UI-side command palette.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaletteConfig {
    #[serde(default = "default_prefix_key")]
    pub prefix_key: String,
    #[serde(default = "default_activation_delay_ms")]
    pub activation_delay_ms: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SystemConfig {
    #[serde(default = "default_launch_at_login")]
    pub launch_at_login: bool,
}

// Defaults for DispatchConfig
fn default_cooldown_ms() -> u64 {
    400
}

fn default_tool_timeout_secs() -> u64 {
    5
}

// Defaults for StorageConfig
fn default_seed_sample() -> bool {
    true
}

// Defaults for RpcConfig
fn default_rpc_enabled() -> bool {
    true
}

fn default_rpc_address() -> String {
    "127.0.0.1:47621".to_string()
}

// Defaults for NotificationsConfig
fn default_notifications_enabled() -> bool {
    true
}

// Defaults for PaletteConfig
fn default_prefix_key() -> String {
    "Space".to_string()
}

fn default_activation_delay_ms() -> u64 {
    500
}

// Defaults for SystemConfig
fn default_launch_at_login() -> bool {
    false
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: default_cooldown_ms(),
            tool_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            seed_sample: default_seed_sample(),
        }
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            enabled: default_rpc_enabled(),
            address: default_rpc_address(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: default_notifications_enabled(),
        }
    }
}

impl Default for PaletteConfig {
    fn default() -> Self {
        Self {
            prefix_key: default_prefix_key(),
            activation_delay_ms: default_activation_delay_ms(),
        }
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            launch_at_login: default_launch_at_login(),
        }
    }
}

impl DispatchConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

impl Config {
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| data_dir().join("aliases.db"))
    }
}

pub fn validate_activation_delay(delay: u64) -> Result<(), ValidationError> {
    if !(MIN_ACTIVATION_DELAY_MS..=MAX_ACTIVATION_DELAY_MS).contains(&delay) {
        return Err(ValidationError::DelayOutOfRange {
            value: delay,
            min: MIN_ACTIVATION_DELAY_MS,
            max: MAX_ACTIVATION_DELAY_MS,
        });
    }
    Ok(())
}

fn validate(config: &Config) -> Result<()> {
    if config.dispatch.tool_timeout_secs == 0 {
        bail!("dispatch.tool_timeout_secs must be at least 1");
    }
    if config.rpc.enabled && config.rpc.address.trim().is_empty() {
        bail!("rpc.address must not be empty when rpc is enabled");
    }
    if config.palette.prefix_key.trim().is_empty() {
        bail!("palette.prefixKey must not be empty");
    }
    validate_activation_delay(config.palette.activation_delay_ms)?;
    Ok(())
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("spaceboot")
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("spaceboot")
}

pub fn get_config_path() -> PathBuf {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => config_dir().join("config.json"),
    }
}

pub fn load_or_create_config() -> Result<Config> {
    let path = get_config_path();

    if path.exists() {
        load_and_validate_config()
    } else {
        let config = Config::default();
        save_config(&config)?;
        Ok(config)
    }
}

/// Reads the config file and rejects it if any value is out of range.
pub fn load_and_validate_config() -> Result<Config> {
    load_and_validate_config_at(&get_config_path())
}

pub fn load_and_validate_config_at(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path).context("failed to read config file")?;
    let config =
        serde_json::from_str::<Config>(&content).context("failed to parse config file")?;
    validate(&config).context("invalid config")?;
    Ok(config)
}

pub fn save_config(config: &Config) -> Result<()> {
    save_config_at(&get_config_path(), config)
}

pub fn save_config_at(path: &Path, config: &Config) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create config directory")?;
    }
    let content = serde_json::to_string_pretty(config).context("failed to serialize config")?;
    fs::write(path, content).context("failed to write config file")?;
    Ok(())
}

/// Apply `change` to the live config and persist the result at `path`.
/// Starts from the shared copy so edits made elsewhere are kept; the shared
/// copy is only replaced once the write succeeded.
pub fn update_shared_config_at(
    shared: &RwLock<Config>,
    path: &Path,
    change: impl FnOnce(&mut Config),
) -> Result<Config> {
    let mut config = shared.write().unwrap_or_else(PoisonError::into_inner);
    let mut updated = config.clone();
    change(&mut updated);
    save_config_at(path, &updated)?;
    *config = updated.clone();
    Ok(updated)
}
