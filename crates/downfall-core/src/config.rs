// Settings document: shape, defaults, typed mutations, and file persistence.
//
// The document is loaded once at startup. Missing sections and fields take
// explicit defaults so engines never see a partially-shaped config.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

use crate::error::ConfigError;

/// File name of the settings document.
pub const CONFIG_FILE_NAME: &str = "downfall_config.json";

const DEFAULT_PRESENCE_DETAILS: &str = "Playing Valorant with Downfall";

// ---------------------------------------------------------------------------
// Document shape
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub instalock: InstalockConfig,
    pub map_dodge: MapDodgeConfig,
    pub timing: TimingConfig,
    pub app: AppBehaviorConfig,
    pub discord: PresenceConfig,
}

/// Character-lock automation settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstalockConfig {
    pub active: bool,
    pub default_agent: Option<String>,
    /// Map display name -> agent id. Takes precedence over `default_agent`.
    pub map_overrides: BTreeMap<String, String>,
}

impl InstalockConfig {
    /// Agent to lock on `map_name`: the map override if present, otherwise
    /// the default agent.
    pub fn agent_for_map(&self, map_name: &str) -> Option<&str> {
        self.map_overrides
            .get(map_name)
            .or(self.default_agent.as_ref())
            .map(String::as_str)
    }
}

/// Map-dodge automation settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MapDodgeConfig {
    pub active: bool,
    pub blacklisted_maps: BTreeSet<String>,
}

impl MapDodgeConfig {
    pub fn is_blacklisted(&self, map_name: &str) -> bool {
        self.blacklisted_maps.contains(map_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimingPreset {
    #[default]
    Instant,
    Humanized,
    Custom,
}

impl TimingPreset {
    /// Parse a preset name, falling back to `Instant` for unknown values.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "humanized" => TimingPreset::Humanized,
            "custom" => TimingPreset::Custom,
            _ => TimingPreset::Instant,
        }
    }
}

/// Delays applied around the lock action. The literal millisecond values are
/// only used by the `custom` preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimingConfig {
    #[serde(deserialize_with = "lenient_preset")]
    pub preset: TimingPreset,
    pub select_delay: u64,
    pub lock_delay: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppBehaviorConfig {
    pub minimize_on_close: bool,
    pub start_minimized: bool,
}

/// Rich-presence settings. Stored under the `discord` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PresenceConfig {
    pub enabled: bool,
    pub details: String,
    pub state: String,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            details: DEFAULT_PRESENCE_DETAILS.to_string(),
            state: String::new(),
        }
    }
}

fn lenient_preset<'de, D>(deserializer: D) -> Result<TimingPreset, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().map(TimingPreset::parse).unwrap_or_default())
}

impl AppConfig {
    /// Parse a settings document and normalize it.
    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        let mut config: AppConfig = serde_json::from_str(data)?;
        config.normalize();
        Ok(config)
    }

    /// Drop values that would be meaningless to the engines: blank agent
    /// ids and blank map names.
    pub fn normalize(&mut self) {
        if self
            .instalock
            .default_agent
            .as_deref()
            .is_some_and(|a| a.trim().is_empty())
        {
            self.instalock.default_agent = None;
        }
        self.instalock
            .map_overrides
            .retain(|map, agent| !map.trim().is_empty() && !agent.trim().is_empty());
        self.map_dodge
            .blacklisted_maps
            .retain(|map| !map.trim().is_empty());
    }
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

/// A single settings change requested by the user interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    SetLockActive(bool),
    /// Replace the default agent. Map overrides are left untouched.
    SetDefaultAgent(Option<String>),
    /// Set (`Some`) or clear (`None`) the override for one map.
    SetMapOverride {
        map: String,
        agent: Option<String>,
    },
    ReplaceMapOverrides(BTreeMap<String, String>),
    SetDodgeActive(bool),
    SetMapBlacklisted {
        map: String,
        blacklisted: bool,
    },
    ToggleBlacklistedMap(String),
    SetTiming(TimingConfig),
    SetAppBehavior(AppBehaviorConfig),
    SetPresence(PresenceConfig),
}

impl Mutation {
    pub fn apply(self, config: &mut AppConfig) {
        match self {
            Mutation::SetLockActive(active) => config.instalock.active = active,
            Mutation::SetDefaultAgent(agent) => config.instalock.default_agent = agent,
            Mutation::SetMapOverride { map, agent } => match agent {
                Some(agent) => {
                    config.instalock.map_overrides.insert(map, agent);
                }
                None => {
                    config.instalock.map_overrides.remove(&map);
                }
            },
            Mutation::ReplaceMapOverrides(overrides) => {
                config.instalock.map_overrides = overrides;
            }
            Mutation::SetDodgeActive(active) => config.map_dodge.active = active,
            Mutation::SetMapBlacklisted { map, blacklisted } => {
                if blacklisted {
                    config.map_dodge.blacklisted_maps.insert(map);
                } else {
                    config.map_dodge.blacklisted_maps.remove(&map);
                }
            }
            Mutation::ToggleBlacklistedMap(map) => {
                if !config.map_dodge.blacklisted_maps.remove(&map) {
                    config.map_dodge.blacklisted_maps.insert(map);
                }
            }
            Mutation::SetTiming(timing) => config.timing = timing,
            Mutation::SetAppBehavior(app) => config.app = app,
            Mutation::SetPresence(presence) => config.discord = presence,
        }
        config.normalize();
    }
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// Load/save boundary for the settings document.
#[async_trait]
pub trait SettingsStore: Send + Sync + 'static {
    async fn load(&self) -> Result<AppConfig, ConfigError>;

    async fn save(&self, config: &AppConfig) -> Result<(), ConfigError>;
}

/// Settings persisted as a pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the platform config directory, or next to the executable
    /// when no config directory can be determined.
    pub fn at_default_location() -> Result<Self, ConfigError> {
        default_config_path().map(Self::new)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SettingsStore for JsonFileStore {
    async fn load(&self) -> Result<AppConfig, ConfigError> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No settings file at {}, using defaults", self.path.display());
                return Ok(AppConfig::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        AppConfig::from_json(&data).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    async fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        let data = serde_json::to_string_pretty(config).map_err(ConfigError::Serialize)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ConfigError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(&self.path, data)
            .await
            .map_err(|source| ConfigError::Io {
                path: self.path.clone(),
                source,
            })?;
        debug!("Settings written to {}", self.path.display());
        Ok(())
    }
}

fn default_config_path() -> Result<PathBuf, ConfigError> {
    if let Some(dirs) = directories::ProjectDirs::from("", "", "downfall") {
        return Ok(dirs.config_dir().join(CONFIG_FILE_NAME));
    }
    let exe = std::env::current_exe().map_err(|_| ConfigError::NoConfigDir)?;
    exe.parent()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .ok_or(ConfigError::NoConfigDir)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
