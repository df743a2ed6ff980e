//! Client settings loader.
//!
//! Loads and merges:
//! - System defaults: `<PRJ_ROOT>/packages/conf/settings.yaml`
//! - User overrides:  `<PRJ_CONFIG_HOME>/scribe/settings.yaml`
//!
//! Merge precedence is user over system. `SCRIBE_SERVER_URL` and
//! `SCRIBE_STORE_PATH` override both files.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use serde::Deserialize;

use scribe_jobs::{
    DEFAULT_EVENT_CAPACITY, DEFAULT_HISTORY_LIMIT, DEFAULT_SLOT, DispatchPolicy, EarlyCompletion,
};

use crate::api::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::observability::ClientLogEvent;

const DEFAULT_SYSTEM_SETTINGS_RELATIVE_PATH: &str = "packages/conf/settings.yaml";
const DEFAULT_USER_SETTINGS_RELATIVE_PATH: &str = "scribe/settings.yaml";
const DEFAULT_CONFIG_HOME_RELATIVE_PATH: &str = ".config";
const DEFAULT_DATA_HOME_RELATIVE_PATH: &str = ".data";
const DEFAULT_STORE_DIR_NAME: &str = "scribe";

/// Service root used when nothing is configured.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8000";
/// Env var overriding `server.base_url`.
pub const SERVER_URL_ENV: &str = "SCRIBE_SERVER_URL";
/// Env var overriding `storage.path`.
pub const STORE_PATH_ENV: &str = "SCRIBE_STORE_PATH";

static CONFIG_HOME_OVERRIDE: OnceLock<PathBuf> = OnceLock::new();

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScribeSettings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub live: LiveSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerSettings {
    pub base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageSettings {
    /// Directory holding the job slot file.
    pub path: Option<String>,
    pub slot: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LiveSettings {
    pub early_completion: Option<EarlyCompletion>,
    pub history_limit: Option<usize>,
    pub event_capacity: Option<usize>,
}

impl ScribeSettings {
    fn merge(self, overlay: Self) -> Self {
        Self {
            server: self.server.merge(overlay.server),
            storage: self.storage.merge(overlay.storage),
            live: self.live.merge(overlay.live),
        }
    }

    /// Apply environment overrides read through `lookup`.
    #[must_use]
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        if let Some(url) = non_empty(SERVER_URL_ENV) {
            self.server.base_url = Some(url);
        }
        if let Some(path) = non_empty(STORE_PATH_ENV) {
            self.storage.path = Some(path);
        }
        self
    }

    /// Configured service root.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.server
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(DEFAULT_SERVER_URL)
    }

    /// Per-request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.server
                .request_timeout_secs
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    /// Directory of the job slot; relative paths resolve against `PRJ_ROOT`.
    #[must_use]
    pub fn store_dir(&self) -> PathBuf {
        let root = project_root();
        match self.storage.path.as_deref().filter(|p| !p.trim().is_empty()) {
            Some(path) => absolutize(&root, PathBuf::from(path.trim())),
            None => resolve_data_home(&root).join(DEFAULT_STORE_DIR_NAME),
        }
    }

    /// Slot name.
    #[must_use]
    pub fn slot(&self) -> &str {
        self.storage
            .slot
            .as_deref()
            .filter(|slot| !slot.trim().is_empty())
            .unwrap_or(DEFAULT_SLOT)
    }

    /// Dispatcher policy.
    #[must_use]
    pub fn dispatch_policy(&self) -> DispatchPolicy {
        DispatchPolicy {
            early_completion: self.live.early_completion.unwrap_or_default(),
        }
    }

    /// Status history length.
    #[must_use]
    pub fn history_limit(&self) -> usize {
        self.live
            .history_limit
            .filter(|limit| *limit > 0)
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
    }

    /// Job event bus capacity.
    #[must_use]
    pub fn event_capacity(&self) -> usize {
        self.live
            .event_capacity
            .filter(|capacity| *capacity > 0)
            .unwrap_or(DEFAULT_EVENT_CAPACITY)
    }
}

impl ServerSettings {
    fn merge(self, overlay: Self) -> Self {
        Self {
            base_url: overlay.base_url.or(self.base_url),
            request_timeout_secs: overlay.request_timeout_secs.or(self.request_timeout_secs),
        }
    }
}

impl StorageSettings {
    fn merge(self, overlay: Self) -> Self {
        Self {
            path: overlay.path.or(self.path),
            slot: overlay.slot.or(self.slot),
        }
    }
}

impl LiveSettings {
    fn merge(self, overlay: Self) -> Self {
        Self {
            early_completion: overlay.early_completion.or(self.early_completion),
            history_limit: overlay.history_limit.or(self.history_limit),
            event_capacity: overlay.event_capacity.or(self.event_capacity),
        }
    }
}

/// Load merged settings (env over user over system).
pub fn load_settings() -> ScribeSettings {
    let (system_path, user_path) = settings_paths();
    let settings =
        load_settings_from_paths(&system_path, &user_path).with_env(|key| std::env::var(key).ok());
    tracing::debug!(
        event = ClientLogEvent::SettingsLoaded.as_str(),
        system = %system_path.display(),
        user = %user_path.display(),
        base_url = settings.base_url(),
        "settings loaded"
    );
    settings
}

#[doc(hidden)]
pub fn settings_paths() -> (PathBuf, PathBuf) {
    let root = project_root();
    let system_path = root.join(DEFAULT_SYSTEM_SETTINGS_RELATIVE_PATH);
    let user_path = resolve_config_home(&root).join(DEFAULT_USER_SETTINGS_RELATIVE_PATH);
    (system_path, user_path)
}

#[doc(hidden)]
pub fn load_settings_from_paths(system: &Path, user: &Path) -> ScribeSettings {
    load_one(system).merge(load_one(user))
}

fn load_one(path: &Path) -> ScribeSettings {
    if !path.exists() {
        return ScribeSettings::default();
    }
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) => {
            tracing::warn!(
                path = %path.display(),
                error = %error,
                "failed to read settings file; ignoring"
            );
            return ScribeSettings::default();
        }
    };
    match serde_yaml::from_str::<ScribeSettings>(&raw) {
        Ok(value) => value,
        Err(error) => {
            tracing::warn!(
                path = %path.display(),
                error = %error,
                "failed to parse settings yaml; ignoring file"
            );
            ScribeSettings::default()
        }
    }
}

fn project_root() -> PathBuf {
    env_path("PRJ_ROOT")
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

/// Set config-home override (used by CLI `--conf`).
///
/// The path can be absolute, or relative to `PRJ_ROOT`/cwd.
pub fn set_config_home_override(path: impl Into<PathBuf>) {
    let path = path.into();
    if path.as_os_str().is_empty() {
        return;
    }
    if CONFIG_HOME_OVERRIDE.set(path.clone()).is_err()
        && let Some(current) = CONFIG_HOME_OVERRIDE.get()
        && current != &path
    {
        tracing::warn!(
            current = %current.display(),
            ignored = %path.display(),
            "config home override already set; ignoring subsequent value"
        );
    }
}

fn resolve_config_home(project_root: &Path) -> PathBuf {
    if let Some(path) = CONFIG_HOME_OVERRIDE.get() {
        return absolutize(project_root, path.clone());
    }
    let configured = env_path("PRJ_CONFIG_HOME")
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_HOME_RELATIVE_PATH));
    absolutize(project_root, configured)
}

fn resolve_data_home(project_root: &Path) -> PathBuf {
    let configured = env_path("PRJ_DATA_HOME")
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_HOME_RELATIVE_PATH));
    absolutize(project_root, configured)
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn absolutize(project_root: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        project_root.join(path)
    }
}
