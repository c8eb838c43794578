use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::core::lib::{ElectronError, ElectronResult};

pub const API_KEY_NAME: &str = "API_KEY";
pub const SETTINGS_FILE: &str = "settings.json";
pub const HISTORY_FILE: &str = "history.jsonl";
pub const LOG_FILE: &str = "electron.log";
pub const DEFAULT_BASE_URL: &str = "https://api.aimlapi.com/v1";

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_SYSTEM_MESSAGE: &str =
    "You are {assistant_name}, a command line AI assistant for {user_name} who knows everything.";
const DEFAULT_ASSISTANT_NAME: &str = "Electron";
const DEFAULT_USER_NAME: &str = "User";

/// Persisted user settings. Keys missing from the file take their defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub model: String,
    pub api_key: String,
    pub system_message: String,
    pub assistant_name: String,
    pub user_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_key: String::new(),
            system_message: DEFAULT_SYSTEM_MESSAGE.to_string(),
            assistant_name: DEFAULT_ASSISTANT_NAME.to_string(),
            user_name: DEFAULT_USER_NAME.to_string(),
        }
    }
}

impl Settings {
    /// The system message with the persona placeholders filled in.
    pub fn system_prompt(&self) -> String {
        self.system_message
            .replace("{assistant_name}", &self.assistant_name)
            .replace("{user_name}", &self.user_name)
    }
}

/// Locations of everything Electron keeps on disk.
#[derive(Clone, Debug)]
pub struct Paths {
    pub home: PathBuf,
}

impl Paths {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    /// `<config dir>/electron`, or the working directory when the platform has none.
    pub fn default_home() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join("electron"))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn settings(&self) -> PathBuf {
        self.home.join(SETTINGS_FILE)
    }

    pub fn history(&self) -> PathBuf {
        self.home.join(HISTORY_FILE)
    }

    pub fn ensure_home(&self) -> ElectronResult<()> {
        fs::create_dir_all(&self.home).map_err(|e| {
            ElectronError::ConfigurationError(format!(
                "Failed to create '{}': {}",
                self.home.display(),
                e
            ))
        })
    }
}

pub fn load_settings(path: &Path) -> ElectronResult<Settings> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(ElectronError::ConfigurationError(format!(
                "Failed to read '{}': {}",
                path.display(),
                e
            )))
        }
    };

    if contents.trim().is_empty() {
        warn!("Settings file not found at '{}'. Using default settings.", path.display());
        let settings = Settings::default();
        write_settings(path, &settings)?;
        info!("Default settings written to '{}'.", path.display());
        return Ok(settings);
    }

    match serde_json::from_str::<Settings>(&contents) {
        Ok(settings) => Ok(settings),
        Err(e) => {
            error!(
                "Invalid JSON in settings file '{}': {}. Using default settings.",
                path.display(),
                e
            );
            Ok(Settings::default())
        }
    }
}

/// Picks the key from the settings, then from `env_value`.
pub fn resolve_api_key(settings: &Settings, env_value: Option<String>) -> ElectronResult<String> {
    if !settings.api_key.trim().is_empty() {
        return Ok(settings.api_key.trim().to_string());
    }
    match env_value {
        Some(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => Err(ElectronError::ConfigurationError(format!(
            "API key is missing in '{}' and '{}' is not set in the environment",
            SETTINGS_FILE, API_KEY_NAME
        ))),
    }
}

/// Stores `api_key` in the settings file, keeping every other key as it is.
pub fn save_api_key(path: &Path, api_key: &str) -> ElectronResult<()> {
    let mut value = match fs::read_to_string(path) {
        Ok(contents) if !contents.trim().is_empty() => serde_json::from_str::<Value>(&contents)
            .map_err(|e| {
                ElectronError::ConfigurationError(format!(
                    "Cannot update '{}': {}",
                    path.display(),
                    e
                ))
            })?,
        Ok(_) => serde_json::to_value(Settings::default()).map_err(config_json_error)?,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            serde_json::to_value(Settings::default()).map_err(config_json_error)?
        }
        Err(e) => {
            return Err(ElectronError::ConfigurationError(format!(
                "Failed to read '{}': {}",
                path.display(),
                e
            )))
        }
    };

    match value.as_object_mut() {
        Some(map) => {
            map.insert("api_key".to_string(), Value::String(api_key.to_string()));
        }
        None => {
            return Err(ElectronError::ConfigurationError(format!(
                "'{}' does not contain a JSON object",
                path.display()
            )))
        }
    }

    write_json(path, &value)
}

fn write_settings(path: &Path, settings: &Settings) -> ElectronResult<()> {
    let value = serde_json::to_value(settings).map_err(config_json_error)?;
    write_json(path, &value)
}

fn write_json(path: &Path, value: &Value) -> ElectronResult<()> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser).map_err(config_json_error)?;
    fs::write(path, buf).map_err(|e| {
        ElectronError::ConfigurationError(format!("Failed to write '{}': {}", path.display(), e))
    })
}

fn config_json_error(e: serde_json::Error) -> ElectronError {
    ElectronError::ConfigurationError(format!("Failed to encode settings: {}", e))
}
