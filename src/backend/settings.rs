use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use super::loader::DEFAULT_CHUNK_SIZE;
use super::mapping::Mode;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_encoding")]
    pub encoding: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default)]
    pub use_mmap: bool,
    #[serde(default)]
    pub default_mode: Mode,
    #[serde(default)]
    pub recent_files: Vec<String>,
    #[serde(default = "default_max_recent")]
    pub max_recent_files: usize,
}

fn default_encoding() -> String {
    "utf-8".to_string()
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_max_recent() -> usize {
    10
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            encoding: default_encoding(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            use_mmap: false,
            default_mode: Mode::Full,
            recent_files: Vec::new(),
            max_recent_files: 10,
        }
    }
}

impl Settings {
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "csvmap").map(|dirs| dirs.config_dir().join("config.json"))
    }

    pub fn load() -> Self {
        if let Some(config_path) = Self::config_path() {
            if config_path.exists() {
                if let Ok(content) = fs::read_to_string(&config_path) {
                    return Self::from_json(&content);
                }
            }
        }
        Self::default()
    }

    /// Parses a config file, falling back to defaults when it is unreadable.
    pub fn from_json(content: &str) -> Self {
        match serde_json::from_str::<Settings>(content) {
            Ok(mut settings) => {
                settings.chunk_size = settings.chunk_size.max(1);
                settings
            }
            Err(e) => {
                warn!("Ignoring invalid config: {}", e);
                Self::default()
            }
        }
    }

    /// Moves `path` to the front of the recent files. Persisted by `save`.
    pub fn add_recent_file(&mut self, path: &str) {
        self.recent_files.retain(|p| p != path);
        self.recent_files.insert(0, path.to_string());
        self.recent_files.truncate(self.max_recent_files);
    }

    pub fn save(&self) {
        if let Some(config_path) = Self::config_path() {
            self.save_to(&config_path);
        }
    }

    /// Writes the settings to `config_path`. Failures are logged, never fatal.
    pub fn save_to(&self, config_path: &Path) -> bool {
        if let Some(config_dir) = config_path.parent() {
            if !config_dir.exists() {
                if let Err(e) = fs::create_dir_all(config_dir) {
                    warn!("Could not create config dir {:?}: {}", config_dir, e);
                    return false;
                }
            }
        }
        match serde_json::to_string_pretty(self) {
            Ok(content) => match fs::write(config_path, content) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Could not write config {:?}: {}", config_path, e);
                    false
                }
            },
            Err(e) => {
                warn!("Could not serialize config: {}", e);
                false
            }
        }
    }
}
