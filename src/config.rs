use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "./config/config.json";

// Agent configuration, loaded once at startup from a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub agent: AgentSection,
    #[serde(default)]
    pub llm: LlmSection,
    pub path: PathSection,
    #[serde(default)]
    pub log: LogSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSection {
    pub name: String,
    #[serde(default)]
    pub kill_on_timeout: bool, // Cancel a handler that overran its deadline instead of detaching it.
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSection {
    #[serde(default)]
    pub enable: bool,
    #[serde(default = "default_model")]
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSection {
    pub random_talk: PathBuf, // UTF-8, one fallback utterance per line.
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSection {
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("./log")
}

fn default_log_level() -> String {
    "debug".to_string()
}

impl Default for LlmSection {
    fn default() -> Self {
        LlmSection {
            enable: false,
            model: default_model(),
        }
    }
}

impl Default for LogSection {
    fn default() -> Self {
        LogSection {
            dir: default_log_dir(),
            level: default_log_level(),
        }
    }
}

impl AgentConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file(DEFAULT_CONFIG_PATH)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(data)?)
    }
}
