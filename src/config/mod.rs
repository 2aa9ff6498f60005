//! Configuration system (layered: code > env > config file).

use std::fs;
use std::path::{Path, PathBuf};

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::error::{AtlasError, Result};

/// Title given to conversations until the first user message renames them.
pub const DEFAULT_TITLE: &str = "New Chat";

/// Maximum number of characters taken from a message for an auto-title.
pub const DEFAULT_TITLE_MAX_CHARS: usize = 80;

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_POOL_SIZE: usize = 5;
pub const DEFAULT_MAX_STEPS: usize = 12;

/// Runtime settings for the assistant backend.
///
/// Resolution order, lowest to highest precedence:
/// 1. Built-in defaults
/// 2. `config.toml` in the data directory (or an explicit path)
/// 3. Environment variables (`ATLAS_*`, `OPENAI_*`)
/// 4. Values set in code through the builder or field assignment
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
pub struct AtlasConfig {
    /// SQLite file holding the conversation ledger.
    #[builder(default = default_data_dir().join("atlas.db"), into)]
    pub database_path: PathBuf,
    /// SQLite file holding agent session state and memories.
    #[builder(default = default_data_dir().join("agent-state.db"), into)]
    pub state_path: PathBuf,
    /// Maximum concurrently open connections per database.
    #[builder(default = DEFAULT_POOL_SIZE)]
    pub pool_size: usize,
    #[builder(default = DEFAULT_TITLE.to_string(), into)]
    pub default_title: String,
    #[builder(default = DEFAULT_TITLE_MAX_CHARS)]
    pub title_max_chars: usize,
    #[builder(default = DEFAULT_MODEL.to_string(), into)]
    pub model: String,
    #[builder(into)]
    pub openai_api_key: Option<String>,
    #[builder(default = DEFAULT_OPENAI_BASE_URL.to_string(), into)]
    pub openai_base_url: String,
    /// Upper bound on chatbot/tools round trips per request.
    #[builder(default = DEFAULT_MAX_STEPS)]
    pub max_steps: usize,
    /// Replaces the built-in system prompt when set.
    #[builder(into)]
    pub system_prompt: Option<String>,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Optional overrides read from `config.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    database_path: Option<PathBuf>,
    state_path: Option<PathBuf>,
    pool_size: Option<usize>,
    default_title: Option<String>,
    title_max_chars: Option<usize>,
    model: Option<String>,
    openai_api_key: Option<String>,
    openai_base_url: Option<String>,
    max_steps: Option<usize>,
    system_prompt: Option<String>,
}

impl AtlasConfig {
    /// Load defaults, the default config file (if present) and the process
    /// environment. A `.env` file is honoured when present.
    pub fn load() -> Result<Self> {
        Self::load_from(&default_data_dir().join("config.toml"))
    }

    /// Like [`load`](Self::load) with an explicit config file path. A missing
    /// file is not an error; an unreadable or malformed one is.
    pub fn load_from(path: &Path) -> Result<Self> {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();
        if let Some(file) = read_config_file(path)? {
            config.apply_file(file);
        }
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Defaults overlaid with environment variables only.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a TOML document and overlay it on top of `self`.
    pub fn merge_toml(mut self, raw: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(raw)
            .map_err(|e| AtlasError::Configuration(format!("invalid config file: {e}")))?;
        self.apply_file(file);
        Ok(self)
    }

    /// Overlay environment-style variables resolved through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("ATLAS_DATABASE_PATH") {
            self.database_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("ATLAS_STATE_PATH") {
            self.state_path = PathBuf::from(path);
        }
        if let Some(raw) = lookup("ATLAS_DB_POOL_SIZE") {
            self.pool_size = parse_positive("ATLAS_DB_POOL_SIZE", &raw)?;
        }
        if let Some(title) = lookup("ATLAS_DEFAULT_TITLE") {
            self.default_title = title;
        }
        if let Some(model) = lookup("ATLAS_MODEL") {
            self.model = model;
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.openai_api_key = Some(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.openai_base_url = url;
        }
        if let Some(raw) = lookup("ATLAS_MAX_STEPS") {
            self.max_steps = parse_positive("ATLAS_MAX_STEPS", &raw)?;
        }
        if let Some(prompt) = lookup("ATLAS_SYSTEM_PROMPT") {
            self.system_prompt = Some(prompt);
        }
        Ok(())
    }

    fn apply_file(&mut self, file: ConfigFile) {
        if let Some(v) = file.database_path {
            self.database_path = v;
        }
        if let Some(v) = file.state_path {
            self.state_path = v;
        }
        if let Some(v) = file.pool_size {
            self.pool_size = v.max(1);
        }
        if let Some(v) = file.default_title {
            self.default_title = v;
        }
        if let Some(v) = file.title_max_chars {
            self.title_max_chars = v;
        }
        if let Some(v) = file.model {
            self.model = v;
        }
        if file.openai_api_key.is_some() {
            self.openai_api_key = file.openai_api_key;
        }
        if let Some(v) = file.openai_base_url {
            self.openai_base_url = v;
        }
        if let Some(v) = file.max_steps {
            self.max_steps = v.max(1);
        }
        if file.system_prompt.is_some() {
            self.system_prompt = file.system_prompt;
        }
    }
}

/// `~/.atlas`, or `.atlas` relative to the working directory when no home
/// directory can be resolved.
pub fn default_data_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".atlas"))
        .unwrap_or_else(|| PathBuf::from(".atlas"))
}

fn read_config_file(path: &Path) -> Result<Option<ConfigFile>> {
    let raw = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(AtlasError::Io(err)),
    };
    let file = toml::from_str(&raw).map_err(|e| {
        AtlasError::Configuration(format!("invalid config file {}: {e}", path.display()))
    })?;
    Ok(Some(file))
}

fn parse_positive(name: &str, raw: &str) -> Result<usize> {
    match raw.trim().parse::<usize>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(AtlasError::Configuration(format!(
            "{name} must be a positive integer, got {raw:?}"
        ))),
    }
}
