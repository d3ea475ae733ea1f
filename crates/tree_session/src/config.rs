use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "config.toml";
const DEFAULT_BACKEND_URL: &str = "http://localhost:11434";
const DEFAULT_AUTO_SAVE_INTERVAL: usize = 5;
const DEFAULT_MAX_MESSAGE_PREVIEW: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TreeChatConfig {
    /// Directory holding saved trees.
    pub save_dir: PathBuf,
    /// Model used when the session is not told otherwise.
    pub default_model: Option<String>,
    pub backend_url: String,
    /// Save after this many new turns; 0 disables auto-save.
    pub auto_save_interval: usize,
    /// Characters of a message shown in tree listings.
    pub max_message_preview: usize,
}

/// `~/.context_tree`, falling back to the temp dir when no home is known.
pub fn context_tree_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".context_tree")
}

pub fn config_toml_path() -> PathBuf {
    context_tree_dir().join(CONFIG_FILE_NAME)
}

impl Default for TreeChatConfig {
    fn default() -> Self {
        Self {
            save_dir: context_tree_dir().join("trees"),
            default_model: None,
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            auto_save_interval: DEFAULT_AUTO_SAVE_INTERVAL,
            max_message_preview: DEFAULT_MAX_MESSAGE_PREVIEW,
        }
    }
}

impl TreeChatConfig {
    /// Defaults, then `~/.context_tree/config.toml`, then environment.
    pub fn load() -> Self {
        let mut config = Self::from_file(&config_toml_path());
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Reads a TOML file over the defaults. Missing or unparseable files
    /// yield the defaults.
    pub fn from_file(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<TreeChatConfig>(&content) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Ignoring invalid config file");
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read config file");
                Self::default()
            }
        }
    }

    /// Applies `CONTEXT_TREE_*` overrides through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(save_dir) = lookup("CONTEXT_TREE_SAVE_DIR") {
            self.save_dir = PathBuf::from(save_dir);
        }
        if let Some(model) = lookup("CONTEXT_TREE_MODEL") {
            self.default_model = Some(model);
        }
        if let Some(url) = lookup("CONTEXT_TREE_BACKEND_URL") {
            self.backend_url = url;
        }
        if let Some(interval) = lookup("CONTEXT_TREE_AUTO_SAVE") {
            match interval.trim().parse() {
                Ok(interval) => self.auto_save_interval = interval,
                Err(_) => tracing::warn!(value = %interval, "Ignoring invalid CONTEXT_TREE_AUTO_SAVE"),
            }
        }
    }
}
