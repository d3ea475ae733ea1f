//! Save store trait and the JSON-file implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use context_tree::{parse_timestamp, ConversationTree, PersistenceError, TreeSnapshot};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

pub type Result<T> = std::result::Result<T, PersistenceError>;

const EXTENSION: &str = "json";
const INVALID_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Summary of one saved tree, as shown in a save listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SavedTreeInfo {
    pub filename: String,
    pub name: String,
    pub saved_at: Option<DateTime<Utc>>,
    pub state_count: usize,
    pub size_bytes: u64,
}

/// Named snapshots of conversation trees.
#[async_trait]
pub trait TreeStorage: Send + Sync {
    /// Save a tree, returning the filename used
    async fn save_tree(&self, tree: &ConversationTree, name: Option<&str>) -> Result<String>;

    /// Load a tree into a new, independently owned value
    async fn load_tree(&self, name: &str) -> Result<ConversationTree>;

    /// List saved trees, newest first
    async fn list_trees(&self) -> Result<Vec<SavedTreeInfo>>;

    /// Delete a saved tree; false when it did not exist
    async fn delete_tree(&self, name: &str) -> Result<bool>;

    /// Check if a saved tree exists
    async fn tree_exists(&self, name: &str) -> bool;
}

/// Rejects blank names and names containing path or shell metacharacters.
pub fn validate_filename(name: &str) -> bool {
    !name.trim().is_empty() && !name.contains(INVALID_FILENAME_CHARS)
}

/// `conversation_YYYYMMDD_HHMMSS`
pub fn default_save_name(now: DateTime<Utc>) -> String {
    format!("conversation_{}", now.format("%Y%m%d_%H%M%S"))
}

fn with_extension(name: &str) -> String {
    if name.ends_with(".json") {
        name.to_string()
    } else {
        format!("{name}.{EXTENSION}")
    }
}

/// One pretty-printed JSON file per save under `base_path`.
#[derive(Debug, Clone)]
pub struct FileTreeStorage {
    base_path: PathBuf,
}

impl FileTreeStorage {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn tree_path(&self, name: &str) -> Result<(String, PathBuf)> {
        if !validate_filename(name) {
            return Err(PersistenceError::InvalidFilename(name.to_string()));
        }
        let filename = with_extension(name.trim());
        let path = self.base_path.join(&filename);
        Ok((filename, path))
    }
}

#[derive(Deserialize)]
struct SavedHeader {
    #[serde(default)]
    metadata: Option<ListingMetadata>,
}

#[derive(Deserialize)]
struct ListingMetadata {
    #[serde(default)]
    saved_at: Option<String>,
    #[serde(default)]
    state_count: usize,
}

#[async_trait]
impl TreeStorage for FileTreeStorage {
    async fn save_tree(&self, tree: &ConversationTree, name: Option<&str>) -> Result<String> {
        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| default_save_name(Utc::now()));
        let (filename, path) = self.tree_path(&name)?;

        fs::create_dir_all(&self.base_path).await?;

        let snapshot = TreeSnapshot::capture(tree).with_filename(filename.clone());
        let contents = serde_json::to_string_pretty(&snapshot)?;

        // Written to a temp file, then renamed into place.
        let temp_path = self
            .base_path
            .join(format!(".{filename}.{}.tmp", uuid::Uuid::new_v4()));
        fs::write(&temp_path, contents).await?;
        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        tracing::info!(
            filename = %filename,
            state_count = tree.state_count(),
            "FileTreeStorage: Saved tree"
        );
        Ok(filename)
    }

    async fn load_tree(&self, name: &str) -> Result<ConversationTree> {
        let (filename, path) = self.tree_path(name)?;

        if !path.exists() {
            return Err(PersistenceError::NotFound(filename));
        }

        let contents = fs::read_to_string(&path).await?;
        let tree = context_tree::decode(&contents)?;

        tracing::info!(
            filename = %filename,
            state_count = tree.state_count(),
            "FileTreeStorage: Loaded tree"
        );
        Ok(tree)
    }

    async fn list_trees(&self) -> Result<Vec<SavedTreeInfo>> {
        if !self.base_path.exists() {
            return Ok(Vec::new());
        }

        let mut trees = Vec::new();
        let mut entries = fs::read_dir(&self.base_path).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != EXTENSION) {
                continue;
            }
            let (Some(filename), Some(name)) = (
                path.file_name().and_then(|n| n.to_str()),
                path.file_stem().and_then(|n| n.to_str()),
            ) else {
                continue;
            };
            if filename.starts_with('.') {
                continue;
            }

            let header = match fs::read_to_string(&path).await {
                Ok(contents) => serde_json::from_str::<SavedHeader>(&contents),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable save");
                    continue;
                }
            };
            let metadata = match header {
                Ok(header) => header.metadata,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping corrupted save");
                    continue;
                }
            };
            let size_bytes = entry.metadata().await.map(|m| m.len()).unwrap_or(0);

            trees.push(SavedTreeInfo {
                filename: filename.to_string(),
                name: name.to_string(),
                saved_at: metadata
                    .as_ref()
                    .and_then(|m| m.saved_at.as_deref())
                    .and_then(parse_timestamp),
                state_count: metadata.as_ref().map_or(0, |m| m.state_count),
                size_bytes,
            });
        }

        trees.sort_by(|a, b| b.saved_at.cmp(&a.saved_at).then_with(|| a.name.cmp(&b.name)));
        Ok(trees)
    }

    async fn delete_tree(&self, name: &str) -> Result<bool> {
        let (filename, path) = self.tree_path(name)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(filename = %filename, "FileTreeStorage: Deleted tree");
                Ok(true)
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(error) => Err(error.into()),
        }
    }

    async fn tree_exists(&self, name: &str) -> bool {
        self.tree_path(name)
            .map(|(_, path)| path.exists())
            .unwrap_or(false)
    }
}
