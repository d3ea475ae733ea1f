//! # Tree Storage
//!
//! Named, file-backed snapshots of conversation trees.

pub mod storage;

// Re-exports
pub use storage::{
    default_save_name, validate_filename, FileTreeStorage, Result, SavedTreeInfo, TreeStorage,
};
