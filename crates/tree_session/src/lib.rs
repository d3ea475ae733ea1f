//! # Tree Session
//!
//! Drives a branching conversation: asks the model backend with the current
//! path as context, records each turn in the tree, and auto-saves.

pub mod backend;
pub mod config;
pub mod error;
pub mod session;

// Re-exports
pub use backend::{BackendError, ChatBackend};
pub use config::{config_toml_path, context_tree_dir, TreeChatConfig};
pub use error::{Result, SessionError};
pub use session::ConversationSession;
