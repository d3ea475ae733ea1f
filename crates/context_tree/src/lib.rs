//! `context_tree` keeps a branching conversation with an LLM: every turn gets
//! a global sequence number and a hierarchical branch path, any earlier turn
//! can become the current one, and continuing from it opens a new branch.

pub mod error;
pub mod navigation;
pub mod snapshot;
pub mod structs;
pub mod tree;
mod tree_queries;

// Re-export the public API
pub use error::{NavigationError, PersistenceError, Result, TreeError};
pub use navigation::{navigation_context, NavigationContext, TreeNavigator};
pub use snapshot::{decode, encode, SnapshotMetadata, TreeSnapshot, SNAPSHOT_VERSION};
pub use structs::identifier::{is_valid_hierarchical_id, StateIdentifier};
pub use structs::message::{ChatMessage, Role};
pub use structs::state::{parent_hierarchical_id, parse_timestamp, StateRecord};
pub use structs::tags::{tag_display, tag_help, validate_tag_name, KnownTag};
pub use tree::ConversationTree;
