//! Conversation tree error types

use thiserror::Error;

/// Errors raised by tree mutations and queries.
///
/// Lookup misses in `find_state` are not errors; they surface as `None`.
#[derive(Error, Debug)]
pub enum TreeError {
    #[error("State not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Navigation(#[from] NavigationError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl TreeError {
    /// True for plain lookup failures and for unresolved navigation targets.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TreeError::NotFound(_) | TreeError::Navigation(NavigationError::Unresolved { .. })
        )
    }
}

/// Failures of interactive movement through the tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NavigationError {
    #[error("Cannot navigate to '{target}'")]
    Unresolved {
        target: String,
        suggestions: Vec<String>,
    },

    #[error("No current state")]
    NoCurrentState,

    #[error("Already at root state")]
    AlreadyAtRoot,

    #[error("No child states available")]
    NoChildren,

    #[error("Invalid branch index {index}. Available: 1-{available}")]
    InvalidBranchIndex { index: usize, available: usize },
}

impl NavigationError {
    /// Hints for the user; empty for everything but `Unresolved`.
    pub fn suggestions(&self) -> &[String] {
        match self {
            NavigationError::Unresolved { suggestions, .. } => suggestions,
            _ => &[],
        }
    }
}

/// Snapshot encode/decode and save-store failures.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid snapshot content: {0}")]
    Malformed(String),

    #[error("Inconsistent snapshot: {0}")]
    Inconsistent(String),

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TreeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_navigation_counts_as_not_found() {
        let err: TreeError = NavigationError::Unresolved {
            target: "9".to_string(),
            suggestions: vec!["Try sequence 7".to_string()],
        }
        .into();
        assert!(err.is_not_found());

        let err: TreeError = NavigationError::AlreadyAtRoot.into();
        assert!(!err.is_not_found());
    }

    #[test]
    fn invalid_branch_index_reports_range() {
        let err = NavigationError::InvalidBranchIndex {
            index: 2,
            available: 1,
        };
        assert_eq!(err.to_string(), "Invalid branch index 2. Available: 1-1");
        assert!(err.suggestions().is_empty());
    }
}
