//! Session error types

use context_tree::{NavigationError, PersistenceError, TreeError};
use thiserror::Error;

use crate::backend::BackendError;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Navigation(#[from] NavigationError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("LLM error: {0}")]
    Backend(#[from] BackendError),

    #[error("No model selected")]
    NoModel,
}

pub type Result<T> = std::result::Result<T, SessionError>;
