//! A single user's conversation: one tree, one backend, one save store.

use context_tree::{
    ConversationTree, NavigationError, StateIdentifier, StateRecord, TreeNavigator,
};
use tree_storage::TreeStorage;

use crate::backend::ChatBackend;
use crate::config::TreeChatConfig;
use crate::error::{Result, SessionError};

pub struct ConversationSession<B: ChatBackend, S: TreeStorage> {
    tree: ConversationTree,
    backend: B,
    storage: S,
    config: TreeChatConfig,
    model: Option<String>,
    /// Filename of the last save or load; reused by later saves.
    save_name: Option<String>,
    turns_since_save: usize,
}

impl<B: ChatBackend, S: TreeStorage> ConversationSession<B, S> {
    pub fn new(backend: B, storage: S, config: TreeChatConfig) -> Self {
        let model = config.default_model.clone();
        Self {
            tree: ConversationTree::new(),
            backend,
            storage,
            config,
            model,
            save_name: None,
            turns_since_save: 0,
        }
    }

    pub fn tree(&self) -> &ConversationTree {
        &self.tree
    }

    pub fn config(&self) -> &TreeChatConfig {
        &self.config
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = Some(model.into());
    }

    pub fn save_name(&self) -> Option<&str> {
        self.save_name.as_deref()
    }

    /// A state's message shortened for listings.
    pub fn preview(&self, state: &StateRecord) -> String {
        state.message_preview(self.config.max_message_preview)
    }

    pub fn navigator(&mut self) -> TreeNavigator<'_> {
        TreeNavigator::new(&mut self.tree)
    }

    /// Sends `message` with the current path as context and records the
    /// reply as a child of the current state (or as a new root).
    ///
    /// The tree is only touched once the backend has answered.
    pub async fn ask(&mut self, message: &str) -> Result<StateRecord> {
        let parent = self.tree.current_state_id().map(str::to_string);
        self.ask_from(parent, message).await
    }

    /// Asks from `identifier` instead of the current state, opening a new
    /// branch when that state already has children. A failure leaves the
    /// current state where it was.
    pub async fn branch_from(
        &mut self,
        identifier: impl Into<StateIdentifier>,
        message: &str,
    ) -> Result<StateRecord> {
        let target = self
            .navigator()
            .resolve(identifier)?
            .hierarchical_id
            .clone();

        self.ask_from(Some(target), message).await
    }

    async fn ask_from(&mut self, parent: Option<String>, message: &str) -> Result<StateRecord> {
        let model = self.model.clone().ok_or(SessionError::NoModel)?;

        let mut messages = match parent.as_deref() {
            Some(parent) => self.tree.get_conversation_messages(Some(parent))?,
            None => Vec::new(),
        };
        messages.push(context_tree::ChatMessage::user(message));

        tracing::debug!(
            model = %model,
            context_len = messages.len(),
            parent = ?parent,
            "ConversationSession: Sending message"
        );
        let response = self.backend.chat(&messages, &model).await?;

        let state = self
            .tree
            .add_state(parent.as_deref(), message, response, model)?;

        self.turns_since_save += 1;
        self.auto_save_if_due().await;

        Ok(state)
    }

    pub fn tag_current(&mut self, tag: &str) -> Result<StateRecord> {
        let current = self.current_id()?;
        Ok(self.tree.tag_state(&current, tag)?)
    }

    pub fn untag_current(&mut self, tag: &str) -> Result<StateRecord> {
        let current = self.current_id()?;
        Ok(self.tree.untag_state(&current, tag)?)
    }

    /// Saves under `name`, or the last used name, or a timestamped default.
    pub async fn save(&mut self, name: Option<&str>) -> Result<String> {
        let name = name.map(str::to_string).or_else(|| self.save_name.clone());
        let filename = self.storage.save_tree(&self.tree, name.as_deref()).await?;

        self.save_name = Some(filename.clone());
        self.turns_since_save = 0;
        Ok(filename)
    }

    /// Replaces the tree with a saved one. On any failure the current tree
    /// is left exactly as it was.
    pub async fn load(&mut self, name: &str) -> Result<()> {
        let tree = self.storage.load_tree(name).await?;

        tracing::info!(
            name = %name,
            state_count = tree.state_count(),
            "ConversationSession: Loaded conversation"
        );
        self.tree = tree;
        self.save_name = Some(name.to_string());
        self.turns_since_save = 0;
        Ok(())
    }

    /// Starts over with an empty tree.
    pub fn new_conversation(&mut self) {
        self.tree.clear();
        self.save_name = None;
        self.turns_since_save = 0;
    }

    fn current_id(&self) -> Result<String> {
        self.tree
            .current_state_id()
            .map(str::to_string)
            .ok_or_else(|| NavigationError::NoCurrentState.into())
    }

    async fn auto_save_if_due(&mut self) {
        let interval = self.config.auto_save_interval;
        if interval == 0 || self.turns_since_save < interval {
            return;
        }

        match self.save(None).await {
            Ok(filename) => {
                tracing::info!(filename = %filename, "ConversationSession: Auto-saved");
            }
            Err(e) => {
                tracing::warn!(error = %e, "ConversationSession: Auto-save failed");
            }
        }
    }
}
