use std::collections::HashMap;

use chrono::Utc;

use crate::error::{Result, TreeError};
use crate::structs::identifier::StateIdentifier;
use crate::structs::state::StateRecord;
use crate::structs::tags::validate_tag_name;

/// The branching conversation history.
///
/// `states` is the single source of truth. `sequence_index` and `children`
/// are derived from it, updated in the same call as every mutation and
/// rebuilt from scratch when a snapshot is restored.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConversationTree {
    /// hierarchical_id -> record.
    pub(crate) states: HashMap<String, StateRecord>,

    /// sequence_id -> hierarchical_id.
    pub(crate) sequence_index: HashMap<u64, String>,

    /// parent hierarchical_id -> child ids in branch order.
    pub(crate) children: HashMap<String, Vec<String>>,

    pub(crate) current: Option<String>,
    pub(crate) sequence_counter: u64,
}

impl ConversationTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hierarchical ID of the active position, if any.
    pub fn current_state_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn current_state(&self) -> Option<&StateRecord> {
        self.current.as_ref().and_then(|id| self.states.get(id))
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Last sequence number handed out.
    pub fn sequence_counter(&self) -> u64 {
        self.sequence_counter
    }

    /// Records a new turn under `parent_id` (or as a new root) and makes it
    /// the current state.
    ///
    /// A root's hierarchical ID is its sequence number. A child's is the
    /// parent's ID plus its 1-based slot among the parent's children, so
    /// slots depend only on how many siblings came before.
    pub fn add_state(
        &mut self,
        parent_id: Option<&str>,
        message: impl Into<String>,
        response: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<StateRecord> {
        let existing_children = match parent_id {
            Some(parent) => {
                if !self.states.contains_key(parent) {
                    return Err(TreeError::NotFound(parent.to_string()));
                }
                self.children.get(parent).map_or(0, Vec::len)
            }
            None => 0,
        };

        let sequence_id = self.sequence_counter + 1;
        let hierarchical_id = match parent_id {
            Some(parent) => format!("{}.{}", parent, existing_children + 1),
            None => sequence_id.to_string(),
        };
        if self.states.contains_key(&hierarchical_id) {
            return Err(TreeError::Validation(format!(
                "hierarchical id {hierarchical_id} is already taken"
            )));
        }
        self.sequence_counter = sequence_id;

        let state = StateRecord {
            hierarchical_id: hierarchical_id.clone(),
            sequence_id,
            parent_id: parent_id.map(str::to_string),
            message: message.into(),
            response: response.into(),
            model: model.into(),
            timestamp: Utc::now(),
            tags: Default::default(),
            is_branch: existing_children > 0,
            metadata: Default::default(),
        };

        tracing::info!(
            hierarchical_id = %hierarchical_id,
            sequence_id = sequence_id,
            parent_id = ?parent_id,
            is_branch = state.is_branch,
            "ConversationTree: Adding state"
        );

        self.states.insert(hierarchical_id.clone(), state.clone());
        self.sequence_index.insert(sequence_id, hierarchical_id.clone());
        if let Some(parent) = parent_id {
            self.children
                .entry(parent.to_string())
                .or_default()
                .push(hierarchical_id.clone());
        }
        self.current = Some(hierarchical_id);

        Ok(state)
    }

    /// Looks a state up by sequence number or hierarchical ID.
    pub fn find_state(&self, identifier: impl Into<StateIdentifier>) -> Option<&StateRecord> {
        match identifier.into() {
            StateIdentifier::Sequence(sequence) => self
                .sequence_index
                .get(&sequence)
                .and_then(|id| self.states.get(id)),
            StateIdentifier::Path(path) => self.states.get(&path),
        }
    }

    /// Moves the current pointer. Returns false, leaving it untouched, when
    /// the identifier does not resolve.
    pub fn navigate_to(&mut self, identifier: impl Into<StateIdentifier>) -> bool {
        let identifier = identifier.into();
        let Some(target) = self
            .find_state(&identifier)
            .map(|state| state.hierarchical_id.clone())
        else {
            tracing::debug!(identifier = %identifier, "ConversationTree: navigate_to miss");
            return false;
        };

        tracing::debug!(
            from = ?self.current,
            to = %target,
            "ConversationTree: navigate_to"
        );
        self.current = Some(target);
        true
    }

    /// Replaces the record stored at `state_id`.
    ///
    /// The replacement must keep the identity fields (`hierarchical_id`,
    /// `sequence_id`, `parent_id`) so the derived indices stay valid.
    pub fn update_state(&mut self, state_id: &str, updated: StateRecord) -> Result<()> {
        let existing = self
            .states
            .get(state_id)
            .ok_or_else(|| TreeError::NotFound(state_id.to_string()))?;

        if updated.hierarchical_id != state_id {
            return Err(TreeError::Validation(format!(
                "hierarchical id mismatch: expected {state_id}, got {}",
                updated.hierarchical_id
            )));
        }
        if updated.sequence_id != existing.sequence_id {
            return Err(TreeError::Validation(format!(
                "sequence id of {state_id} cannot change ({} -> {})",
                existing.sequence_id, updated.sequence_id
            )));
        }
        if updated.parent_id != existing.parent_id {
            return Err(TreeError::Validation(format!(
                "parent of {state_id} cannot change"
            )));
        }

        self.states.insert(state_id.to_string(), updated);
        Ok(())
    }

    /// Adds `tag` to a state through the replace-by-key path.
    pub fn tag_state(&mut self, state_id: &str, tag: &str) -> Result<StateRecord> {
        if !validate_tag_name(tag) {
            return Err(TreeError::Validation(format!("invalid tag name: {tag:?}")));
        }
        let tagged = self
            .states
            .get(state_id)
            .ok_or_else(|| TreeError::NotFound(state_id.to_string()))?
            .add_tag(tag);
        self.update_state(state_id, tagged.clone())?;
        Ok(tagged)
    }

    pub fn untag_state(&mut self, state_id: &str, tag: &str) -> Result<StateRecord> {
        let untagged = self
            .states
            .get(state_id)
            .ok_or_else(|| TreeError::NotFound(state_id.to_string()))?
            .remove_tag(tag);
        self.update_state(state_id, untagged.clone())?;
        Ok(untagged)
    }

    /// Drops every state and resets numbering; IDs issued afterwards carry
    /// no relation to IDs issued before.
    pub fn clear(&mut self) {
        tracing::info!(state_count = self.states.len(), "ConversationTree: Clearing");
        self.states.clear();
        self.sequence_index.clear();
        self.children.clear();
        self.current = None;
        self.sequence_counter = 0;
    }
}
