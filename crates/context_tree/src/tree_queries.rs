use std::collections::VecDeque;

use crate::error::{Result, TreeError};
use crate::structs::message::ChatMessage;
use crate::structs::state::StateRecord;
use crate::tree::ConversationTree;

impl ConversationTree {
    /// Children of `state_id` in branch order.
    pub fn get_children(&self, state_id: &str) -> Vec<&StateRecord> {
        self.children
            .get(state_id)
            .map(|ids| ids.iter().filter_map(|id| self.states.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn get_parent(&self, state_id: &str) -> Option<&StateRecord> {
        self.states
            .get(state_id)
            .and_then(|state| state.parent_id.as_ref())
            .and_then(|parent_id| self.states.get(parent_id))
    }

    /// The parent's other children. Roots have no siblings.
    pub fn get_siblings(&self, state_id: &str) -> Vec<&StateRecord> {
        let Some(parent_id) = self
            .states
            .get(state_id)
            .and_then(|state| state.parent_id.as_deref())
        else {
            return Vec::new();
        };

        self.get_children(parent_id)
            .into_iter()
            .filter(|sibling| sibling.hierarchical_id != state_id)
            .collect()
    }

    /// States from the root down to `state_id`, inclusive.
    pub fn get_path_to_root(&self, state_id: &str) -> Result<Vec<&StateRecord>> {
        let mut state = self
            .states
            .get(state_id)
            .ok_or_else(|| TreeError::NotFound(state_id.to_string()))?;

        let mut path = vec![state];
        while let Some(parent_id) = state.parent_id.as_deref() {
            if path.len() > self.states.len() {
                return Err(TreeError::Validation(format!(
                    "parent chain of {state_id} does not reach a root"
                )));
            }
            state = self
                .states
                .get(parent_id)
                .ok_or_else(|| TreeError::NotFound(parent_id.to_string()))?;
            path.push(state);
        }

        path.reverse();
        Ok(path)
    }

    /// `state_id` and all of its descendants, breadth first.
    pub fn get_subtree(&self, state_id: &str) -> Vec<&StateRecord> {
        let mut subtree = Vec::new();
        let mut queue = VecDeque::from([state_id]);

        while let Some(id) = queue.pop_front() {
            let Some(state) = self.states.get(id) else {
                continue;
            };
            subtree.push(state);
            if let Some(children) = self.children.get(id) {
                queue.extend(children.iter().map(String::as_str));
            }
        }

        subtree
    }

    /// The model context for `state_id` (or the current state): one user and
    /// one assistant message per turn on the path from the root.
    pub fn get_conversation_messages(&self, state_id: Option<&str>) -> Result<Vec<ChatMessage>> {
        let Some(state_id) = state_id.or(self.current.as_deref()) else {
            return Ok(Vec::new());
        };

        let messages = self
            .get_path_to_root(state_id)?
            .into_iter()
            .flat_map(|state| {
                [
                    ChatMessage::user(state.message.clone()),
                    ChatMessage::assistant(state.response.clone()),
                ]
            })
            .collect();

        Ok(messages)
    }

    /// Every state in creation order.
    pub fn get_all_states(&self) -> Vec<&StateRecord> {
        let mut sequences: Vec<u64> = self.sequence_index.keys().copied().collect();
        sequences.sort_unstable();
        sequences
            .into_iter()
            .filter_map(|sequence| self.sequence_index.get(&sequence))
            .filter_map(|id| self.states.get(id))
            .collect()
    }

    pub fn get_root_states(&self) -> Vec<&StateRecord> {
        self.get_all_states()
            .into_iter()
            .filter(|state| state.is_root())
            .collect()
    }

    pub fn states_with_tag(&self, tag: &str) -> Vec<&StateRecord> {
        self.get_all_states()
            .into_iter()
            .filter(|state| state.has_tag(tag))
            .collect()
    }

    /// States carrying any of `tags`, in creation order. An empty filter
    /// matches everything.
    pub fn filter_by_tags(&self, tags: &[&str]) -> Vec<&StateRecord> {
        self.get_all_states()
            .into_iter()
            .filter(|state| tags.is_empty() || tags.iter().any(|tag| state.has_tag(tag)))
            .collect()
    }
}
