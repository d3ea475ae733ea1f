//! Interactive movement over a `ConversationTree`.

use crate::error::NavigationError;
use crate::structs::identifier::StateIdentifier;
use crate::structs::state::StateRecord;
use crate::tree::ConversationTree;

const MAX_SUGGESTIONS: usize = 3;
const SEQUENCE_SUGGESTION_RADIUS: u64 = 2;
const LIST_STATES_HINT: &str = "List all states to see the available identifiers";

/// What surrounds the current state, for display.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct NavigationContext<'a> {
    pub current: Option<&'a StateRecord>,
    pub parent: Option<&'a StateRecord>,
    pub children: Vec<&'a StateRecord>,
    pub siblings: Vec<&'a StateRecord>,
    pub path_to_root: Vec<&'a StateRecord>,
}

impl NavigationContext<'_> {
    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }
}

pub struct TreeNavigator<'a> {
    tree: &'a mut ConversationTree,
}

impl<'a> TreeNavigator<'a> {
    pub fn new(tree: &'a mut ConversationTree) -> Self {
        Self { tree }
    }

    pub fn tree(&self) -> &ConversationTree {
        &*self.tree
    }

    /// Looks `identifier` up without moving.
    pub fn resolve(
        &self,
        identifier: impl Into<StateIdentifier>,
    ) -> Result<&StateRecord, NavigationError> {
        let identifier = identifier.into();
        self.tree
            .find_state(&identifier)
            .ok_or_else(|| NavigationError::Unresolved {
                target: identifier.to_string(),
                suggestions: self.suggestions_for(&identifier),
            })
    }

    pub fn go_to_state(
        &mut self,
        identifier: impl Into<StateIdentifier>,
    ) -> Result<&StateRecord, NavigationError> {
        let target = self.resolve(identifier)?.hierarchical_id.clone();
        self.tree.navigate_to(target.as_str());
        self.tree
            .current_state()
            .ok_or(NavigationError::NoCurrentState)
    }

    /// Like `go_to_state`, starting from raw user text.
    pub fn go_to_input(&mut self, raw: &str) -> Result<&StateRecord, NavigationError> {
        match StateIdentifier::parse(raw) {
            Some(identifier) => self.go_to_state(identifier),
            None => Err(NavigationError::Unresolved {
                target: raw.trim().to_string(),
                suggestions: self.suggestions_for(&StateIdentifier::Path(raw.trim().to_string())),
            }),
        }
    }

    pub fn go_up(&mut self) -> Result<&StateRecord, NavigationError> {
        let current = self
            .tree
            .current_state()
            .ok_or(NavigationError::NoCurrentState)?;
        let parent_id = current
            .parent_id
            .clone()
            .ok_or(NavigationError::AlreadyAtRoot)?;

        self.go_to_state(parent_id)
    }

    /// Moves to the `branch_index`-th child (1-based, branch order).
    pub fn go_down(&mut self, branch_index: usize) -> Result<&StateRecord, NavigationError> {
        let current = self
            .tree
            .current_state()
            .ok_or(NavigationError::NoCurrentState)?;
        let children = self.tree.get_children(&current.hierarchical_id);

        if children.is_empty() {
            return Err(NavigationError::NoChildren);
        }
        if branch_index < 1 || branch_index > children.len() {
            return Err(NavigationError::InvalidBranchIndex {
                index: branch_index,
                available: children.len(),
            });
        }

        let target = children[branch_index - 1].hierarchical_id.clone();
        self.go_to_state(target)
    }

    pub fn get_navigation_context(&self) -> NavigationContext<'_> {
        navigation_context(&*self.tree)
    }

    fn suggestions_for(&self, identifier: &StateIdentifier) -> Vec<String> {
        let all_states = self.tree.get_all_states();

        let mut suggestions: Vec<String> = match identifier {
            StateIdentifier::Sequence(sequence) => all_states
                .iter()
                .map(|state| state.sequence_id)
                .filter(|candidate| candidate.abs_diff(*sequence) <= SEQUENCE_SUGGESTION_RADIUS)
                .take(MAX_SUGGESTIONS)
                .map(|candidate| format!("Try sequence {candidate}"))
                .collect(),
            StateIdentifier::Path(path) => all_states
                .iter()
                .map(|state| state.hierarchical_id.as_str())
                .filter(|candidate| {
                    !path.is_empty() && (candidate.contains(path.as_str()) || path.contains(candidate))
                })
                .take(MAX_SUGGESTIONS)
                .map(|candidate| format!("Try '{candidate}'"))
                .collect(),
        };

        suggestions.push(LIST_STATES_HINT.to_string());
        suggestions
    }
}

/// Builds the display aggregate around the tree's current state.
pub fn navigation_context(tree: &ConversationTree) -> NavigationContext<'_> {
    let Some(current) = tree.current_state() else {
        return NavigationContext::default();
    };
    let id = current.hierarchical_id.as_str();

    NavigationContext {
        current: Some(current),
        parent: tree.get_parent(id),
        children: tree.get_children(id),
        siblings: tree.get_siblings(id),
        path_to_root: tree.get_path_to_root(id).unwrap_or_default(),
    }
}
