//! Persisted form of a `ConversationTree`.
//!
//! Only the authoritative records, the current pointer and the counter are
//! written. The sequence index and child lists are rebuilt on restore, so a
//! snapshot can never carry a stale derived index.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;
use crate::structs::identifier::is_valid_hierarchical_id;
use crate::structs::state::{parent_hierarchical_id, StateRecord};
use crate::tree::ConversationTree;

pub const SNAPSHOT_VERSION: &str = "2.0.0";

type Result<T> = std::result::Result<T, PersistenceError>;

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TreeSnapshot {
    pub states: BTreeMap<String, StateRecord>,
    #[serde(default)]
    pub current_state: Option<String>,
    #[serde(default)]
    pub sequence_counter: u64,
    /// Informational only; restore never reads it.
    #[serde(default)]
    pub metadata: SnapshotMetadata,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SnapshotMetadata {
    #[serde(deserialize_with = "crate::structs::state::deserialize_timestamp")]
    pub saved_at: DateTime<Utc>,
    pub version: String,
    pub state_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl Default for SnapshotMetadata {
    fn default() -> Self {
        Self {
            saved_at: Utc::now(),
            version: SNAPSHOT_VERSION.to_string(),
            state_count: 0,
            filename: None,
        }
    }
}

impl TreeSnapshot {
    pub fn capture(tree: &ConversationTree) -> Self {
        Self {
            states: tree
                .states
                .iter()
                .map(|(id, state)| (id.clone(), state.clone()))
                .collect(),
            current_state: tree.current.clone(),
            sequence_counter: tree.sequence_counter,
            metadata: SnapshotMetadata {
                saved_at: Utc::now(),
                version: SNAPSHOT_VERSION.to_string(),
                state_count: tree.states.len(),
                filename: None,
            },
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.metadata.filename = Some(filename.into());
        self
    }

    /// Builds a fresh tree from the records, checking every structural
    /// invariant first. Nothing is returned unless all checks pass.
    pub fn restore(self) -> Result<ConversationTree> {
        let TreeSnapshot {
            states,
            current_state,
            sequence_counter,
            metadata: _,
        } = self;

        let mut sequence_index: HashMap<u64, String> = HashMap::with_capacity(states.len());
        let mut max_sequence = 0;

        for (key, state) in &states {
            if key != &state.hierarchical_id {
                return Err(PersistenceError::Inconsistent(format!(
                    "state stored under {key} claims id {}",
                    state.hierarchical_id
                )));
            }
            if !is_valid_hierarchical_id(key) {
                return Err(PersistenceError::Inconsistent(format!(
                    "malformed hierarchical id {key:?}"
                )));
            }
            if state.sequence_id == 0 {
                return Err(PersistenceError::Inconsistent(format!(
                    "state {key} has sequence id 0"
                )));
            }
            if let Some(previous) = sequence_index.insert(state.sequence_id, key.clone()) {
                return Err(PersistenceError::Inconsistent(format!(
                    "sequence id {} used by both {previous} and {key}",
                    state.sequence_id
                )));
            }
            if parent_hierarchical_id(key) != state.parent_id.as_deref() {
                return Err(PersistenceError::Inconsistent(format!(
                    "state {key} has parent {:?}, which its id does not encode",
                    state.parent_id
                )));
            }
            match &state.parent_id {
                Some(parent_id) if !states.contains_key(parent_id) => {
                    return Err(PersistenceError::Inconsistent(format!(
                        "state {key} references missing parent {parent_id}"
                    )));
                }
                None if *key != state.sequence_id.to_string() => {
                    return Err(PersistenceError::Inconsistent(format!(
                        "root {key} has sequence id {}",
                        state.sequence_id
                    )));
                }
                _ => {}
            }
            max_sequence = max_sequence.max(state.sequence_id);
        }

        ensure_chains_terminate(&states)?;

        if let Some(current) = &current_state {
            if !states.contains_key(current) {
                return Err(PersistenceError::Inconsistent(format!(
                    "current state {current} does not exist"
                )));
            }
        }

        let sequence_counter = if sequence_counter < max_sequence {
            tracing::warn!(
                stored = sequence_counter,
                max_sequence = max_sequence,
                "TreeSnapshot: sequence counter behind stored states, raising it"
            );
            max_sequence
        } else {
            sequence_counter
        };

        let mut children: HashMap<String, Vec<String>> = HashMap::new();
        let mut ordered: Vec<&StateRecord> = states.values().collect();
        ordered.sort_by_key(|state| state.sequence_id);
        for state in ordered {
            if let Some(parent_id) = &state.parent_id {
                children
                    .entry(parent_id.clone())
                    .or_default()
                    .push(state.hierarchical_id.clone());
            }
        }
        ensure_dense_slots(&children)?;

        tracing::debug!(
            state_count = states.len(),
            current = ?current_state,
            "TreeSnapshot: Restored tree"
        );

        Ok(ConversationTree {
            states: states.into_iter().collect(),
            sequence_index,
            children,
            current: current_state,
            sequence_counter,
        })
    }
}

/// Checks that each parent's children, in creation order, occupy slots
/// `1..=k` with no gaps, so the next child slot is always free.
fn ensure_dense_slots(children: &HashMap<String, Vec<String>>) -> Result<()> {
    for (parent_id, child_ids) in children {
        for (index, child_id) in child_ids.iter().enumerate() {
            let expected = format!("{parent_id}.{}", index + 1);
            if *child_id != expected {
                return Err(PersistenceError::Inconsistent(format!(
                    "child {child_id} of {parent_id} should be {expected}"
                )));
            }
        }
    }
    Ok(())
}

/// Walks every parent chain, failing if one runs longer than the number of
/// states (which can only happen on a cycle).
fn ensure_chains_terminate(states: &BTreeMap<String, StateRecord>) -> Result<()> {
    let mut known_rooted: HashSet<&str> = HashSet::new();

    for start in states.keys() {
        let mut chain: Vec<&str> = Vec::new();
        let mut cursor = Some(start.as_str());

        while let Some(id) = cursor {
            if known_rooted.contains(id) {
                break;
            }
            if chain.len() > states.len() {
                // Unreachable while ids must encode their parent: prefix chains always end.
                return Err(PersistenceError::Inconsistent(format!(
                    "parent chain starting at {start} does not terminate"
                )));
            }
            chain.push(id);
            cursor = states.get(id).and_then(|state| state.parent_id.as_deref());
        }

        known_rooted.extend(chain);
    }

    Ok(())
}

/// Serializes `tree` to the pretty-printed JSON snapshot format.
pub fn encode(tree: &ConversationTree) -> Result<String> {
    Ok(serde_json::to_string_pretty(&TreeSnapshot::capture(tree))?)
}

/// Parses and restores a snapshot into a new tree.
pub fn decode(content: &str) -> Result<ConversationTree> {
    let snapshot: TreeSnapshot = serde_json::from_str(content)
        .map_err(|e| PersistenceError::Malformed(e.to_string()))?;
    snapshot.restore()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_tree() -> ConversationTree {
        let mut tree = ConversationTree::new();
        tree.add_state(None, "What is AI?", "resp1", "m").unwrap();
        tree.add_state(Some("1"), "How?", "resp2", "m").unwrap();
        tree.add_state(Some("1"), "How?+variant", "resp3", "m").unwrap();
        tree.tag_state("1.2", "good-path").unwrap();
        tree.navigate_to("1.1");
        tree
    }

    fn record(id: &str, sequence: u64, parent: Option<&str>) -> serde_json::Value {
        json!({
            "hierarchical_id": id,
            "sequence_id": sequence,
            "parent_id": parent,
            "message": format!("m{sequence}"),
            "response": format!("r{sequence}"),
            "model": "m",
            "timestamp": "2024-01-01T00:00:00Z",
            "tags": []
        })
    }

    #[test]
    fn test_round_trip_preserves_tree() {
        let tree = sample_tree();
        let restored = decode(&encode(&tree).unwrap()).unwrap();

        assert_eq!(restored, tree);
        assert!(restored.find_state("1.2").unwrap().has_tag("good-path"));
        assert!(restored.find_state("1.2").unwrap().is_branch);
    }

    #[test]
    fn test_snapshot_layout() {
        let value: serde_json::Value =
            serde_json::from_str(&encode(&sample_tree()).unwrap()).unwrap();

        assert_eq!(value["current_state"], "1.1");
        assert_eq!(value["sequence_counter"], 3);
        assert_eq!(value["metadata"]["version"], SNAPSHOT_VERSION);
        assert_eq!(value["metadata"]["state_count"], 3);
        assert_eq!(value["states"].as_object().unwrap().len(), 3);
        assert!(value.get("children").is_none());
    }

    #[test]
    fn test_decode_without_metadata() {
        let content = json!({
            "states": {
                "1": record("1", 1, None),
                "1.1": record("1.1", 2, Some("1")),
                "1.1.1": record("1.1.1", 4, Some("1.1")),
                "1.2": record("1.2", 3, Some("1")),
            },
            "current_state": "1.2",
            "sequence_counter": 4
        })
        .to_string();

        let tree = decode(&content).unwrap();
        assert_eq!(tree.current_state_id(), Some("1.2"));
        assert_eq!(tree.find_state(3u64).unwrap().hierarchical_id, "1.2");
        // Child order follows creation order.
        assert_eq!(tree.children["1"], vec!["1.1", "1.2"]);
        assert_eq!(tree.children["1.1"], vec!["1.1.1"]);
    }

    #[test]
    fn test_decode_raises_lagging_counter() {
        let content = json!({
            "states": { "1": record("1", 1, None), "1.1": record("1.1", 2, Some("1")) },
            "sequence_counter": 0
        })
        .to_string();

        let mut tree = decode(&content).unwrap();
        assert_eq!(tree.sequence_counter(), 2);
        assert_eq!(tree.add_state(None, "x", "y", "m").unwrap().sequence_id, 3);
    }

    #[test]
    fn test_decode_malformed_json() {
        assert!(matches!(
            decode("{ not json"),
            Err(PersistenceError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_rejects_inconsistent_snapshots() {
        let cases = [
            json!({ "states": { "2": record("1", 1, None) } }),
            json!({ "states": { "1": record("1", 1, None), "1.1": record("1.1", 1, Some("1")) } }),
            json!({ "states": { "1.1": record("1.1", 2, Some("1")) } }),
            json!({ "states": { "1": record("1", 1, None), "1.1": record("1.1", 2, Some("2")) } }),
            json!({ "states": { "1": record("1", 1, None) }, "current_state": "7" }),
            json!({ "states": { "x": record("x", 1, None) } }),
            // Root id that is not its sequence number.
            json!({ "states": { "2": record("2", 1, None) }, "sequence_counter": 1 }),
            // Child slot 1 missing.
            json!({ "states": { "1": record("1", 1, None), "1.2": record("1.2", 2, Some("1")) } }),
            // Slots out of creation order.
            json!({ "states": {
                "1": record("1", 1, None),
                "1.1": record("1.1", 3, Some("1")),
                "1.2": record("1.2", 2, Some("1"))
            } }),
        ];

        for case in cases {
            let result = decode(&case.to_string());
            assert!(
                matches!(result, Err(PersistenceError::Inconsistent(_))),
                "expected inconsistency for {case}"
            );
        }
    }
}
