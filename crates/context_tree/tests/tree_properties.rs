//! Structural properties of the conversation tree, exercised through the
//! public API only.

use context_tree::{
    decode, encode, parent_hierarchical_id, ChatMessage, ConversationTree, NavigationError,
    TreeNavigator,
};

/// Grows a tree with a deterministic mix of new roots, extensions and
/// branches so that branch slots and sequence numbers interleave.
fn grown_tree(turns: usize) -> ConversationTree {
    let mut tree = ConversationTree::new();
    for turn in 0..turns {
        let parent = match turn % 5 {
            0 if turn % 10 == 0 => None,
            1 | 2 => tree.current_state_id().map(str::to_string),
            _ => tree
                .get_all_states()
                .get(turn / 3)
                .map(|state| state.hierarchical_id.clone()),
        };
        tree.add_state(
            parent.as_deref(),
            format!("message {turn}"),
            format!("response {turn}"),
            "test-model",
        )
        .unwrap();
    }
    tree
}

#[test]
fn sequence_ids_are_dense_and_ordered() {
    let tree = grown_tree(40);
    let sequences: Vec<u64> = tree
        .get_all_states()
        .iter()
        .map(|state| state.sequence_id)
        .collect();
    assert_eq!(sequences, (1..=40).collect::<Vec<u64>>());
    assert_eq!(tree.sequence_counter(), 40);
}

#[test]
fn hierarchical_id_encodes_parent() {
    let tree = grown_tree(40);
    for state in tree.get_all_states() {
        assert_eq!(
            parent_hierarchical_id(&state.hierarchical_id),
            state.parent_id.as_deref(),
            "state {}",
            state.hierarchical_id
        );
    }
}

#[test]
fn children_of_parent_contain_child() {
    let tree = grown_tree(40);
    for state in tree.get_all_states() {
        let Some(parent) = tree.get_parent(&state.hierarchical_id) else {
            assert!(state.is_root());
            continue;
        };
        assert!(tree
            .get_children(&parent.hierarchical_id)
            .iter()
            .any(|child| child.hierarchical_id == state.hierarchical_id));
    }
}

#[test]
fn round_trip_is_observationally_equivalent() {
    let mut tree = grown_tree(25);
    tree.tag_state("1", "branch-point").unwrap();
    tree.navigate_to(7u64);

    let restored = decode(&encode(&tree).unwrap()).unwrap();

    assert_eq!(restored.state_count(), tree.state_count());
    assert_eq!(restored.current_state_id(), tree.current_state_id());
    assert_eq!(restored.sequence_counter(), tree.sequence_counter());
    for state in tree.get_all_states() {
        let id = state.hierarchical_id.as_str();
        assert_eq!(restored.find_state(id), Some(state));
        assert_eq!(
            restored.get_conversation_messages(Some(id)).unwrap(),
            tree.get_conversation_messages(Some(id)).unwrap()
        );
        assert_eq!(restored.get_children(id), tree.get_children(id));
    }
    assert_eq!(
        restored.get_conversation_messages(None).unwrap(),
        tree.get_conversation_messages(None).unwrap()
    );
}

#[test]
fn branch_slots_are_positional_and_permanent() {
    let mut tree = ConversationTree::new();
    tree.add_state(None, "root", "r", "m").unwrap();
    tree.add_state(None, "other root", "r", "m").unwrap();

    let first = tree.add_state(Some("1"), "a", "r", "m").unwrap();
    tree.add_state(Some("2"), "unrelated", "r", "m").unwrap();
    tree.add_state(Some("2.1"), "unrelated deeper", "r", "m").unwrap();
    let second = tree.add_state(Some("1"), "b", "r", "m").unwrap();
    tree.tag_state("1.1", "bad-path").unwrap();
    let third = tree.add_state(Some("1"), "c", "r", "m").unwrap();

    assert_eq!(
        [first.hierarchical_id, second.hierarchical_id, third.hierarchical_id],
        ["1.1", "1.2", "1.3"]
    );
    assert_eq!(
        [first.sequence_id, second.sequence_id, third.sequence_id],
        [3, 6, 7]
    );
    assert!(!first.is_branch);
    assert!(second.is_branch && third.is_branch);
}

#[test]
fn what_is_ai_scenario() {
    let mut tree = ConversationTree::new();
    let root = tree.add_state(None, "What is AI?", "resp1", "m").unwrap();
    assert_eq!((root.hierarchical_id.as_str(), root.sequence_id), ("1", 1));

    let first = tree.add_state(Some("1"), "How?", "resp2", "m").unwrap();
    assert_eq!((first.hierarchical_id.as_str(), first.sequence_id), ("1.1", 2));
    assert!(!first.is_branch);

    let second = tree.add_state(Some("1"), "How?+variant", "resp3", "m").unwrap();
    assert_eq!((second.hierarchical_id.as_str(), second.sequence_id), ("1.2", 3));
    assert!(second.is_branch);

    assert_eq!(
        tree.get_conversation_messages(Some("1.2")).unwrap(),
        vec![
            ChatMessage::user("What is AI?"),
            ChatMessage::assistant("resp1"),
            ChatMessage::user("How?+variant"),
            ChatMessage::assistant("resp3"),
        ]
    );
}

#[test]
fn navigator_boundaries() {
    let mut tree = ConversationTree::new();
    tree.add_state(None, "root", "r", "m").unwrap();
    tree.add_state(Some("1"), "only child", "r", "m").unwrap();
    tree.navigate_to("1");

    let mut navigator = TreeNavigator::new(&mut tree);
    assert_eq!(navigator.go_up().unwrap_err(), NavigationError::AlreadyAtRoot);

    let err = navigator.go_down(2).unwrap_err();
    assert_eq!(
        err,
        NavigationError::InvalidBranchIndex {
            index: 2,
            available: 1
        }
    );
    assert!(err.to_string().ends_with("Available: 1-1"));
}
