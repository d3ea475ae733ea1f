use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::sync::OnceLock;

/// The two ways a user can address a state.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum StateIdentifier {
    /// Global creation order (`sequence_id`).
    Sequence(u64),
    /// Dot-separated branch path (`hierarchical_id`).
    Path(String),
}

fn hierarchical_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d+(\.\d+)*$").expect("valid hierarchical id regex"))
}

/// Checks the `1`, `1.1`, `1.2.3` shape.
pub fn is_valid_hierarchical_id(raw: &str) -> bool {
    hierarchical_pattern().is_match(raw)
}

impl StateIdentifier {
    /// Parses raw user input. A positive integer is a sequence number, a
    /// dotted path is a hierarchical ID, anything else is rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();

        if let Ok(sequence) = raw.parse::<i64>() {
            return u64::try_from(sequence)
                .ok()
                .filter(|sequence| *sequence > 0)
                .map(StateIdentifier::Sequence);
        }

        if is_valid_hierarchical_id(raw) {
            return Some(StateIdentifier::Path(raw.to_string()));
        }

        None
    }
}

impl Display for StateIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateIdentifier::Sequence(sequence) => write!(f, "{sequence}"),
            StateIdentifier::Path(path) => write!(f, "{path}"),
        }
    }
}

impl From<u64> for StateIdentifier {
    fn from(sequence: u64) -> Self {
        StateIdentifier::Sequence(sequence)
    }
}

impl From<&str> for StateIdentifier {
    fn from(path: &str) -> Self {
        StateIdentifier::Path(path.to_string())
    }
}

impl From<String> for StateIdentifier {
    fn from(path: String) -> Self {
        StateIdentifier::Path(path)
    }
}

impl From<&StateIdentifier> for StateIdentifier {
    fn from(identifier: &StateIdentifier) -> Self {
        identifier.clone()
    }
}

impl From<&String> for StateIdentifier {
    fn from(path: &String) -> Self {
        StateIdentifier::Path(path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_integers_as_sequence() {
        assert_eq!(StateIdentifier::parse("3"), Some(StateIdentifier::Sequence(3)));
        assert_eq!(StateIdentifier::parse(" 12 "), Some(StateIdentifier::Sequence(12)));
    }

    #[test]
    fn parse_rejects_non_positive_sequences() {
        assert_eq!(StateIdentifier::parse("0"), None);
        assert_eq!(StateIdentifier::parse("-4"), None);
    }

    #[test]
    fn parse_dotted_paths() {
        assert_eq!(
            StateIdentifier::parse("1.2.3"),
            Some(StateIdentifier::Path("1.2.3".to_string()))
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        for raw in ["", "invalid", "1.", ".1", "1..2", "1.a", "1 .2"] {
            assert_eq!(StateIdentifier::parse(raw), None, "input {raw:?}");
        }
    }

    #[test]
    fn display_matches_input_form() {
        assert_eq!(StateIdentifier::Sequence(7).to_string(), "7");
        assert_eq!(StateIdentifier::from("2.1").to_string(), "2.1");
    }
}
