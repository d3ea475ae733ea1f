use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Tags with a fixed meaning and a one-key shortcut.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum KnownTag {
    GoodPath,
    BadPath,
    BranchPoint,
}

impl KnownTag {
    pub const ALL: [KnownTag; 3] = [KnownTag::GoodPath, KnownTag::BadPath, KnownTag::BranchPoint];

    pub fn name(self) -> &'static str {
        match self {
            KnownTag::GoodPath => "good-path",
            KnownTag::BadPath => "bad-path",
            KnownTag::BranchPoint => "branch-point",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            KnownTag::GoodPath => "✅",
            KnownTag::BadPath => "❌",
            KnownTag::BranchPoint => "⚡",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            KnownTag::GoodPath => "This branch worked well",
            KnownTag::BadPath => "This branch didn't work out",
            KnownTag::BranchPoint => "Good place to try alternatives",
        }
    }

    pub fn quick_key(self) -> char {
        match self {
            KnownTag::GoodPath => 'g',
            KnownTag::BadPath => 'b',
            KnownTag::BranchPoint => 'x',
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tag| tag.name() == name.trim())
    }

    /// Resolves a quick-tag key, case-insensitively.
    pub fn from_quick_key(key: &str) -> Option<Self> {
        let key = key.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|tag| key.len() == 1 && key.starts_with(tag.quick_key()))
    }
}

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z0-9\s\-_]+$").expect("valid tag regex"))
}

/// Tag names are non-blank and limited to letters, digits, spaces, `-` and `_`.
pub fn validate_tag_name(tag: &str) -> bool {
    let tag = tag.trim();
    !tag.is_empty() && tag_pattern().is_match(tag)
}

/// Emoji for a known tag, empty for free-form tags.
pub fn tag_display(tag: &str) -> &'static str {
    KnownTag::from_name(tag).map(KnownTag::emoji).unwrap_or("")
}

/// One line per known tag: `  [g] ✅ good-path - This branch worked well`.
pub fn tag_help() -> String {
    KnownTag::ALL
        .iter()
        .map(|tag| {
            format!(
                "  [{}] {} {} - {}",
                tag.quick_key(),
                tag.emoji(),
                tag.name(),
                tag.description()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quick_keys() {
        assert_eq!(KnownTag::from_quick_key("g"), Some(KnownTag::GoodPath));
        assert_eq!(KnownTag::from_quick_key("B"), Some(KnownTag::BadPath));
        assert_eq!(KnownTag::from_quick_key("x"), Some(KnownTag::BranchPoint));
        assert_eq!(KnownTag::from_quick_key("gg"), None);
        assert_eq!(KnownTag::from_quick_key("z"), None);
    }

    #[test]
    fn test_validate_tag_name() {
        assert!(validate_tag_name("important"));
        assert!(validate_tag_name("good path_2"));
        assert!(!validate_tag_name("   "));
        assert!(!validate_tag_name("no/slashes"));
    }

    #[test]
    fn test_tag_display_and_help() {
        assert_eq!(tag_display("bad-path"), "❌");
        assert_eq!(tag_display("important"), "");

        let help = tag_help();
        assert_eq!(help.lines().count(), 3);
        assert!(help.contains("[x] ⚡ branch-point"));
    }
}
