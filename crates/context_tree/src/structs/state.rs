use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One conversational turn: the user's message and the model's reply.
///
/// Records are values. Changing tags means building a new record with
/// `with_tags`/`add_tag`/`remove_tag` and handing it to
/// `ConversationTree::update_state`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StateRecord {
    /// Dot-separated branch path, e.g. `"1.2.1"`.
    pub hierarchical_id: String,

    /// Global creation order, starting at 1.
    pub sequence_id: u64,

    /// Hierarchical ID of the parent turn (None for roots).
    pub parent_id: Option<String>,

    pub message: String,
    pub response: String,
    pub model: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub tags: BTreeSet<String>,

    /// Whether the parent already had a child when this turn was added.
    #[serde(default)]
    pub is_branch: bool,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl StateRecord {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Depth in the tree, counting roots as 1.
    pub fn depth(&self) -> usize {
        self.hierarchical_id.split('.').count()
    }

    /// `"<sequence> (<hierarchical>)"`, as shown in state listings.
    pub fn display_name(&self) -> String {
        format!("{} ({})", self.sequence_id, self.hierarchical_id)
    }

    /// The message cut to `max_chars` characters, with `...` when truncated.
    pub fn message_preview(&self, max_chars: usize) -> String {
        let mut chars = self.message.chars();
        let preview: String = chars.by_ref().take(max_chars).collect();
        if chars.next().is_some() {
            format!("{preview}...")
        } else {
            preview
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn with_tags<I, T>(&self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
            ..self.clone()
        }
    }

    pub fn add_tag(&self, tag: &str) -> Self {
        let mut tags = self.tags.clone();
        tags.insert(tag.trim().to_string());
        self.with_tags(tags)
    }

    pub fn remove_tag(&self, tag: &str) -> Self {
        let mut tags = self.tags.clone();
        tags.remove(tag.trim());
        self.with_tags(tags)
    }
}

/// Returns the hierarchical ID of the parent encoded in `hierarchical_id`,
/// or `None` when the ID has no dot (a root).
pub fn parent_hierarchical_id(hierarchical_id: &str) -> Option<&str> {
    hierarchical_id
        .rsplit_once('.')
        .map(|(parent, _)| parent)
}

/// Parses an RFC 3339 timestamp, or one without an offset, taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.with_timezone(&Utc));
    }
    raw.parse::<NaiveDateTime>()
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

pub(crate) fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp {raw:?}")))
}
