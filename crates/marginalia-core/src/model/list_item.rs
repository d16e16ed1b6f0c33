use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry of a note's checklist, flagged-checklist, or TODO node.
///
/// This is the read model: `flag_name`/`flag_color` are resolved from the
/// item's flag, when it has one, so a caller can render the item without a
/// second lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItem {
    pub id: i64,
    pub note_id: i64,
    pub content: String,
    pub flag_id: Option<i64>,
    pub position: i64,

    /// Completion state; only meaningful for TODO nodes.
    pub completed: bool,

    pub created_at: DateTime<Utc>,
    pub flag_name: Option<String>,
    pub flag_color: Option<String>,
}

/// Fields for (re)writing a note's items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewListItem {
    pub content: String,
    pub flag_id: Option<i64>,
    pub position: i64,
    pub completed: bool,
}

impl NewListItem {
    #[must_use]
    pub fn new(content: impl Into<String>, position: i64) -> Self {
        Self {
            content: content.into(),
            flag_id: None,
            position,
            completed: false,
        }
    }

    #[must_use]
    pub fn with_flag(mut self, flag_id: i64) -> Self {
        self.flag_id = Some(flag_id);
        self
    }

    #[must_use]
    pub fn completed(mut self, completed: bool) -> Self {
        self.completed = completed;
        self
    }
}
