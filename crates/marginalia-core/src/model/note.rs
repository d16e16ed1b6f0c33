use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Background color applied to notes that were created without one.
pub const DEFAULT_NOTE_COLOR: &str = "#ffffff";

/// A rich-text note.
///
/// `content` holds the plain-text body; `content_html` the rendered rich-text
/// form, when the editor produced one. Checklist/TODO sub-content lives in
/// `list_items` rows keyed by the note id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub content: String,
    pub content_html: Option<String>,
    pub color: String,
    pub is_pinned: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNote {
    pub user_id: i64,
    pub title: String,
    pub content: String,
    pub content_html: Option<String>,

    /// Defaults to [`DEFAULT_NOTE_COLOR`] when absent.
    pub color: Option<String>,
}

impl NewNote {
    #[must_use]
    pub fn new(user_id: i64, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            user_id,
            title: title.into(),
            content: content.into(),
            content_html: None,
            color: None,
        }
    }

    #[must_use]
    pub fn with_content_html(mut self, html: impl Into<String>) -> Self {
        self.content_html = Some(html.into());
        self
    }

    #[must_use]
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

/// Fields a note edit may change. Pinned state is toggled separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteUpdate {
    pub title: String,
    pub content: String,
    pub content_html: Option<String>,
    pub color: String,
}
