use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Color applied to flags that were created without one.
pub const DEFAULT_FLAG_COLOR: &str = "#667eea";

/// A reusable tag that checklist items can carry.
///
/// Flag names are unique across the whole database; deleting a flag detaches
/// it from items rather than deleting them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flag {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
}
