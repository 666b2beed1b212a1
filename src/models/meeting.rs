use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A scheduled meeting of a section. Meetings form an append-only set per
/// section: two meetings are the same row iff pattern, times and location
/// all match.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Meeting {
    pub id: i64,
    pub class_section_id: i64,
    pub pattern: Option<String>,
    pub time_start: Option<String>,
    pub time_end: Option<String>,
    pub location: Option<String>,
    pub created_at: String,
}
