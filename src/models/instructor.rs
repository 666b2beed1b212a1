use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// An instructor, created once and shared across meetings.
///
/// Matched by `netid` when the source provides one, otherwise by
/// `normalized_name`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Instructor {
    pub id: i64,
    pub netid: Option<String>,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub normalized_name: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Lowercased, whitespace-collapsed full name used for matching when the
/// source omits an external identifier.
pub fn normalize_name(first: Option<&str>, middle: Option<&str>, last: Option<&str>) -> String {
    [first, middle, last]
        .iter()
        .flatten()
        .flat_map(|part| part.split_whitespace())
        .map(|word| word.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}
