use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A cross-listing group. Membership is the set of enroll groups whose
/// `combined_group_id` points here.
///
/// A row with `merged_into = None` is a live root. When two groups are
/// discovered to be the same class, the absorbed row keeps pointing at its
/// survivor permanently so historical references still resolve.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CombinedGroup {
    pub id: i64,
    /// Semester in which the group was first detected.
    pub semester: String,
    pub merged_into: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

impl CombinedGroup {
    pub fn is_root(&self) -> bool {
        self.merged_into.is_none()
    }
}
