use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A subject code such as "MATH". Written once on first reference and never
/// updated by the import engine afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subject {
    pub code: String,
    pub name: String,
    pub created_at: String,
}
