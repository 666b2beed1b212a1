use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Provenance record for one (semester, subject) import run. Written once
/// per run; never read back by the engine.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ImportRun {
    pub id: String,
    pub semester: String,
    pub subject: String,
    pub started_at: String,
    pub finished_at: String,
    /// "ok" or "failed".
    pub outcome: String,
    /// JSON-serialized ImportStats.
    pub stats: String,
}
