use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Enrollment status as reported by the source for a section or group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum OpenStatus {
    Open,
    Closed,
    Waitlist,
    Unknown,
}

impl OpenStatus {
    /// Source wire codes: "O", "C", "W". Anything else maps to Unknown.
    pub fn from_source_code(code: Option<&str>) -> Self {
        match code {
            Some("O") => OpenStatus::Open,
            Some("C") => OpenStatus::Closed,
            Some("W") => OpenStatus::Waitlist,
            _ => OpenStatus::Unknown,
        }
    }
}

/// One scheduled component (LEC/DIS/LAB/...) of an enroll group, keyed
/// naturally by (enroll_group_id, section_type, section_number).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ClassSection {
    pub id: i64,
    pub enroll_group_id: i64,
    pub section_type: String,
    pub section_number: String,
    /// Source-global section identifier for the semester.
    pub class_nbr: i64,
    pub open_status: OpenStatus,
    pub created_at: String,
    pub updated_at: String,
}
