use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::section::OpenStatus;

/// One enrollable offering of a course in one semester, keyed naturally by
/// (course_id, semester, source_group_id).
///
/// `cross_list_key` marks offerings of the same physical class listed under
/// different subjects; `combined_group_id` is a weak reference assigned by
/// the combined-group resolver (None means "not known to be cross-listed").
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EnrollGroup {
    pub id: i64,
    pub course_id: i64,
    pub semester: String,
    pub source_group_id: String,
    pub topic: Option<String>,
    pub cross_list_key: Option<String>,
    pub units_minimum: Option<f64>,
    pub units_maximum: Option<f64>,
    pub grading_basis: Option<String>,
    pub session_code: Option<String>,
    pub open_status: OpenStatus,
    pub combined_group_id: Option<i64>,
    pub last_offered_semester: String,
    pub created_at: String,
    pub updated_at: String,
}

impl EnrollGroup {
    pub fn snapshot(&self) -> EnrollGroupSnapshot {
        EnrollGroupSnapshot {
            topic: self.topic.clone(),
            cross_list_key: self.cross_list_key.clone(),
            units_minimum: self.units_minimum,
            units_maximum: self.units_maximum,
            grading_basis: self.grading_basis.clone(),
            session_code: self.session_code.clone(),
            open_status: self.open_status,
        }
    }
}

/// The mutable current-snapshot portion of an enroll group. Compared as a
/// whole so unchanged re-imports write nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrollGroupSnapshot {
    pub topic: Option<String>,
    pub cross_list_key: Option<String>,
    pub units_minimum: Option<f64>,
    pub units_maximum: Option<f64>,
    pub grading_basis: Option<String>,
    pub session_code: Option<String>,
    pub open_status: OpenStatus,
}

/// Identity plus initial snapshot for a group being seen for the first time.
#[derive(Debug, Clone)]
pub struct NewEnrollGroup {
    pub course_id: i64,
    pub semester: String,
    pub source_group_id: String,
    pub snapshot: EnrollGroupSnapshot,
}
