use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A catalog course, keyed naturally by (subject, course_number).
///
/// `title` and `description` reflect the most recently offered semester;
/// `last_offered_semester` only ever moves forward in semester order.
/// `last_offered_year` is denormalized from the semester code for range
/// queries.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Course {
    pub id: i64,
    pub subject: String,
    pub course_number: String,
    pub title: String,
    pub description: String,
    pub last_offered_semester: Option<String>,
    pub last_offered_year: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}
