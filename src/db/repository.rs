use chrono::Utc;
use sqlx::SqliteConnection;

use crate::models::enroll_group::{EnrollGroupSnapshot, NewEnrollGroup};
use crate::models::{
    ClassSection, CombinedGroup, Course, EnrollGroup, ImportRun, Instructor, Meeting, OpenStatus,
    Subject,
};

// Every function takes a plain connection so the caller decides the
// transactional scope: one record's merge or one resolver phase.

pub async fn find_subject(
    conn: &mut SqliteConnection,
    code: &str,
) -> Result<Option<Subject>, sqlx::Error> {
    sqlx::query_as::<_, Subject>("SELECT code, name, created_at FROM subjects WHERE code = ?")
        .bind(code)
        .fetch_optional(conn)
        .await
}

/// Insert the subject if it is new. Subjects are written once and never
/// updated afterwards, so an existing row is left exactly as it is.
pub async fn ensure_subject(
    conn: &mut SqliteConnection,
    code: &str,
    name: &str,
) -> Result<bool, sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    let result = sqlx::query(
        "INSERT OR IGNORE INTO subjects (code, name, created_at) VALUES (?, ?, ?)",
    )
    .bind(code)
    .bind(name)
    .bind(&now)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn find_course_by_key(
    conn: &mut SqliteConnection,
    subject: &str,
    course_number: &str,
) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(
        "SELECT id, subject, course_number, title, description,
                last_offered_semester, last_offered_year, created_at, updated_at
         FROM courses
         WHERE subject = ? AND course_number = ?",
    )
    .bind(subject)
    .bind(course_number)
    .fetch_optional(conn)
    .await
}

pub async fn get_course(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(
        "SELECT id, subject, course_number, title, description,
                last_offered_semester, last_offered_year, created_at, updated_at
         FROM courses
         WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(conn)
    .await
}

pub async fn insert_course(
    conn: &mut SqliteConnection,
    subject: &str,
    course_number: &str,
    title: &str,
    description: &str,
    last_offered_semester: &str,
    last_offered_year: i64,
) -> Result<Course, sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    let result = sqlx::query(
        "INSERT INTO courses
            (subject, course_number, title, description,
             last_offered_semester, last_offered_year, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(subject)
    .bind(course_number)
    .bind(title)
    .bind(description)
    .bind(last_offered_semester)
    .bind(last_offered_year)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    get_course(conn, result.last_insert_rowid())
        .await?
        .ok_or(sqlx::Error::RowNotFound)
}

pub async fn update_course_snapshot(
    conn: &mut SqliteConnection,
    id: i64,
    title: &str,
    description: &str,
) -> Result<(), sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    sqlx::query("UPDATE courses SET title = ?, description = ?, updated_at = ? WHERE id = ?")
        .bind(title)
        .bind(description)
        .bind(&now)
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn advance_course_last_offered(
    conn: &mut SqliteConnection,
    id: i64,
    semester: &str,
    year: i64,
) -> Result<(), sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        "UPDATE courses
         SET last_offered_semester = ?, last_offered_year = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(semester)
    .bind(year)
    .bind(&now)
    .bind(id)
    .execute(conn)
    .await?;
    Ok(())
}

const ENROLL_GROUP_COLUMNS: &str =
    "id, course_id, semester, source_group_id, topic, cross_list_key,
     units_minimum, units_maximum, grading_basis, session_code, open_status,
     combined_group_id, last_offered_semester, created_at, updated_at";

pub async fn find_enroll_group_by_key(
    conn: &mut SqliteConnection,
    course_id: i64,
    semester: &str,
    source_group_id: &str,
) -> Result<Option<EnrollGroup>, sqlx::Error> {
    let sql = format!(
        "SELECT {ENROLL_GROUP_COLUMNS} FROM enroll_groups
         WHERE course_id = ? AND semester = ? AND source_group_id = ?"
    );
    sqlx::query_as::<_, EnrollGroup>(&sql)
        .bind(course_id)
        .bind(semester)
        .bind(source_group_id)
        .fetch_optional(conn)
        .await
}

pub async fn get_enroll_group(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<EnrollGroup>, sqlx::Error> {
    let sql = format!("SELECT {ENROLL_GROUP_COLUMNS} FROM enroll_groups WHERE id = ?");
    sqlx::query_as::<_, EnrollGroup>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await
}

pub async fn insert_enroll_group(
    conn: &mut SqliteConnection,
    new: &NewEnrollGroup,
) -> Result<EnrollGroup, sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    let result = sqlx::query(
        "INSERT INTO enroll_groups
            (course_id, semester, source_group_id, topic, cross_list_key,
             units_minimum, units_maximum, grading_basis, session_code,
             open_status, combined_group_id, last_offered_semester,
             created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, ?, ?, ?)",
    )
    .bind(new.course_id)
    .bind(&new.semester)
    .bind(&new.source_group_id)
    .bind(&new.snapshot.topic)
    .bind(&new.snapshot.cross_list_key)
    .bind(new.snapshot.units_minimum)
    .bind(new.snapshot.units_maximum)
    .bind(&new.snapshot.grading_basis)
    .bind(&new.snapshot.session_code)
    .bind(new.snapshot.open_status)
    .bind(&new.semester)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    get_enroll_group(conn, result.last_insert_rowid())
        .await?
        .ok_or(sqlx::Error::RowNotFound)
}

pub async fn update_enroll_group_snapshot(
    conn: &mut SqliteConnection,
    id: i64,
    snapshot: &EnrollGroupSnapshot,
) -> Result<(), sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        "UPDATE enroll_groups
         SET topic = ?, cross_list_key = ?, units_minimum = ?, units_maximum = ?,
             grading_basis = ?, session_code = ?, open_status = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(&snapshot.topic)
    .bind(&snapshot.cross_list_key)
    .bind(snapshot.units_minimum)
    .bind(snapshot.units_maximum)
    .bind(&snapshot.grading_basis)
    .bind(&snapshot.session_code)
    .bind(snapshot.open_status)
    .bind(&now)
    .bind(id)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn update_enroll_group_last_offered(
    conn: &mut SqliteConnection,
    id: i64,
    semester: &str,
) -> Result<(), sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    sqlx::query("UPDATE enroll_groups SET last_offered_semester = ?, updated_at = ? WHERE id = ?")
        .bind(semester)
        .bind(&now)
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn update_enroll_group_combined(
    conn: &mut SqliteConnection,
    id: i64,
    combined_group_id: i64,
) -> Result<(), sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    sqlx::query("UPDATE enroll_groups SET combined_group_id = ?, updated_at = ? WHERE id = ?")
        .bind(combined_group_id)
        .bind(&now)
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn list_enroll_groups_for_semester(
    conn: &mut SqliteConnection,
    semester: &str,
) -> Result<Vec<EnrollGroup>, sqlx::Error> {
    let sql = format!(
        "SELECT {ENROLL_GROUP_COLUMNS} FROM enroll_groups
         WHERE semester = ?
         ORDER BY id"
    );
    sqlx::query_as::<_, EnrollGroup>(&sql)
        .bind(semester)
        .fetch_all(conn)
        .await
}

/// Repoint every enroll group of `from_group` (any semester) to `to_group`.
/// Returns the number of memberships moved.
pub async fn reassign_combined_members(
    conn: &mut SqliteConnection,
    from_group: i64,
    to_group: i64,
) -> Result<u64, sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    let result = sqlx::query(
        "UPDATE enroll_groups SET combined_group_id = ?, updated_at = ?
         WHERE combined_group_id = ?",
    )
    .bind(to_group)
    .bind(&now)
    .bind(from_group)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn find_section_by_key(
    conn: &mut SqliteConnection,
    enroll_group_id: i64,
    section_type: &str,
    section_number: &str,
) -> Result<Option<ClassSection>, sqlx::Error> {
    sqlx::query_as::<_, ClassSection>(
        "SELECT id, enroll_group_id, section_type, section_number, class_nbr,
                open_status, created_at, updated_at
         FROM class_sections
         WHERE enroll_group_id = ? AND section_type = ? AND section_number = ?",
    )
    .bind(enroll_group_id)
    .bind(section_type)
    .bind(section_number)
    .fetch_optional(conn)
    .await
}

pub async fn insert_section(
    conn: &mut SqliteConnection,
    enroll_group_id: i64,
    section_type: &str,
    section_number: &str,
    class_nbr: i64,
    open_status: OpenStatus,
) -> Result<ClassSection, sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    let result = sqlx::query(
        "INSERT INTO class_sections
            (enroll_group_id, section_type, section_number, class_nbr,
             open_status, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(enroll_group_id)
    .bind(section_type)
    .bind(section_number)
    .bind(class_nbr)
    .bind(open_status)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await?;
    let id = result.last_insert_rowid();

    sqlx::query_as::<_, ClassSection>(
        "SELECT id, enroll_group_id, section_type, section_number, class_nbr,
                open_status, created_at, updated_at
         FROM class_sections WHERE id = ?",
    )
    .bind(id)
    .fetch_one(conn)
    .await
}

pub async fn update_section_snapshot(
    conn: &mut SqliteConnection,
    id: i64,
    class_nbr: i64,
    open_status: OpenStatus,
) -> Result<(), sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        "UPDATE class_sections SET class_nbr = ?, open_status = ?, updated_at = ? WHERE id = ?",
    )
    .bind(class_nbr)
    .bind(open_status)
    .bind(&now)
    .bind(id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Exact-match lookup; `IS` keeps the comparison NULL-safe, so a meeting
/// with no location only matches another meeting with no location.
pub async fn find_meeting(
    conn: &mut SqliteConnection,
    class_section_id: i64,
    pattern: Option<&str>,
    time_start: Option<&str>,
    time_end: Option<&str>,
    location: Option<&str>,
) -> Result<Option<Meeting>, sqlx::Error> {
    sqlx::query_as::<_, Meeting>(
        "SELECT id, class_section_id, pattern, time_start, time_end, location, created_at
         FROM meetings
         WHERE class_section_id = ?
           AND pattern IS ? AND time_start IS ? AND time_end IS ? AND location IS ?",
    )
    .bind(class_section_id)
    .bind(pattern)
    .bind(time_start)
    .bind(time_end)
    .bind(location)
    .fetch_optional(conn)
    .await
}

pub async fn insert_meeting(
    conn: &mut SqliteConnection,
    class_section_id: i64,
    pattern: Option<&str>,
    time_start: Option<&str>,
    time_end: Option<&str>,
    location: Option<&str>,
) -> Result<Meeting, sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    let result = sqlx::query(
        "INSERT INTO meetings
            (class_section_id, pattern, time_start, time_end, location, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(class_section_id)
    .bind(pattern)
    .bind(time_start)
    .bind(time_end)
    .bind(location)
    .bind(&now)
    .execute(&mut *conn)
    .await?;
    let id = result.last_insert_rowid();

    sqlx::query_as::<_, Meeting>(
        "SELECT id, class_section_id, pattern, time_start, time_end, location, created_at
         FROM meetings WHERE id = ?",
    )
    .bind(id)
    .fetch_one(conn)
    .await
}

const INSTRUCTOR_COLUMNS: &str =
    "id, netid, first_name, middle_name, last_name, normalized_name, created_at, updated_at";

pub async fn find_instructor_by_netid(
    conn: &mut SqliteConnection,
    netid: &str,
) -> Result<Option<Instructor>, sqlx::Error> {
    let sql = format!("SELECT {INSTRUCTOR_COLUMNS} FROM instructors WHERE netid = ?");
    sqlx::query_as::<_, Instructor>(&sql)
        .bind(netid)
        .fetch_optional(conn)
        .await
}

pub async fn find_instructor_by_name(
    conn: &mut SqliteConnection,
    normalized_name: &str,
) -> Result<Option<Instructor>, sqlx::Error> {
    let sql = format!(
        "SELECT {INSTRUCTOR_COLUMNS} FROM instructors
         WHERE netid IS NULL AND normalized_name = ?"
    );
    sqlx::query_as::<_, Instructor>(&sql)
        .bind(normalized_name)
        .fetch_optional(conn)
        .await
}

pub async fn insert_instructor(
    conn: &mut SqliteConnection,
    netid: Option<&str>,
    first_name: Option<&str>,
    middle_name: Option<&str>,
    last_name: Option<&str>,
    normalized_name: &str,
) -> Result<Instructor, sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    let result = sqlx::query(
        "INSERT INTO instructors
            (netid, first_name, middle_name, last_name, normalized_name,
             created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(netid)
    .bind(first_name)
    .bind(middle_name)
    .bind(last_name)
    .bind(normalized_name)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await?;
    let id = result.last_insert_rowid();

    let sql = format!("SELECT {INSTRUCTOR_COLUMNS} FROM instructors WHERE id = ?");
    sqlx::query_as::<_, Instructor>(&sql)
        .bind(id)
        .fetch_one(conn)
        .await
}

/// Append the meeting-instructor link if absent. Returns true when a new
/// link was created.
pub async fn ensure_meeting_instructor(
    conn: &mut SqliteConnection,
    meeting_id: i64,
    instructor_id: i64,
    assign_seq: i64,
) -> Result<bool, sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    let result = sqlx::query(
        "INSERT OR IGNORE INTO meeting_instructors
            (meeting_id, instructor_id, assign_seq, created_at)
         VALUES (?, ?, ?, ?)",
    )
    .bind(meeting_id)
    .bind(instructor_id)
    .bind(assign_seq)
    .bind(&now)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn insert_combined_group(
    conn: &mut SqliteConnection,
    semester: &str,
) -> Result<i64, sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    let result = sqlx::query(
        "INSERT INTO combined_groups (semester, merged_into, created_at, updated_at)
         VALUES (?, NULL, ?, ?)",
    )
    .bind(semester)
    .bind(&now)
    .bind(&now)
    .execute(conn)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn get_combined_group(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<CombinedGroup>, sqlx::Error> {
    sqlx::query_as::<_, CombinedGroup>(
        "SELECT id, semester, merged_into, created_at, updated_at
         FROM combined_groups WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(conn)
    .await
}

/// Permanently redirect a merged-away group to its survivor.
pub async fn mark_group_merged(
    conn: &mut SqliteConnection,
    id: i64,
    survivor: i64,
) -> Result<(), sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    sqlx::query("UPDATE combined_groups SET merged_into = ?, updated_at = ? WHERE id = ?")
        .bind(survivor)
        .bind(&now)
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn insert_import_run(
    conn: &mut SqliteConnection,
    run: &ImportRun,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO import_runs
            (id, semester, subject, started_at, finished_at, outcome, stats)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&run.id)
    .bind(&run.semester)
    .bind(&run.subject)
    .bind(&run.started_at)
    .bind(&run.finished_at)
    .bind(&run.outcome)
    .bind(&run.stats)
    .execute(conn)
    .await?;
    Ok(())
}
