use std::collections::HashMap;

use sqlx::SqliteConnection;
use tracing::warn;

use crate::catalog::dto::{RawClass, RawClassSection, RawEnrollGroup, RawInstructor, RawMeeting};
use crate::db::repository;
use crate::error::AppError;
use crate::models::enroll_group::{EnrollGroupSnapshot, NewEnrollGroup};
use crate::models::instructor::normalize_name;
use crate::models::{Course, OpenStatus};
use crate::semester::Semester;

/// How the recency gate classifies an incoming import against an entity's
/// recorded last-offered semester.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Incoming semester is newer than or equal to the recorded one, or
    /// nothing is recorded yet: snapshot fields may be overwritten and the
    /// recorded semester advances. Equal counts as Current so re-running an
    /// import for the same semester refreshes open statuses.
    Current,
    /// Incoming semester is strictly older: append-only fields only, the
    /// recorded semester stays put.
    Historical,
}

/// Recorded values were written from validated codes; an unparsable value is
/// treated as absent so the next import can repair it.
pub fn classify(recorded: Option<&str>, incoming: &Semester) -> Disposition {
    match recorded.and_then(|code| code.parse::<Semester>().ok()) {
        Some(recorded) if incoming.is_older_than(&recorded) => Disposition::Historical,
        _ => Disposition::Current,
    }
}

/// Enroll-group natural keys already claimed in the current import batch,
/// mapped to the identity fingerprint of the record that claimed them.
pub type SeenGroups = HashMap<(i64, String, String), String>;

/// What one record's merge did, aggregated into ImportStats by the caller.
#[derive(Debug, Default)]
pub struct RecordOutcome {
    pub course_created: bool,
    pub course_updated: bool,
    pub course_historical: bool,
    pub groups_created: usize,
    pub groups_matched: usize,
    pub groups_skipped: usize,
    pub identity_conflicts: usize,
    pub sections_created: usize,
    pub sections_updated: usize,
    pub meetings_added: usize,
    pub instructors_linked: usize,
}

/// Merge one raw offering record: resolve identities, apply the recency
/// gate, then the per-field policy. The caller supplies the transactional
/// scope; everything here is a single unit of work.
pub async fn merge_class(
    conn: &mut SqliteConnection,
    raw: &RawClass,
    semester: &Semester,
    seen: &mut SeenGroups,
) -> Result<RecordOutcome, AppError> {
    let mut outcome = RecordOutcome::default();

    // Subjects are created lazily on first reference; the subject listing in
    // main fills in display names for codes it sees first.
    repository::ensure_subject(conn, &raw.subject, &raw.subject).await?;

    let (course, _) = resolve_course(conn, raw, semester, &mut outcome).await?;

    for raw_group in &raw.enroll_groups {
        merge_enroll_group(conn, &course, raw_group, semester, seen, &mut outcome).await?;
    }

    Ok(outcome)
}

async fn resolve_course(
    conn: &mut SqliteConnection,
    raw: &RawClass,
    semester: &Semester,
    outcome: &mut RecordOutcome,
) -> Result<(Course, Disposition), AppError> {
    match repository::find_course_by_key(conn, &raw.subject, &raw.catalog_nbr).await? {
        None => {
            let course = repository::insert_course(
                conn,
                &raw.subject,
                &raw.catalog_nbr,
                raw.title(),
                &raw.description,
                &semester.code(),
                semester.year(),
            )
            .await?;
            outcome.course_created = true;
            Ok((course, Disposition::Current))
        }
        Some(course) => {
            let disposition = classify(course.last_offered_semester.as_deref(), semester);
            match disposition {
                Disposition::Current => {
                    if course.title != raw.title() || course.description != raw.description {
                        repository::update_course_snapshot(
                            conn,
                            course.id,
                            raw.title(),
                            &raw.description,
                        )
                        .await?;
                        outcome.course_updated = true;
                    }
                    if course.last_offered_semester.as_deref() != Some(semester.code().as_str()) {
                        repository::advance_course_last_offered(
                            conn,
                            course.id,
                            &semester.code(),
                            semester.year(),
                        )
                        .await?;
                    }
                }
                Disposition::Historical => {
                    outcome.course_historical = true;
                }
            }
            Ok((course, disposition))
        }
    }
}

async fn merge_enroll_group(
    conn: &mut SqliteConnection,
    course: &Course,
    raw_group: &RawEnrollGroup,
    semester: &Semester,
    seen: &mut SeenGroups,
    outcome: &mut RecordOutcome,
) -> Result<(), AppError> {
    let Some(group_id) = raw_group.source_group_id() else {
        warn!(
            "Skipping enroll group without sections for {}{}",
            course.subject, course.course_number
        );
        outcome.groups_skipped += 1;
        return Ok(());
    };

    let fingerprint = raw_group.identity_fingerprint();
    let key = (course.id, semester.code(), group_id.to_string());
    if let Some(previous) = seen.get(&key) {
        if previous != &fingerprint {
            let conflict = AppError::IdentityConflict {
                key: format!(
                    "{}{} {} group {}",
                    course.subject,
                    course.course_number,
                    semester.code(),
                    group_id
                ),
                detail: format!("sections {previous} vs {fingerprint}"),
            };
            warn!("Skipping record: {}", conflict);
            outcome.identity_conflicts += 1;
            return Ok(());
        }
        // Exact duplicate within the batch: fall through, the merge below is
        // idempotent.
    } else {
        seen.insert(key, fingerprint);
    }

    let desired = EnrollGroupSnapshot {
        topic: raw_group.topic(),
        cross_list_key: raw_group.cross_list_key(),
        units_minimum: raw_group.units_minimum,
        units_maximum: raw_group.units_maximum,
        grading_basis: raw_group.grading_basis.clone(),
        session_code: raw_group.session_code.clone(),
        open_status: raw_group.open_status(),
    };

    let existing =
        repository::find_enroll_group_by_key(conn, course.id, &semester.code(), group_id).await?;

    let (group, disposition) = match existing {
        None => {
            let group = repository::insert_enroll_group(
                conn,
                &NewEnrollGroup {
                    course_id: course.id,
                    semester: semester.code(),
                    source_group_id: group_id.to_string(),
                    snapshot: desired,
                },
            )
            .await?;
            outcome.groups_created += 1;
            (group, Disposition::Current)
        }
        Some(group) => {
            let disposition = classify(Some(group.last_offered_semester.as_str()), semester);
            if disposition == Disposition::Current {
                if group.snapshot() != desired {
                    repository::update_enroll_group_snapshot(conn, group.id, &desired).await?;
                }
                if group.last_offered_semester != semester.code() {
                    repository::update_enroll_group_last_offered(conn, group.id, &semester.code())
                        .await?;
                }
            }
            outcome.groups_matched += 1;
            (group, disposition)
        }
    };

    for raw_section in &raw_group.class_sections {
        merge_section(conn, group.id, raw_section, disposition, outcome).await?;
    }

    Ok(())
}

async fn merge_section(
    conn: &mut SqliteConnection,
    enroll_group_id: i64,
    raw: &RawClassSection,
    disposition: Disposition,
    outcome: &mut RecordOutcome,
) -> Result<(), AppError> {
    if raw.section.is_empty() {
        warn!("Skipping section without a number in group {enroll_group_id}");
        return Ok(());
    }

    let status = OpenStatus::from_source_code(raw.open_status.as_deref());
    let section = match repository::find_section_by_key(
        conn,
        enroll_group_id,
        &raw.ssr_component,
        &raw.section,
    )
    .await?
    {
        None => {
            let section = repository::insert_section(
                conn,
                enroll_group_id,
                &raw.ssr_component,
                &raw.section,
                raw.class_nbr,
                status,
            )
            .await?;
            outcome.sections_created += 1;
            section
        }
        Some(section) => {
            if disposition == Disposition::Current
                && (section.open_status != status || section.class_nbr != raw.class_nbr)
            {
                repository::update_section_snapshot(conn, section.id, raw.class_nbr, status)
                    .await?;
                outcome.sections_updated += 1;
            }
            section
        }
    };

    // Meetings and instructor links are append-only under both dispositions:
    // a historical backfill may add schedule history it alone knows about.
    for raw_meeting in &raw.meetings {
        merge_meeting(conn, section.id, raw_meeting, outcome).await?;
    }

    Ok(())
}

async fn merge_meeting(
    conn: &mut SqliteConnection,
    class_section_id: i64,
    raw: &RawMeeting,
    outcome: &mut RecordOutcome,
) -> Result<(), AppError> {
    let pattern = non_empty(raw.pattern.as_deref());
    let time_start = non_empty(raw.time_start.as_deref());
    let time_end = non_empty(raw.time_end.as_deref());
    let location = non_empty(raw.facility_descr.as_deref());

    let meeting = match repository::find_meeting(
        conn,
        class_section_id,
        pattern,
        time_start,
        time_end,
        location,
    )
    .await?
    {
        Some(meeting) => meeting,
        None => {
            let meeting = repository::insert_meeting(
                conn,
                class_section_id,
                pattern,
                time_start,
                time_end,
                location,
            )
            .await?;
            outcome.meetings_added += 1;
            meeting
        }
    };

    for raw_instructor in &raw.instructors {
        link_instructor(conn, meeting.id, raw_instructor, outcome).await?;
    }

    Ok(())
}

async fn link_instructor(
    conn: &mut SqliteConnection,
    meeting_id: i64,
    raw: &RawInstructor,
    outcome: &mut RecordOutcome,
) -> Result<(), AppError> {
    let netid = non_empty(raw.netid.as_deref());
    let normalized = normalize_name(
        raw.first_name.as_deref(),
        raw.middle_name.as_deref(),
        raw.last_name.as_deref(),
    );

    let existing = match netid {
        Some(netid) => repository::find_instructor_by_netid(conn, netid).await?,
        None => {
            if normalized.is_empty() {
                warn!("Skipping instructor with no netid and no name on meeting {meeting_id}");
                return Ok(());
            }
            repository::find_instructor_by_name(conn, &normalized).await?
        }
    };

    let instructor = match existing {
        Some(instructor) => instructor,
        None => {
            repository::insert_instructor(
                conn,
                netid,
                raw.first_name.as_deref(),
                raw.middle_name.as_deref(),
                raw.last_name.as_deref(),
                &normalized,
            )
            .await?
        }
    };

    let assign_seq = raw.instr_assign_seq.unwrap_or(1);
    if repository::ensure_meeting_instructor(conn, meeting_id, instructor.id, assign_seq).await? {
        outcome.instructors_linked += 1;
    }

    Ok(())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sem(code: &str) -> Semester {
        code.parse().unwrap()
    }

    #[test]
    fn nothing_recorded_is_current() {
        assert_eq!(classify(None, &sem("SP26")), Disposition::Current);
    }

    #[test]
    fn newer_import_is_current() {
        assert_eq!(classify(Some("FA25"), &sem("SP26")), Disposition::Current);
        assert_eq!(classify(Some("FA25"), &sem("WI26")), Disposition::Current);
    }

    #[test]
    fn same_semester_is_current() {
        assert_eq!(classify(Some("SP26"), &sem("SP26")), Disposition::Current);
    }

    #[test]
    fn older_import_is_historical() {
        assert_eq!(classify(Some("SP26"), &sem("FA25")), Disposition::Historical);
        assert_eq!(classify(Some("FA26"), &sem("SU26")), Disposition::Historical);
    }

    #[test]
    fn unparsable_recorded_value_is_treated_as_absent() {
        assert_eq!(classify(Some("bogus"), &sem("FA25")), Disposition::Current);
    }
}
