use serde::Deserialize;

use crate::models::OpenStatus;

/// Response envelope used by every endpoint of the catalog API.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    pub data: T,
}

#[derive(Debug, Deserialize)]
pub struct SubjectsData {
    #[serde(default)]
    pub subjects: Vec<RawSubject>,
}

#[derive(Debug, Deserialize)]
pub struct ClassesData {
    #[serde(default)]
    pub classes: Vec<RawClass>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSubject {
    pub value: String,
    #[serde(default)]
    pub descr: String,
    #[serde(default)]
    pub descrformal: String,
}

impl RawSubject {
    /// Display name, preferring the formal description.
    pub fn display_name(&self) -> &str {
        if self.descrformal.is_empty() {
            &self.descr
        } else {
            &self.descrformal
        }
    }
}

/// One raw offering record as returned by the per-subject class search.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawClass {
    pub subject: String,
    #[serde(rename = "catalogNbr")]
    pub catalog_nbr: String,
    #[serde(rename = "titleShort", default)]
    pub title_short: String,
    #[serde(rename = "titleLong", default)]
    pub title_long: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "enrollGroups", default)]
    pub enroll_groups: Vec<RawEnrollGroup>,
}

impl RawClass {
    /// Snapshot title, falling back to the short title when the long form
    /// is absent.
    pub fn title(&self) -> &str {
        if self.title_long.is_empty() {
            &self.title_short
        } else {
            &self.title_long
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEnrollGroup {
    #[serde(rename = "unitsMinimum", default)]
    pub units_minimum: Option<f64>,
    #[serde(rename = "unitsMaximum", default)]
    pub units_maximum: Option<f64>,
    #[serde(rename = "gradingBasis", default)]
    pub grading_basis: Option<String>,
    #[serde(rename = "sessionCode", default)]
    pub session_code: Option<String>,
    #[serde(rename = "classSections", default)]
    pub class_sections: Vec<RawClassSection>,
}

impl RawEnrollGroup {
    /// The source-provided group identifier: the first section's number.
    /// Stable across re-imports of the same semester.
    pub fn source_group_id(&self) -> Option<&str> {
        self.class_sections
            .first()
            .map(|cs| cs.section.as_str())
            .filter(|s| !s.is_empty())
    }

    /// First non-empty section topic, if any.
    pub fn topic(&self) -> Option<String> {
        self.class_sections
            .iter()
            .map(|cs| cs.topic_description.as_deref().unwrap_or("").trim())
            .find(|topic| !topic.is_empty())
            .map(str::to_string)
    }

    /// Cross-listing key: the group topic (empty when none) paired with the
    /// first section's source-global class number. Cross-listed offerings
    /// share their sections' class numbers at the source, so equal keys mean
    /// the same physical class. Groups without sections have no key.
    pub fn cross_list_key(&self) -> Option<String> {
        let first = self.class_sections.first()?;
        Some(format!(
            "{}#{}",
            self.topic().unwrap_or_default(),
            first.class_nbr
        ))
    }

    /// Identity fingerprint used to detect conflicting claims on the same
    /// natural key within one import batch.
    pub fn identity_fingerprint(&self) -> String {
        let mut nbrs: Vec<i64> = self.class_sections.iter().map(|cs| cs.class_nbr).collect();
        nbrs.sort_unstable();
        nbrs.iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Group-level enrollment status: the first section's status.
    pub fn open_status(&self) -> OpenStatus {
        OpenStatus::from_source_code(
            self.class_sections
                .first()
                .and_then(|cs| cs.open_status.as_deref()),
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawClassSection {
    #[serde(rename = "ssrComponent", default)]
    pub ssr_component: String,
    #[serde(default)]
    pub section: String,
    #[serde(rename = "classNbr", default)]
    pub class_nbr: i64,
    #[serde(rename = "openStatus", default)]
    pub open_status: Option<String>,
    #[serde(rename = "topicDescription", default)]
    pub topic_description: Option<String>,
    #[serde(default)]
    pub meetings: Vec<RawMeeting>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMeeting {
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(rename = "timeStart", default)]
    pub time_start: Option<String>,
    #[serde(rename = "timeEnd", default)]
    pub time_end: Option<String>,
    #[serde(rename = "facilityDescr", default)]
    pub facility_descr: Option<String>,
    #[serde(default)]
    pub instructors: Vec<RawInstructor>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawInstructor {
    #[serde(default)]
    pub netid: Option<String>,
    #[serde(rename = "firstName", default)]
    pub first_name: Option<String>,
    #[serde(rename = "middleName", default)]
    pub middle_name: Option<String>,
    #[serde(rename = "lastName", default)]
    pub last_name: Option<String>,
    #[serde(rename = "instrAssignSeq", default)]
    pub instr_assign_seq: Option<i64>,
}
