use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog::CatalogClient;
use crate::catalog::dto::RawClass;
use crate::db::repository;
use crate::error::AppError;
use crate::models::ImportRun;
use crate::semester::Semester;
use crate::services::combined::{self, CombinedStats};
use crate::services::merge::{self, RecordOutcome, SeenGroups};

/// Attempts for one record's transactional merge before it is skipped.
const MERGE_ATTEMPTS: usize = 3;
/// Attempts for the combined-group phase, which is retried whole because it
/// is idempotent.
const RESOLVE_ATTEMPTS: usize = 3;

pub struct ImportService {
    db: SqlitePool,
    catalog: Arc<dyn CatalogClient>,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct ImportStats {
    pub courses_created: usize,
    pub courses_updated: usize,
    pub courses_skipped_historical: usize,
    pub enroll_groups_created: usize,
    pub enroll_groups_matched: usize,
    pub enroll_groups_skipped: usize,
    pub identity_conflicts: usize,
    pub sections_created: usize,
    pub sections_updated: usize,
    pub meetings_added: usize,
    pub instructors_linked: usize,
    pub records_failed: usize,
}

impl ImportStats {
    fn absorb(&mut self, outcome: RecordOutcome) {
        self.courses_created += usize::from(outcome.course_created);
        self.courses_updated += usize::from(outcome.course_updated);
        self.courses_skipped_historical += usize::from(outcome.course_historical);
        self.enroll_groups_created += outcome.groups_created;
        self.enroll_groups_matched += outcome.groups_matched;
        self.enroll_groups_skipped += outcome.groups_skipped;
        self.identity_conflicts += outcome.identity_conflicts;
        self.sections_created += outcome.sections_created;
        self.sections_updated += outcome.sections_updated;
        self.meetings_added += outcome.meetings_added;
        self.instructors_linked += outcome.instructors_linked;
    }
}

impl ImportService {
    pub fn new(db: SqlitePool, catalog: Arc<dyn CatalogClient>) -> Self {
        Self { db, catalog }
    }

    /// Import one subject's offerings for one semester. Each record is
    /// merged in its own transaction; per-record failures are retried, then
    /// skipped and counted, never aborting the rest of the batch.
    pub async fn import_subject(
        &self,
        semester: &Semester,
        subject: &str,
    ) -> Result<ImportStats, AppError> {
        let classes = self.catalog.fetch_classes(&semester.code(), subject).await?;
        info!("Fetched {} classes for {} {}", classes.len(), semester, subject);

        let mut stats = ImportStats::default();
        let mut seen: SeenGroups = HashMap::new();

        for raw in &classes {
            match self.merge_record(raw, semester, &mut seen).await {
                Ok(outcome) => stats.absorb(outcome),
                Err(err @ AppError::MergeFailure { .. }) => {
                    warn!("Skipping record: {err}");
                    stats.records_failed += 1;
                }
                Err(err) => return Err(err),
            }
        }

        info!(
            "Imported {} {}: courses {}+{}~ ({} historical), groups {}+{}~, \
             sections {}+{}~, {} meetings, {} instructor links, \
             {} conflicts, {} failed",
            semester,
            subject,
            stats.courses_created,
            stats.courses_updated,
            stats.courses_skipped_historical,
            stats.enroll_groups_created,
            stats.enroll_groups_matched,
            stats.sections_created,
            stats.sections_updated,
            stats.meetings_added,
            stats.instructors_linked,
            stats.identity_conflicts,
            stats.records_failed,
        );

        Ok(stats)
    }

    async fn merge_record(
        &self,
        raw: &RawClass,
        semester: &Semester,
        seen: &mut SeenGroups,
    ) -> Result<RecordOutcome, AppError> {
        let entity = format!("{}{}", raw.subject, raw.catalog_nbr);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let mut tx = self.db.begin().await?;

            let failure = match merge::merge_class(&mut tx, raw, semester, seen).await {
                Ok(outcome) => match tx.commit().await {
                    Ok(()) => return Ok(outcome),
                    Err(source) => source,
                },
                Err(AppError::Database(source)) => source,
                Err(other) => return Err(other),
            };

            // Dropped transactions roll back, so nothing is half-written.
            if attempt >= MERGE_ATTEMPTS {
                return Err(AppError::MergeFailure {
                    entity,
                    source: failure,
                });
            }
            warn!("Merge attempt {attempt} for {entity} failed, retrying: {failure}");
        }
    }

    /// Run the combined-group phase for the semester. The phase is one
    /// transaction and idempotent, so on failure it is retried from the
    /// start rather than resumed.
    pub async fn resolve_combined_groups(
        &self,
        semester: &Semester,
    ) -> Result<CombinedStats, AppError> {
        let mut attempt = 0;

        loop {
            attempt += 1;
            let mut tx = self.db.begin().await?;

            let failure = match combined::resolve_semester(&mut tx, semester).await {
                Ok(stats) => match tx.commit().await {
                    Ok(()) => {
                        if stats.is_noop() {
                            info!("Combined groups already resolved for {semester}");
                        } else {
                            info!(
                                "Combined groups for {}: {} created, {} merged, {} memberships assigned",
                                semester,
                                stats.groups_created,
                                stats.groups_merged,
                                stats.memberships_assigned,
                            );
                        }
                        return Ok(stats);
                    }
                    Err(source) => source,
                },
                Err(AppError::Database(source)) => source,
                Err(other) => return Err(other),
            };

            if attempt >= RESOLVE_ATTEMPTS {
                return Err(AppError::GroupResolutionFailure { source: failure });
            }
            warn!("Combined group resolution attempt {attempt} failed, retrying: {failure}");
        }
    }

    /// Write the provenance row for a finished (semester, subject) run.
    pub async fn record_run(
        &self,
        semester: &Semester,
        subject: &str,
        started_at: &str,
        outcome: &str,
        stats: Option<&ImportStats>,
    ) -> Result<(), AppError> {
        let run = ImportRun {
            id: Uuid::new_v4().to_string(),
            semester: semester.code(),
            subject: subject.to_string(),
            started_at: started_at.to_string(),
            finished_at: Utc::now().to_rfc3339(),
            outcome: outcome.to_string(),
            stats: stats
                .and_then(|s| serde_json::to_string(s).ok())
                .unwrap_or_else(|| "{}".to_string()),
        };

        let mut conn = self.db.acquire().await?;
        repository::insert_import_run(&mut conn, &run).await?;
        Ok(())
    }
}
