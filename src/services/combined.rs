use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{debug, info};

use crate::db::repository;
use crate::error::AppError;
use crate::models::EnrollGroup;
use crate::semester::Semester;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CombinedStats {
    pub groups_created: usize,
    pub groups_merged: usize,
    pub memberships_assigned: usize,
}

impl CombinedStats {
    pub fn is_noop(&self) -> bool {
        *self == CombinedStats::default()
    }
}

/// Resolve cross-listed offerings for one semester.
///
/// Runs after every enroll group of the semester is persisted. Buckets the
/// semester's groups by cross-listing key; each bucket with two or more
/// members must end up in exactly one combined group, merging previously
/// distinct groups when a new import reveals they are the same class.
/// Re-running on already-resolved data performs zero row mutations. The
/// caller supplies the transaction; on failure the whole phase is retried
/// from scratch.
pub async fn resolve_semester(
    conn: &mut SqliteConnection,
    semester: &Semester,
) -> Result<CombinedStats, AppError> {
    let groups = repository::list_enroll_groups_for_semester(conn, &semester.code()).await?;

    // BTreeMap so the mutation order is deterministic across runs.
    let mut buckets: BTreeMap<String, Vec<&EnrollGroup>> = BTreeMap::new();
    for group in &groups {
        if let Some(key) = group.cross_list_key.as_deref() {
            buckets.entry(key.to_string()).or_default().push(group);
        }
    }

    let mut stats = CombinedStats::default();

    for (key, members) in buckets {
        if members.len() < 2 {
            continue;
        }

        // Resolve every member's current group through redirects.
        let mut roots: BTreeSet<i64> = BTreeSet::new();
        for member in &members {
            if let Some(group_id) = member.combined_group_id {
                roots.insert(resolve_root(conn, group_id).await?);
            }
        }

        // Deterministic survivor: the lowest surrogate identity.
        let target = match roots.first() {
            Some(&lowest) => lowest,
            None => {
                let id = repository::insert_combined_group(conn, &semester.code()).await?;
                stats.groups_created += 1;
                debug!("Created combined group {id} for key {key}");
                id
            }
        };

        // Union: absorb every other root into the survivor. The bulk update
        // also moves absorbed members from other semesters; absorbed rows
        // become permanent redirects so historical references still resolve.
        let absorbed: BTreeSet<i64> = roots.iter().copied().filter(|&r| r != target).collect();
        for &root in &absorbed {
            let moved = repository::reassign_combined_members(conn, root, target).await?;
            repository::mark_group_merged(conn, root, target).await?;
            stats.groups_merged += 1;
            stats.memberships_assigned += moved as usize;
            info!("Merged combined group {root} into {target} ({moved} memberships moved)");
        }

        // Members not yet in any group join the survivor; members still
        // pointing at a redirect are repointed directly at it.
        for member in &members {
            match member.combined_group_id {
                Some(current) if current == target => {}
                Some(current) if absorbed.contains(&current) => {
                    // Already moved by the bulk update above.
                }
                _ => {
                    repository::update_enroll_group_combined(conn, member.id, target).await?;
                    stats.memberships_assigned += 1;
                }
            }
        }
    }

    Ok(stats)
}

/// Follow `merged_into` redirects to the live root, compressing the chain so
/// every visited redirect ends up pointing directly at the root.
async fn resolve_root(conn: &mut SqliteConnection, id: i64) -> Result<i64, AppError> {
    let mut chain: Vec<(i64, i64)> = Vec::new();
    let mut current = id;

    loop {
        let group = repository::get_combined_group(conn, current)
            .await?
            .ok_or_else(|| AppError::Database(sqlx::Error::RowNotFound))?;
        match group.merged_into {
            Some(next) => {
                chain.push((current, next));
                current = next;
            }
            None => break,
        }
    }

    // Only rewrite redirects that do not already point at the root.
    for (node, next) in chain {
        if next != current {
            repository::mark_group_merged(conn, node, current).await?;
        }
    }

    Ok(current)
}
