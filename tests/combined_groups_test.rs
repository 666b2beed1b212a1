use std::sync::Arc;

use serde_json::json;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

use catalog_sync::catalog::StaticCatalogClient;
use catalog_sync::catalog::dto::RawClass;
use catalog_sync::db::{repository, schema};
use catalog_sync::semester::Semester;
use catalog_sync::services::ImportService;

async fn setup_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create database");
    schema::init_database(&pool)
        .await
        .expect("Failed to create schema");
    pool
}

fn sem(code: &str) -> Semester {
    code.parse().expect("valid semester code")
}

/// A class whose single enroll group carries the given source class number.
/// Cross-listed offerings share that number, so two payloads built with the
/// same `class_nbr` end up with the same cross-listing key.
fn listed_class(subject: &str, number: &str, class_nbr: i64) -> RawClass {
    serde_json::from_value(json!({
        "subject": subject,
        "catalogNbr": number,
        "titleShort": "Probability",
        "titleLong": "Introduction to Probability",
        "enrollGroups": [{
            "unitsMinimum": 4.0,
            "unitsMaximum": 4.0,
            "gradingBasis": "GRD",
            "sessionCode": "1",
            "classSections": [{
                "ssrComponent": "LEC",
                "section": "001",
                "classNbr": class_nbr,
                "openStatus": "O",
                "meetings": []
            }]
        }]
    }))
    .expect("valid class payload")
}

async fn combined_id_for(pool: &SqlitePool, subject: &str) -> Option<i64> {
    sqlx::query_scalar(
        "SELECT eg.combined_group_id FROM enroll_groups eg
         JOIN courses c ON c.id = eg.course_id
         WHERE c.subject = ?",
    )
    .bind(subject)
    .fetch_one(pool)
    .await
    .expect("combined group lookup")
}

/// Follow merged_into redirects, as an external reference holder would.
async fn resolve(pool: &SqlitePool, mut id: i64) -> i64 {
    loop {
        let next: Option<i64> =
            sqlx::query_scalar("SELECT merged_into FROM combined_groups WHERE id = ?")
                .bind(id)
                .fetch_one(pool)
                .await
                .expect("group lookup");
        match next {
            Some(next) => id = next,
            None => return id,
        }
    }
}

#[tokio::test]
async fn cross_listing_converges_for_every_import_order() {
    let orders = [
        ["MATH", "CS", "INFO"],
        ["MATH", "INFO", "CS"],
        ["CS", "MATH", "INFO"],
        ["CS", "INFO", "MATH"],
        ["INFO", "MATH", "CS"],
        ["INFO", "CS", "MATH"],
    ];

    for order in orders {
        let pool = setup_pool().await;
        let client = Arc::new(
            StaticCatalogClient::new()
                .with_classes("SP26", "MATH", vec![listed_class("MATH", "4710", 9001)])
                .with_classes("SP26", "CS", vec![listed_class("CS", "4850", 9001)])
                .with_classes("SP26", "INFO", vec![listed_class("INFO", "4150", 9001)]),
        );
        let service = ImportService::new(pool.clone(), client);

        // Each subject arrives in its own run, resolver included, the way
        // the command surface drives it.
        for subject in order {
            service.import_subject(&sem("SP26"), subject).await.unwrap();
            service.resolve_combined_groups(&sem("SP26")).await.unwrap();
        }

        let math = combined_id_for(&pool, "MATH").await.expect("MATH grouped");
        let cs = combined_id_for(&pool, "CS").await.expect("CS grouped");
        let info = combined_id_for(&pool, "INFO").await.expect("INFO grouped");

        let root = resolve(&pool, math).await;
        assert_eq!(resolve(&pool, cs).await, root, "order {order:?}");
        assert_eq!(resolve(&pool, info).await, root, "order {order:?}");

        let live_roots: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM combined_groups WHERE merged_into IS NULL",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(live_roots, 1, "order {order:?}");
    }
}

#[tokio::test]
async fn resolver_rerun_performs_no_writes() {
    let pool = setup_pool().await;
    let client = Arc::new(
        StaticCatalogClient::new()
            .with_classes("SP26", "MATH", vec![listed_class("MATH", "4710", 9001)])
            .with_classes("SP26", "CS", vec![listed_class("CS", "4850", 9001)]),
    );
    let service = ImportService::new(pool.clone(), client);

    service.import_subject(&sem("SP26"), "MATH").await.unwrap();
    service.import_subject(&sem("SP26"), "CS").await.unwrap();

    let first = service.resolve_combined_groups(&sem("SP26")).await.unwrap();
    assert_eq!(first.groups_created, 1);
    assert_eq!(first.memberships_assigned, 2);

    let before: Vec<(i64, String)> =
        sqlx::query_as("SELECT id, updated_at FROM enroll_groups ORDER BY id")
            .fetch_all(&pool)
            .await
            .unwrap();

    let second = service.resolve_combined_groups(&sem("SP26")).await.unwrap();
    assert!(second.is_noop());

    let after: Vec<(i64, String)> =
        sqlx::query_as("SELECT id, updated_at FROM enroll_groups ORDER BY id")
            .fetch_all(&pool)
            .await
            .unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn retroactive_merge_keeps_redirects_valid() {
    let pool = setup_pool().await;

    // X (MATH) and Y (CS) are cross-listed; Z (INFO) shares a group with Y
    // from an earlier discovery but is not itself in this semester's bucket.
    let client = Arc::new(
        StaticCatalogClient::new()
            .with_classes("SP26", "MATH", vec![listed_class("MATH", "4710", 1000)])
            .with_classes("SP26", "CS", vec![listed_class("CS", "4850", 1000)])
            .with_classes("SP26", "INFO", vec![listed_class("INFO", "4150", 2000)]),
    );
    let service = ImportService::new(pool.clone(), client);

    for subject in ["MATH", "CS", "INFO"] {
        service.import_subject(&sem("SP26"), subject).await.unwrap();
    }

    // Seed the prior state: G1={X}, G2={Y,Z}.
    let x = combined_eg_id(&pool, "MATH").await;
    let y = combined_eg_id(&pool, "CS").await;
    let z = combined_eg_id(&pool, "INFO").await;
    let mut conn = pool.acquire().await.unwrap();
    let g1 = repository::insert_combined_group(&mut conn, "FA25").await.unwrap();
    let g2 = repository::insert_combined_group(&mut conn, "FA25").await.unwrap();
    repository::update_enroll_group_combined(&mut conn, x, g1).await.unwrap();
    repository::update_enroll_group_combined(&mut conn, y, g2).await.unwrap();
    repository::update_enroll_group_combined(&mut conn, z, g2).await.unwrap();
    drop(conn);

    // The new semester reveals X and Y are the same class.
    let stats = service.resolve_combined_groups(&sem("SP26")).await.unwrap();
    assert_eq!(stats.groups_created, 0);
    assert_eq!(stats.groups_merged, 1);

    // One surviving group holds all three members; the absorbed group is a
    // permanent redirect, so old references to either group still resolve.
    let survivor = g1.min(g2);
    let absorbed = g1.max(g2);
    for eg in [x, y, z] {
        let current: Option<i64> =
            sqlx::query_scalar("SELECT combined_group_id FROM enroll_groups WHERE id = ?")
                .bind(eg)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(current, Some(survivor));
    }
    assert_eq!(resolve(&pool, absorbed).await, survivor);
    assert_eq!(resolve(&pool, survivor).await, survivor);

    // A second pass finds nothing left to do.
    let rerun = service.resolve_combined_groups(&sem("SP26")).await.unwrap();
    assert!(rerun.is_noop());
}

#[tokio::test]
async fn redirect_chains_compress_to_the_survivor() {
    let pool = setup_pool().await;
    let client = Arc::new(
        StaticCatalogClient::new()
            .with_classes("SP26", "MATH", vec![listed_class("MATH", "4710", 1000)])
            .with_classes("SP26", "CS", vec![listed_class("CS", "4850", 1000)]),
    );
    let service = ImportService::new(pool.clone(), client);

    service.import_subject(&sem("SP26"), "MATH").await.unwrap();
    service.import_subject(&sem("SP26"), "CS").await.unwrap();

    // Seed a two-hop redirect chain g3 -> g2 -> g1 left over from earlier
    // merges, with one member still holding the stale g3 reference.
    let math_eg = combined_eg_id(&pool, "MATH").await;
    let mut conn = pool.acquire().await.unwrap();
    let g1 = repository::insert_combined_group(&mut conn, "FA25").await.unwrap();
    let g2 = repository::insert_combined_group(&mut conn, "FA25").await.unwrap();
    let g3 = repository::insert_combined_group(&mut conn, "FA25").await.unwrap();
    repository::mark_group_merged(&mut conn, g2, g1).await.unwrap();
    repository::mark_group_merged(&mut conn, g3, g2).await.unwrap();
    repository::update_enroll_group_combined(&mut conn, math_eg, g3).await.unwrap();
    drop(conn);

    service.resolve_combined_groups(&sem("SP26")).await.unwrap();

    // Both members now point directly at the root and the stale chain link
    // has been compressed onto it.
    for subject in ["MATH", "CS"] {
        assert_eq!(combined_id_for(&pool, subject).await, Some(g1));
    }
    let g3_redirect: Option<i64> =
        sqlx::query_scalar("SELECT merged_into FROM combined_groups WHERE id = ?")
            .bind(g3)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(g3_redirect, Some(g1));
}

async fn combined_eg_id(pool: &SqlitePool, subject: &str) -> i64 {
    sqlx::query_scalar(
        "SELECT eg.id FROM enroll_groups eg
         JOIN courses c ON c.id = eg.course_id
         WHERE c.subject = ?",
    )
    .bind(subject)
    .fetch_one(pool)
    .await
    .expect("enroll group lookup")
}
