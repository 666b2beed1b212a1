use std::sync::Arc;

use serde_json::json;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

use catalog_sync::catalog::StaticCatalogClient;
use catalog_sync::catalog::dto::RawClass;
use catalog_sync::db::schema;
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

fn class_payload(
    subject: &str,
    number: &str,
    title: &str,
    class_nbr: i64,
    open_status: &str,
) -> RawClass {
    serde_json::from_value(json!({
        "subject": subject,
        "catalogNbr": number,
        "titleShort": title,
        "titleLong": title,
        "description": format!("{title} in depth."),
        "enrollGroups": [{
            "unitsMinimum": 4.0,
            "unitsMaximum": 4.0,
            "gradingBasis": "GRD",
            "sessionCode": "1",
            "classSections": [{
                "ssrComponent": "LEC",
                "section": "001",
                "classNbr": class_nbr,
                "openStatus": open_status,
                "meetings": [{
                    "pattern": "TR",
                    "timeStart": "09:05AM",
                    "timeEnd": "09:55AM",
                    "facilityDescr": "Baker Hall 200",
                    "instructors": [{
                        "netid": "al226",
                        "firstName": "Ada",
                        "lastName": "Lovelace",
                        "instrAssignSeq": 1
                    }]
                }]
            }]
        }]
    }))
    .expect("valid class payload")
}

async fn count(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .expect("count query")
}

#[tokio::test]
async fn reimport_is_idempotent() {
    let pool = setup_pool().await;
    let client = Arc::new(StaticCatalogClient::new().with_classes(
        "SP26",
        "MATH",
        vec![class_payload("MATH", "1110", "Calculus I", 10001, "O")],
    ));
    let service = ImportService::new(pool.clone(), client);

    let first = service.import_subject(&sem("SP26"), "MATH").await.unwrap();
    assert_eq!(first.courses_created, 1);
    assert_eq!(first.enroll_groups_created, 1);
    assert_eq!(first.sections_created, 1);
    assert_eq!(first.meetings_added, 1);
    assert_eq!(first.instructors_linked, 1);

    let second = service.import_subject(&sem("SP26"), "MATH").await.unwrap();
    assert_eq!(second.courses_created, 0);
    assert_eq!(second.courses_updated, 0);
    assert_eq!(second.enroll_groups_created, 0);
    assert_eq!(second.enroll_groups_matched, 1);
    assert_eq!(second.sections_created, 0);
    assert_eq!(second.sections_updated, 0);
    assert_eq!(second.meetings_added, 0);
    assert_eq!(second.instructors_linked, 0);

    assert_eq!(count(&pool, "courses").await, 1);
    assert_eq!(count(&pool, "enroll_groups").await, 1);
    assert_eq!(count(&pool, "class_sections").await, 1);
    assert_eq!(count(&pool, "meetings").await, 1);
    assert_eq!(count(&pool, "instructors").await, 1);
    assert_eq!(count(&pool, "meeting_instructors").await, 1);

    let title: String = sqlx::query_scalar("SELECT title FROM courses WHERE course_number = '1110'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(title, "Calculus I");
}

#[tokio::test]
async fn historical_import_preserves_current_snapshot() {
    let pool = setup_pool().await;
    let client = Arc::new(
        StaticCatalogClient::new()
            .with_classes(
                "SP26",
                "MATH",
                vec![class_payload("MATH", "1110", "Modern Title", 10001, "O")],
            )
            .with_classes("FA25", "MATH", {
                // Same course a semester earlier, with an older title, a
                // closed section and a different meeting time.
                let mut class = class_payload("MATH", "1110", "Old Title", 20002, "C");
                class.enroll_groups[0].class_sections[0].meetings[0].time_start =
                    Some("10:10AM".to_string());
                vec![class]
            }),
    );
    let service = ImportService::new(pool.clone(), client);

    service.import_subject(&sem("SP26"), "MATH").await.unwrap();
    let backfill = service.import_subject(&sem("FA25"), "MATH").await.unwrap();

    assert_eq!(backfill.courses_created, 0);
    assert_eq!(backfill.courses_updated, 0);
    assert_eq!(backfill.courses_skipped_historical, 1);
    assert_eq!(backfill.enroll_groups_created, 1);

    let (title, last_offered, last_year): (String, String, i64) = sqlx::query_as(
        "SELECT title, last_offered_semester, last_offered_year FROM courses
         WHERE subject = 'MATH' AND course_number = '1110'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(title, "Modern Title");
    assert_eq!(last_offered, "SP26");
    assert_eq!(last_year, 2026);

    // The newer semester's rows are untouched; the backfill landed as its
    // own rows for FA25.
    assert_eq!(count(&pool, "enroll_groups").await, 2);
    let sp26_status: String = sqlx::query_scalar(
        "SELECT open_status FROM enroll_groups WHERE semester = 'SP26'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(sp26_status, "OPEN");

    let fa25_status: String = sqlx::query_scalar(
        "SELECT open_status FROM enroll_groups WHERE semester = 'FA25'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(fa25_status, "CLOSED");

    assert_eq!(count(&pool, "meetings").await, 2);
}

#[tokio::test]
async fn same_semester_reimport_refreshes_open_status() {
    let pool = setup_pool().await;
    let client = Arc::new(StaticCatalogClient::new().with_classes(
        "SP26",
        "MATH",
        vec![class_payload("MATH", "1110", "Calculus I", 10001, "O")],
    ));
    let service = ImportService::new(pool.clone(), client);
    service.import_subject(&sem("SP26"), "MATH").await.unwrap();

    // The section filled up and its meeting moved rooms.
    let mut refreshed = class_payload("MATH", "1110", "Calculus I", 10001, "C");
    refreshed.enroll_groups[0].class_sections[0].meetings[0].facility_descr =
        Some("Malott Hall 251".to_string());
    let client = Arc::new(StaticCatalogClient::new().with_classes("SP26", "MATH", vec![refreshed]));
    let service = ImportService::new(pool.clone(), client);

    let stats = service.import_subject(&sem("SP26"), "MATH").await.unwrap();
    assert_eq!(stats.sections_updated, 1);
    assert_eq!(stats.meetings_added, 1);

    let status: String = sqlx::query_scalar("SELECT open_status FROM class_sections")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(status, "CLOSED");

    // Meetings are an append-only set: the old room assignment stays.
    assert_eq!(count(&pool, "meetings").await, 2);
}

#[tokio::test]
async fn conflicting_identity_is_skipped() {
    let pool = setup_pool().await;

    // Two records in the same batch claim (MATH, SP26, group 001) with
    // different section identities.
    let client = Arc::new(StaticCatalogClient::new().with_classes(
        "SP26",
        "MATH",
        vec![
            class_payload("MATH", "1110", "Calculus I", 10001, "O"),
            class_payload("MATH", "1110", "Calculus I", 99999, "O"),
        ],
    ));
    let service = ImportService::new(pool.clone(), client);

    let stats = service.import_subject(&sem("SP26"), "MATH").await.unwrap();
    assert_eq!(stats.identity_conflicts, 1);
    assert_eq!(stats.enroll_groups_created, 1);

    // The first claim wins; the conflicting record changed nothing.
    assert_eq!(count(&pool, "enroll_groups").await, 1);
    let class_nbr: i64 = sqlx::query_scalar("SELECT class_nbr FROM class_sections")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(class_nbr, 10001);
}

#[tokio::test]
async fn instructors_are_shared_across_courses() {
    let pool = setup_pool().await;

    let mut anonymous = class_payload("MATH", "2210", "Linear Algebra", 10002, "O");
    anonymous.enroll_groups[0].class_sections[0].meetings[0].instructors =
        serde_json::from_value(json!([
            { "firstName": "Grace", "lastName": "Hopper" }
        ]))
        .unwrap();
    let mut anonymous_again = class_payload("MATH", "2930", "Differential Equations", 10003, "O");
    anonymous_again.enroll_groups[0].class_sections[0].meetings[0].instructors =
        serde_json::from_value(json!([
            { "firstName": "grace", "lastName": "hopper" }
        ]))
        .unwrap();

    let client = Arc::new(StaticCatalogClient::new().with_classes(
        "SP26",
        "MATH",
        vec![
            class_payload("MATH", "1110", "Calculus I", 10001, "O"),
            class_payload("MATH", "1120", "Calculus II", 10004, "O"),
            anonymous,
            anonymous_again,
        ],
    ));
    let service = ImportService::new(pool.clone(), client);
    service.import_subject(&sem("SP26"), "MATH").await.unwrap();

    // "al226" appears in two courses but is one row; the netid-less
    // instructor is matched by normalized name across both of hers.
    assert_eq!(count(&pool, "instructors").await, 2);
    assert_eq!(count(&pool, "meeting_instructors").await, 4);

    let netid_less: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM instructors WHERE netid IS NULL AND normalized_name = 'grace hopper'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(netid_less, 1);
}

#[tokio::test]
async fn empty_fetch_imports_nothing() {
    let pool = setup_pool().await;
    let client = Arc::new(StaticCatalogClient::new());
    let service = ImportService::new(pool.clone(), client);

    let stats = service.import_subject(&sem("SP26"), "MATH").await.unwrap();
    assert_eq!(stats.courses_created, 0);
    assert_eq!(count(&pool, "courses").await, 0);
}
