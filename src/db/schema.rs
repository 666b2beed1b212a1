use sqlx::SqlitePool;

use crate::error::AppError;

/// Create all tables and indexes if they do not exist, and apply the
/// connection pragmas. Safe to call on every startup.
pub async fn init_database(pool: &SqlitePool) -> Result<(), AppError> {
    // WAL allows a reader while an import transaction is writing.
    sqlx::query("PRAGMA journal_mode = WAL").execute(pool).await?;
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(pool).await?;

    create_subjects_table(pool).await?;
    create_combined_groups_table(pool).await?;
    create_courses_table(pool).await?;
    create_enroll_groups_table(pool).await?;
    create_class_sections_table(pool).await?;
    create_meetings_table(pool).await?;
    create_instructors_table(pool).await?;
    create_meeting_instructors_table(pool).await?;
    create_import_runs_table(pool).await?;

    Ok(())
}

/// Drop every table, then recreate the schema. Used by the `--reset` flag.
pub async fn reset_database(pool: &SqlitePool) -> Result<(), AppError> {
    // Children first so foreign keys never dangle mid-reset.
    for table in [
        "meeting_instructors",
        "meetings",
        "class_sections",
        "enroll_groups",
        "combined_groups",
        "courses",
        "subjects",
        "instructors",
        "import_runs",
    ] {
        sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
            .execute(pool)
            .await?;
    }

    init_database(pool).await
}

async fn create_subjects_table(pool: &SqlitePool) -> Result<(), AppError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS subjects (
            code TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_courses_table(pool: &SqlitePool) -> Result<(), AppError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS courses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            subject TEXT NOT NULL REFERENCES subjects(code),
            course_number TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            last_offered_semester TEXT,
            last_offered_year INTEGER,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (subject, course_number)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_courses_last_offered_year
         ON courses(last_offered_year)",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_enroll_groups_table(pool: &SqlitePool) -> Result<(), AppError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS enroll_groups (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            course_id INTEGER NOT NULL REFERENCES courses(id),
            semester TEXT NOT NULL,
            source_group_id TEXT NOT NULL,
            topic TEXT,
            cross_list_key TEXT,
            units_minimum REAL,
            units_maximum REAL,
            grading_basis TEXT,
            session_code TEXT,
            open_status TEXT NOT NULL DEFAULT 'UNKNOWN',
            combined_group_id INTEGER REFERENCES combined_groups(id),
            last_offered_semester TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (course_id, semester, source_group_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_enroll_groups_semester_key
         ON enroll_groups(semester, cross_list_key)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_enroll_groups_combined
         ON enroll_groups(combined_group_id)",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_class_sections_table(pool: &SqlitePool) -> Result<(), AppError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS class_sections (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            enroll_group_id INTEGER NOT NULL REFERENCES enroll_groups(id),
            section_type TEXT NOT NULL,
            section_number TEXT NOT NULL,
            class_nbr INTEGER NOT NULL,
            open_status TEXT NOT NULL DEFAULT 'UNKNOWN',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (enroll_group_id, section_type, section_number)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_meetings_table(pool: &SqlitePool) -> Result<(), AppError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS meetings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            class_section_id INTEGER NOT NULL REFERENCES class_sections(id),
            pattern TEXT,
            time_start TEXT,
            time_end TEXT,
            location TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_meetings_section
         ON meetings(class_section_id)",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_instructors_table(pool: &SqlitePool) -> Result<(), AppError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS instructors (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            netid TEXT UNIQUE,
            first_name TEXT,
            middle_name TEXT,
            last_name TEXT,
            normalized_name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_instructors_normalized
         ON instructors(normalized_name)",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_meeting_instructors_table(pool: &SqlitePool) -> Result<(), AppError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS meeting_instructors (
            meeting_id INTEGER NOT NULL REFERENCES meetings(id),
            instructor_id INTEGER NOT NULL REFERENCES instructors(id),
            assign_seq INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            PRIMARY KEY (meeting_id, instructor_id)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_combined_groups_table(pool: &SqlitePool) -> Result<(), AppError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS combined_groups (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            semester TEXT NOT NULL,
            merged_into INTEGER REFERENCES combined_groups(id),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_import_runs_table(pool: &SqlitePool) -> Result<(), AppError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS import_runs (
            id TEXT PRIMARY KEY,
            semester TEXT NOT NULL,
            subject TEXT NOT NULL,
            started_at TEXT NOT NULL,
            finished_at TEXT NOT NULL,
            outcome TEXT NOT NULL,
            stats TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}
