use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use catalog_sync::catalog::{CatalogClient, CatalogConfig, HttpCatalogClient};
use catalog_sync::db::{repository, schema};
use catalog_sync::semester::Semester;
use catalog_sync::services::ImportService;

#[derive(Parser, Debug)]
#[command(name = "catalog-sync", about = "Import a course catalog semester into the local store")]
struct Args {
    /// Semester code to import, e.g. SP26
    #[arg(long)]
    semester: String,

    /// Subject codes to import (default: every subject the source lists)
    #[arg(long, num_args = 1..)]
    subjects: Vec<String>,

    /// Drop and recreate all tables before importing
    #[arg(long)]
    reset: bool,

    /// Skip the combined-group resolution phase
    #[arg(long)]
    skip_combined: bool,

    /// Database URL; overrides the DATABASE_URL environment variable
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "catalog_sync=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    // A malformed semester code aborts before anything touches the store.
    let semester: Semester = args.semester.parse()?;

    let database_url = args
        .database_url
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .unwrap_or_else(|| "sqlite://catalog.db?mode=rwc".to_string());

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    if args.reset {
        info!("Resetting database");
        schema::reset_database(&pool).await?;
    } else {
        schema::init_database(&pool).await?;
    }

    let client = Arc::new(HttpCatalogClient::new(CatalogConfig::from_env())?);
    let service = ImportService::new(pool.clone(), client.clone());

    let subjects = if args.subjects.is_empty() {
        bootstrap_subjects(&pool, client.as_ref(), &semester).await?
    } else {
        args.subjects
    };
    info!("Importing {} for {} subjects", semester, subjects.len());

    let mut failed: Vec<String> = Vec::new();
    for subject in &subjects {
        let started_at = Utc::now().to_rfc3339();
        match service.import_subject(&semester, subject).await {
            Ok(stats) => {
                service
                    .record_run(&semester, subject, &started_at, "ok", Some(&stats))
                    .await?;
            }
            Err(err) => {
                error!("Import failed for {subject}: {err}");
                failed.push(subject.clone());
                service
                    .record_run(&semester, subject, &started_at, "failed", None)
                    .await?;
            }
        }
    }

    if !args.skip_combined {
        if let Err(err) = service.resolve_combined_groups(&semester).await {
            error!("Combined group resolution failed: {err}");
            failed.push("combined-groups".to_string());
        }
    }

    if failed.is_empty() {
        info!("Import of {} finished: {} subjects", semester, subjects.len());
        Ok(())
    } else {
        error!(
            "Import of {} finished with {}/{} failures: {}",
            semester,
            failed.len(),
            subjects.len(),
            failed.join(", ")
        );
        std::process::exit(1);
    }
}

/// Fetch the semester's subject listing and insert any subjects not seen
/// before. Returns the subject codes to import.
async fn bootstrap_subjects(
    pool: &sqlx::SqlitePool,
    client: &dyn CatalogClient,
    semester: &Semester,
) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let raw_subjects = client.fetch_subjects(&semester.code()).await?;
    info!("Source lists {} subjects for {}", raw_subjects.len(), semester);

    let mut conn = pool.acquire().await?;
    let mut codes = Vec::with_capacity(raw_subjects.len());
    for raw in &raw_subjects {
        repository::ensure_subject(&mut conn, &raw.value, raw.display_name()).await?;
        codes.push(raw.value.clone());
    }

    Ok(codes)
}
