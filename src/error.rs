use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid semester code: {0}")]
    InvalidSemesterCode(String),

    #[error("identity conflict for {key}: {detail}")]
    IdentityConflict { key: String, detail: String },

    #[error("merge failed for {entity}: {source}")]
    MergeFailure {
        entity: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("combined group resolution failed: {source}")]
    GroupResolutionFailure {
        #[source]
        source: sqlx::Error,
    },

    #[error("catalog fetch failed: {0}")]
    Fetch(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Config(String),
}
