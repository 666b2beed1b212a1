pub mod dto;

use std::collections::HashMap;
use std::env;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::error::AppError;

use dto::{ClassesData, Envelope, RawClass, RawSubject, SubjectsData};

pub const DEFAULT_BASE_URL: &str = "https://classes.cornell.edu/api/2.0";

#[derive(Clone, Debug)]
pub struct CatalogConfig {
    pub base_url: String,
}

impl CatalogConfig {
    pub fn from_env() -> Self {
        let base_url =
            env::var("CATALOG_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self { base_url }
    }
}

/// Boundary to the external catalog source. Implementations return an
/// ordered, finite sequence of raw records per (semester, subject); retry
/// and backoff policy belongs to the implementation, not to callers.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn fetch_subjects(&self, semester: &str) -> Result<Vec<RawSubject>, AppError>;
    async fn fetch_classes(&self, semester: &str, subject: &str)
    -> Result<Vec<RawClass>, AppError>;
}

pub struct HttpCatalogClient {
    client: Client,
    config: CatalogConfig,
}

impl HttpCatalogClient {
    pub fn new(config: CatalogConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::Config(format!("failed to build http client: {e}")))?;
        Ok(Self { client, config })
    }

    async fn get_envelope<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, AppError> {
        let url = format!("{}/{}", self.config.base_url, path);

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| AppError::Fetch(format!("request to {url} failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Fetch(format!(
                "catalog API error {status}: {body}"
            )));
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| AppError::Fetch(format!("failed to parse catalog response: {e}")))?;

        if envelope.status != "success" {
            return Err(AppError::Fetch(format!(
                "catalog API returned {}: {}",
                envelope.status,
                envelope.message.unwrap_or_default()
            )));
        }

        Ok(envelope.data)
    }
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn fetch_subjects(&self, semester: &str) -> Result<Vec<RawSubject>, AppError> {
        let data: SubjectsData = self
            .get_envelope("config/subjects.json", &[("roster", semester)])
            .await?;
        Ok(data.subjects)
    }

    async fn fetch_classes(
        &self,
        semester: &str,
        subject: &str,
    ) -> Result<Vec<RawClass>, AppError> {
        let data: ClassesData = self
            .get_envelope(
                "search/classes.json",
                &[("roster", semester), ("subject", subject)],
            )
            .await?;
        Ok(data.classes)
    }
}

/// Serves canned payloads; used by integration tests to drive imports
/// without a network.
#[derive(Default)]
pub struct StaticCatalogClient {
    subjects: HashMap<String, Vec<RawSubject>>,
    classes: HashMap<(String, String), Vec<RawClass>>,
}

impl StaticCatalogClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subjects(mut self, semester: &str, subjects: Vec<RawSubject>) -> Self {
        self.subjects.insert(semester.to_string(), subjects);
        self
    }

    pub fn with_classes(mut self, semester: &str, subject: &str, classes: Vec<RawClass>) -> Self {
        self.classes
            .insert((semester.to_string(), subject.to_string()), classes);
        self
    }
}

#[async_trait]
impl CatalogClient for StaticCatalogClient {
    async fn fetch_subjects(&self, semester: &str) -> Result<Vec<RawSubject>, AppError> {
        Ok(self.subjects.get(semester).cloned().unwrap_or_default())
    }

    async fn fetch_classes(
        &self,
        semester: &str,
        subject: &str,
    ) -> Result<Vec<RawClass>, AppError> {
        Ok(self
            .classes
            .get(&(semester.to_string(), subject.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}
