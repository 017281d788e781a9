//src/catalog.rs
//! Client for a wger-compatible exercise catalog. Only used to seed and
//! autocomplete the local exercise list.
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::CatalogConfig;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Catalog request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Catalog returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Failed to decode catalog response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Invalid catalog base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

/// One page of a paginated listing.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct CatalogExercise {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: u32,
    #[serde(default)]
    pub muscles: Vec<u32>,
    #[serde(default)]
    pub muscles_secondary: Vec<u32>,
    #[serde(default)]
    pub equipment: Vec<u32>,
    #[serde(default)]
    pub exercise_base: Option<i64>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct CatalogImage {
    pub id: i64,
    #[serde(alias = "exercise_base")]
    pub exercise: i64,
    pub image: String,
    #[serde(default)]
    pub is_main: bool,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct CatalogMuscle {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub name_en: String,
}

impl CatalogMuscle {
    /// English display name, falling back to the Latin one.
    pub fn display_name(&self) -> &str {
        if self.name_en.trim().is_empty() {
            &self.name
        } else {
            &self.name_en
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct CatalogCategory {
    pub id: u32,
    pub name: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub value: String,
    pub data: SuggestionData,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct SuggestionData {
    pub id: i64,
    #[serde(default)]
    pub base_id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub image_thumbnail: Option<String>,
}

#[derive(Deserialize, Debug)]
struct SearchResponse {
    suggestions: Vec<Suggestion>,
}

/// Filters for the exercise listing. `limit`/`offset` default to the
/// configured page size and zero.
#[derive(Debug, Clone, Default)]
pub struct ExerciseQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub name: Option<String>,
    pub muscle: Option<u32>,
    pub category: Option<u32>,
}

pub struct CatalogClient {
    http_client: Client,
    base_url: Url,
    language: u32,
    page_size: u32,
    max_pages: u32,
}

impl CatalogClient {
    pub fn new(config: &CatalogConfig) -> Result<Self, Error> {
        // Url::join drops the last segment unless the base ends in '/'.
        let raw = format!("{}/", config.base_url.trim_end_matches('/'));
        let base_url = Url::parse(&raw).map_err(|e| Error::InvalidBaseUrl {
            url: config.base_url.clone(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(Error::InvalidBaseUrl {
                url: config.base_url.clone(),
                reason: "not a base URL".to_string(),
            });
        }
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http_client,
            base_url,
            language: config.language,
            page_size: config.page_size,
            max_pages: config.max_pages,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, Error> {
        self.base_url.join(path).map_err(|e| Error::InvalidBaseUrl {
            url: self.base_url.to_string(),
            reason: e.to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!(%url, "Catalog GET");
        let response = self.http_client.get(url.clone()).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error body".to_string());
            error!(%url, %status, "Catalog request failed");
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn list_exercises(&self, query: &ExerciseQuery) -> Result<Page<CatalogExercise>, Error> {
        let mut url = self.endpoint("exercise/")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("language", &self.language.to_string());
            pairs.append_pair("limit", &query.limit.unwrap_or(self.page_size).to_string());
            pairs.append_pair("offset", &query.offset.unwrap_or(0).to_string());
            if let Some(name) = &query.name {
                pairs.append_pair("name", name);
            }
            if let Some(muscle) = query.muscle {
                pairs.append_pair("muscles", &muscle.to_string());
            }
            if let Some(category) = query.category {
                pairs.append_pair("category", &category.to_string());
            }
        }
        self.get_json(url).await
    }

    pub async fn list_exercise_images(
        &self,
        exercise_id: Option<i64>,
        limit: u32,
        offset: u32,
    ) -> Result<Page<CatalogImage>, Error> {
        let mut url = self.endpoint("exerciseimage/")?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(id) = exercise_id {
                pairs.append_pair("exercise_base", &id.to_string());
            }
            pairs.append_pair("limit", &limit.to_string());
            pairs.append_pair("offset", &offset.to_string());
        }
        self.get_json(url).await
    }

    /// Free-text name suggestions.
    pub async fn search(&self, term: &str) -> Result<Vec<Suggestion>, Error> {
        let mut url = self.endpoint("exercise/search/")?;
        url.query_pairs_mut()
            .append_pair("term", term)
            .append_pair("language", &self.language.to_string());
        let response: SearchResponse = self.get_json(url).await?;
        Ok(response.suggestions)
    }

    pub async fn list_muscles(&self) -> Result<Page<CatalogMuscle>, Error> {
        let mut url = self.endpoint("muscle/")?;
        url.query_pairs_mut()
            .append_pair("limit", &self.page_size.to_string());
        self.get_json(url).await
    }

    pub async fn list_categories(&self) -> Result<Page<CatalogCategory>, Error> {
        let mut url = self.endpoint("exercisecategory/")?;
        url.query_pairs_mut()
            .append_pair("limit", &self.page_size.to_string());
        self.get_json(url).await
    }

    /// Follows `next` links starting from `query` until the catalog runs out
    /// or `max_pages` pages have been read.
    pub async fn fetch_all_exercises(&self, query: &ExerciseQuery) -> Result<Vec<CatalogExercise>, Error> {
        let mut page = self.list_exercises(query).await?;
        let total = page.count;
        let mut exercises = std::mem::take(&mut page.results);
        let mut pages = 1;

        while let Some(next) = page.next.take() {
            if pages >= self.max_pages {
                warn!(pages, total, fetched = exercises.len(), "Stopped following catalog pages at the configured limit");
                break;
            }
            let url = Url::parse(&next).map_err(|e| Error::InvalidBaseUrl {
                url: next.clone(),
                reason: e.to_string(),
            })?;
            page = self.get_json(url).await?;
            exercises.append(&mut page.results);
            pages += 1;
        }

        info!(pages, fetched = exercises.len(), total, "Fetched catalog exercises");
        Ok(exercises)
    }

    /// Main image per exercise, following image pages like
    /// [`Self::fetch_all_exercises`].
    pub async fn fetch_main_images(&self) -> Result<Vec<CatalogImage>, Error> {
        let mut page = self.list_exercise_images(None, self.page_size, 0).await?;
        let mut images: Vec<CatalogImage> = page.results.drain(..).filter(|i| i.is_main).collect();
        let mut pages = 1;

        while let Some(next) = page.next.take() {
            if pages >= self.max_pages {
                break;
            }
            let url = Url::parse(&next).map_err(|e| Error::InvalidBaseUrl {
                url: next.clone(),
                reason: e.to_string(),
            })?;
            page = self.get_json(url).await?;
            images.extend(page.results.drain(..).filter(|i| i.is_main));
            pages += 1;
        }
        Ok(images)
    }
}
