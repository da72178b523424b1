//! Google Classroom course listing.

use crate::config::ClassroomConfig;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A Classroom course as returned to the UI.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_heading: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate_link: Option<String>,
}

/// Downstream course listing, authorized by an access token.
#[async_trait]
pub trait CourseDirectory: Send + Sync {
    async fn list_courses(&self, access_token: &str) -> Result<Vec<Course>>;
}

/// `courses.list` response page
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct CoursePage {
    #[serde(default)]
    courses: Vec<Course>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Google API error envelope
#[derive(Deserialize, Debug)]
struct ApiErrorEnvelope {
    error: ApiError,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Classroom REST client (`v1/courses`).
pub struct ClassroomClient {
    http: reqwest::Client,
    api_base_url: String,
    page_size: u32,
    max_pages: u32,
}

impl ClassroomClient {
    pub fn new(http: reqwest::Client, config: &ClassroomConfig) -> Self {
        Self {
            http,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            page_size: config.page_size.max(1),
            max_pages: config.max_pages.max(1),
        }
    }

    async fn fetch_page(&self, access_token: &str, page_token: Option<&str>) -> Result<CoursePage> {
        let mut request = self
            .http
            .get(format!("{}/v1/courses", self.api_base_url))
            .bearer_auth(access_token)
            .query(&[("pageSize", self.page_size.to_string())]);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let response = request
            .send()
            .await
            .context("Failed to send Classroom request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<ApiErrorEnvelope>(&body) {
                Ok(envelope) => anyhow!(
                    "Classroom API returned {}{}: {}",
                    status.as_u16(),
                    envelope
                        .error
                        .status
                        .map(|s| format!(" {}", s))
                        .unwrap_or_default(),
                    envelope.error.message
                ),
                Err(_) => anyhow!("Classroom API returned status {}", status),
            });
        }

        response
            .json()
            .await
            .context("Failed to parse Classroom response")
    }
}

#[async_trait]
impl CourseDirectory for ClassroomClient {
    async fn list_courses(&self, access_token: &str) -> Result<Vec<Course>> {
        let mut courses = Vec::new();
        let mut page_token: Option<String> = None;

        for page in 0..self.max_pages {
            let result = self.fetch_page(access_token, page_token.as_deref()).await?;
            courses.extend(result.courses);

            match result.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => {
                    tracing::debug!(pages = page + 1, count = courses.len(), "Listed Classroom courses");
                    return Ok(courses);
                }
            }
        }

        tracing::warn!(
            max_pages = self.max_pages,
            count = courses.len(),
            "Classroom listing truncated at page limit"
        );
        Ok(courses)
    }
}
