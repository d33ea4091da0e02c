//! Research API client.
//!
//! Research runs as a background response: `POST /v1/responses` with
//! `background: true` returns immediately with an id, and
//! `GET /v1/responses/{id}` reports `queued`, `in_progress`, `completed`,
//! `failed`, `incomplete` or `cancelled`.

use std::time::Duration;

use async_trait::async_trait;
use mediaflow_core::JobStatus;
use mediaflow_fetch::{HttpClient, ensure_success};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};
use url::Url;

use super::parser::{parse_status, parse_submission};
use crate::error::ServiceError;
use crate::services::ResearchService;

/// Responses API base URL.
const RESEARCH_API_BASE: &str = "https://api.openai.com";

/// Default research model.
const DEFAULT_MODEL: &str = "o4-mini-deep-research";

// ============================================================================
// Settings
// ============================================================================

/// Endpoint and model selection for the research client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResearchSettings {
    /// API base URL.
    pub base_url: String,
    /// Research model.
    pub model: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ResearchSettings {
    fn default() -> Self {
        Self {
            base_url: RESEARCH_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            request_timeout_secs: 60,
        }
    }
}

// ============================================================================
// Client
// ============================================================================

/// Background research client.
#[derive(Debug, Clone)]
pub struct ResearchClient {
    http: HttpClient,
    api_key: String,
    settings: ResearchSettings,
}

impl ResearchClient {
    /// Creates a client. Requests are restricted to the base URL's host.
    pub fn new(api_key: impl Into<String>, settings: ResearchSettings) -> Result<Self, ServiceError> {
        let host = Url::parse(&settings.base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .ok_or_else(|| {
                ServiceError::InvalidConfig(format!("invalid research base URL: {}", settings.base_url))
            })?;
        let http = HttpClient::with_timeout(Duration::from_secs(settings.request_timeout_secs))?
            .allow_domains([host]);

        Ok(Self {
            http,
            api_key: api_key.into(),
            settings,
        })
    }

    fn base(&self) -> &str {
        self.settings.base_url.trim_end_matches('/')
    }

    fn auth_headers(&self) -> Result<HeaderMap, ServiceError> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|_| ServiceError::InvalidConfig("API key contains invalid characters".into()))?;
        value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }
}

#[async_trait]
impl ResearchService for ResearchClient {
    #[instrument(skip_all, fields(model = %self.settings.model))]
    async fn submit(&self, query: &str) -> Result<String, ServiceError> {
        let url = format!("{}/v1/responses", self.base());
        let body = json!({
            "model": self.settings.model,
            "input": query,
            "background": true,
            "tools": [{ "type": "web_search_preview" }],
        });

        let response = ensure_success(self.http.post_json(&url, self.auth_headers()?, &body).await?).await?;
        let id = parse_submission(&response.text().await?)?;
        info!(job_id = %id, "Research submitted");
        Ok(id)
    }

    #[instrument(skip(self))]
    async fn status(&self, job_id: &str) -> Result<JobStatus, ServiceError> {
        if !is_response_id(job_id) {
            return Err(ServiceError::InvalidResponse(format!("not a job id: {job_id}")));
        }
        let url = format!("{}/v1/responses/{job_id}", self.base());
        let response = ensure_success(self.http.get(&url, self.auth_headers()?).await?).await?;
        parse_status(&response.text().await?)
    }
}

fn is_response_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= 128 && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_id_validation() {
        assert!(is_response_id("resp_68a1b2"));
        assert!(is_response_id("abc"));
        assert!(!is_response_id("../admin"));
        assert!(!is_response_id(""));
    }

    #[test]
    fn test_bearer_header() {
        let client = ResearchClient::new("sk-test", ResearchSettings::default()).unwrap();
        let headers = client.auth_headers().unwrap();
        let value = headers.get(AUTHORIZATION).unwrap();
        assert!(value.is_sensitive());
        assert_eq!(value.to_str().unwrap(), "Bearer sk-test");
    }
}
