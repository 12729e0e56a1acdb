//! HTTP content provider
//!
//! Calls `POST {base_url}/v1/content` on the external question service with
//! the test kind and question count, using a reqwest client.

use reqwest::Client;
use serde::Deserialize;

use crate::{ContentBlob, ContentConfig, ContentError, ContentProvider, ContentRequest};

/// Provider error response body
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

pub struct HttpContentProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpContentProvider {
    pub fn new(config: ContentConfig) -> Result<Self, ContentError> {
        let base_url = config.base_url.ok_or_else(|| {
            ContentError::Configuration("CONTENT_API_URL is required for http provider".to_string())
        })?;

        Ok(Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
        })
    }
}

#[async_trait::async_trait]
impl ContentProvider for HttpContentProvider {
    async fn fetch(&self, request: ContentRequest) -> Result<ContentBlob, ContentError> {
        let url = format!("{}/v1/content", self.base_url);

        tracing::debug!(kind = %request.kind, slug = %request.test_type_slug, "Requesting content");

        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ContentError::Request(format!("HTTP request failed: {}", e)))?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ContentError::RateLimit);
        }

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());

            if let Ok(error_response) = serde_json::from_str::<ErrorResponse>(&error_body) {
                return Err(ContentError::Response(format!(
                    "Content provider error ({}): {}",
                    status, error_response.error.message
                )));
            }

            return Err(ContentError::Response(format!(
                "Content provider returned {}: {}",
                status, error_body
            )));
        }

        let blob: ContentBlob = response
            .json()
            .await
            .map_err(|e| ContentError::Response(format!("Failed to parse response: {}", e)))?;

        if request.is_typing() && blob.passage.as_deref().map_or(true, str::is_empty) {
            return Err(ContentError::Response(
                "Typing content is missing a passage".to_string(),
            ));
        }

        Ok(blob)
    }

    fn name(&self) -> &str {
        "http"
    }
}
