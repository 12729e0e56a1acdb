//! Skillgate content service
//!
//! Fetches the material a test session is taken against:
//! - typing passages for keyboard and 10-key tests
//! - question blobs for digital literacy, math and English tests
//!
//! The provider is an external collaborator. Content is opaque to this
//! service apart from the typing passage, which scoring compares against.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use skillgate_common::config::Config;
use thiserror::Error;

pub mod http;
pub mod mock;

#[derive(Error, Debug)]
pub enum ContentError {
    #[error("Content configuration error: {0}")]
    Configuration(String),

    #[error("Content request failed: {0}")]
    Request(String),

    #[error("Content provider returned an invalid response: {0}")]
    Response(String),

    #[error("Content provider rate limit exceeded")]
    RateLimit,
}

impl From<ContentError> for skillgate_common::Error {
    fn from(err: ContentError) -> Self {
        match err {
            ContentError::Configuration(msg) => skillgate_common::Error::Internal(msg),
            other => skillgate_common::Error::Upstream(other.to_string()),
        }
    }
}

/// What a session needs from the provider
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentRequest {
    /// Test kind in its wire spelling (`typing_keyboard`, `basic_math`, …)
    pub kind: String,
    pub test_type_slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_count: Option<i32>,
}

impl ContentRequest {
    pub fn is_typing(&self) -> bool {
        self.kind.starts_with("typing_")
    }
}

/// Content handed to a session at start
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentBlob {
    /// Passage the user must type (typing kinds only)
    #[serde(default)]
    pub passage: Option<String>,
    /// Questions for the client to render (question kinds only)
    #[serde(default)]
    pub questions: Option<serde_json::Value>,
}

/// Content provider configuration
#[derive(Debug, Clone)]
pub struct ContentConfig {
    /// Provider name (http, mock)
    pub provider: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

impl From<&Config> for ContentConfig {
    fn from(config: &Config) -> Self {
        Self {
            provider: config.content_provider.clone(),
            base_url: config.content_api_url.clone(),
            api_key: config.content_api_key.clone(),
        }
    }
}

/// External question/passage provider
#[async_trait::async_trait]
pub trait ContentProvider: Send + Sync {
    /// Fetch content for one session
    async fn fetch(&self, request: ContentRequest) -> Result<ContentBlob, ContentError>;

    /// Provider name for logs
    fn name(&self) -> &str;
}

/// Content provider factory
pub struct ContentProviderFactory;

impl ContentProviderFactory {
    /// Create a content provider based on configuration
    pub fn create(config: ContentConfig) -> Result<Arc<dyn ContentProvider>, ContentError> {
        match config.provider.as_str() {
            "http" => {
                tracing::info!("Creating HTTP content provider");
                Ok(Arc::new(http::HttpContentProvider::new(config)?))
            }
            "mock" => {
                tracing::info!("Creating mock content provider");
                Ok(Arc::new(mock::MockContentProvider::new()))
            }
            provider => Err(ContentError::Configuration(format!(
                "Unknown content provider: {}. Supported providers: http, mock",
                provider
            ))),
        }
    }
}
