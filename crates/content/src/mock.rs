//! Mock content provider
//!
//! Used by `ContentProviderFactory` when provider is `"mock"` and by tests.
//! Returns a deterministic passage or numbered placeholder questions.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;

use crate::{ContentBlob, ContentError, ContentProvider, ContentRequest};

pub const DEFAULT_PASSAGE: &str = "the quick brown fox jumps over the lazy dog";
const DEFAULT_TEN_KEY_PASSAGE: &str = "4719 2038 5561 9074 3182 6640 7295 1836";

#[derive(Debug, Clone, Default)]
pub struct MockContentProvider {
    passage: Option<String>,
    fail: bool,
    calls: Arc<AtomicUsize>,
}

impl MockContentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `passage` for every typing request
    pub fn with_passage(passage: impl Into<String>) -> Self {
        Self {
            passage: Some(passage.into()),
            ..Self::default()
        }
    }

    /// A provider that is always down
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Number of fetches served or refused
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ContentProvider for MockContentProvider {
    async fn fetch(&self, request: ContentRequest) -> Result<ContentBlob, ContentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.fail {
            return Err(ContentError::Request("mock provider unavailable".to_string()));
        }

        tracing::info!(kind = %request.kind, "Mock content provider serving request");

        if request.is_typing() {
            let passage = match &self.passage {
                Some(p) => p.clone(),
                None if request.kind == "typing_ten_key" => DEFAULT_TEN_KEY_PASSAGE.to_string(),
                None => DEFAULT_PASSAGE.to_string(),
            };
            return Ok(ContentBlob {
                passage: Some(passage),
                questions: None,
            });
        }

        let count = request.question_count.unwrap_or(10).max(0);
        let questions: Vec<_> = (1..=count)
            .map(|n| json!({ "number": n, "prompt": format!("{} question {}", request.kind, n) }))
            .collect();

        Ok(ContentBlob {
            passage: None,
            questions: Some(json!(questions)),
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}
