// Shared fixtures for unit tests
use crate::models::{Benefit, Membership, ValidationState};
use crate::services::{EmbeddingError, EmbeddingProvider};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

const VOCABULARY: &[&str] = &[
    "breakdown",
    "recovery",
    "roadside",
    "travel",
    "insurance",
    "cinema",
    "tickets",
    "dining",
    "streaming",
    "music",
    "cashback",
    "lounge",
];

/// Deterministic embedder: one dimension per vocabulary word, value is the word count
#[derive(Debug, Default)]
pub struct KeywordEmbedder {
    calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn model(&self) -> &str {
        "keyword-test"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        Ok(VOCABULARY
            .iter()
            .map(|v| words.iter().filter(|w| *w == v).count() as f32)
            .collect())
    }
}

/// Provider that is always down
#[derive(Debug, Default)]
pub struct DownEmbedder;

#[async_trait]
impl EmbeddingProvider for DownEmbedder {
    fn model(&self) -> &str {
        "down"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Timeout)
    }
}

pub fn membership(id: i64, name: &str, provider: &str, plan: &str) -> Membership {
    Membership {
        id,
        name: name.to_string(),
        provider_name: Some(provider.to_string()),
        provider_slug: Some(provider.to_lowercase().replace(' ', "-")),
        plan_name: Some(plan.to_string()),
        plan_tier: None,
        is_catalog: true,
        is_active: true,
    }
}

pub fn approved_benefit(id: i64, membership_id: i64, title: &str, category: Option<&str>) -> Benefit {
    Benefit {
        id,
        membership_id,
        title: title.to_string(),
        description: None,
        category: category.map(str::to_string),
        vendor_domain: None,
        source_url: None,
        validation_state: ValidationState::Approved,
    }
}
