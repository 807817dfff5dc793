use crate::models::{Benefit, MatchCandidate, Membership};
use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by the external generation step
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Generation provider unavailable: {0}")]
    Unavailable(String),

    #[error("Generation failed: {0}")]
    Failed(String),
}

/// What the generation step is shown: ranked matches plus the records they point at
#[derive(Debug, Clone, Copy)]
pub struct GenerationInput<'a> {
    pub matches: &'a [MatchCandidate],
    pub benefits: &'a [Benefit],
    pub memberships: &'a [Membership],
}

/// External step that turns ranked matches into structured recommendations
///
/// Returns the raw JSON document; entries are parsed and validated by the engine.
#[async_trait]
pub trait RecommendationGenerator: Send + Sync {
    async fn generate(&self, input: GenerationInput<'_>) -> Result<serde_json::Value, GenerationError>;
}
