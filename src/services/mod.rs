// Service exports
pub mod cache;
pub mod embeddings;
pub mod generation;

pub use cache::{
    CacheKey, CacheStats, Clock, Embedding, EmbeddingCache, ManualClock, MatchResultCache, SystemClock, TtlCache,
};
pub use embeddings::{EmbeddingError, EmbeddingProvider, OpenAiEmbeddingClient};
pub use generation::{GenerationError, GenerationInput, RecommendationGenerator};
