use crate::core::similarity::cosine_similarity;
use crate::models::{Benefit, MatchCandidate, MatchScore, Membership, PageMetadata};
use crate::services::{
    CacheKey, CacheStats, Embedding, EmbeddingCache, EmbeddingError, EmbeddingProvider, MatchResultCache,
};
use std::sync::Arc;
use thiserror::Error;

/// Errors from relevance matching
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Embedding provider failed: {0}")]
    Embedding(EmbeddingError),
}

impl From<EmbeddingError> for MatchError {
    fn from(err: EmbeddingError) -> Self {
        if err.is_unavailable() {
            MatchError::ProviderUnavailable(err.to_string())
        } else {
            MatchError::Embedding(err)
        }
    }
}

/// Build the embedding text for a scraped page
pub fn page_text(page: &PageMetadata) -> String {
    let mut parts = Vec::new();

    if !page.domain.trim().is_empty() {
        parts.push(format!("Domain: {}", page.domain.trim()));
    }

    let title = non_empty(&page.title).unwrap_or_default();
    if !title.is_empty() {
        parts.push(format!("Title: {}", title));
    }

    // heading is often a copy of the title
    if let Some(heading) = non_empty(&page.heading) {
        if !heading.eq_ignore_ascii_case(title) {
            parts.push(format!("Heading: {}", heading));
        }
    }
    if let Some(description) = non_empty(&page.description) {
        parts.push(format!("Description: {}", description));
    }
    if let Some(keywords) = non_empty(&page.keywords) {
        parts.push(format!("Keywords: {}", keywords));
    }
    if let Some(snippet) = non_empty(&page.snippet) {
        parts.push(format!("Content: {}", snippet));
    }

    parts.join(" | ")
}

/// Build the embedding text for a benefit and its membership
pub fn benefit_text(benefit: &Benefit, membership: &Membership) -> String {
    let mut parts = vec![format!("Membership: {}", membership.name)];

    if let Some(provider) = non_empty(&membership.provider_name) {
        parts.push(format!("Provider: {}", provider));
    }
    parts.push(format!("Benefit: {}", benefit.title));
    if let Some(description) = non_empty(&benefit.description) {
        parts.push(format!("Description: {}", description));
    }
    if let Some(category) = non_empty(&benefit.category) {
        parts.push(format!("Category: {}", category.replace('_', " ")));
    }
    if let Some(domain) = non_empty(&benefit.vendor_domain) {
        parts.push(format!("Domain: {}", domain));
    }

    parts.join(" | ")
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Ranks benefits against a query by embedding cosine similarity
///
/// Embeddings go through the shared [`EmbeddingCache`]; whole rankings are
/// memoized in a [`MatchResultCache`] keyed by query identity and candidate set.
pub struct SemanticMatcher {
    provider: Option<Arc<dyn EmbeddingProvider>>,
    embeddings: Arc<EmbeddingCache>,
    results: Arc<MatchResultCache>,
}

impl SemanticMatcher {
    pub fn new(
        provider: Option<Arc<dyn EmbeddingProvider>>,
        embeddings: Arc<EmbeddingCache>,
        results: Arc<MatchResultCache>,
    ) -> Self {
        Self {
            provider,
            embeddings,
            results,
        }
    }

    pub fn is_available(&self) -> bool {
        self.provider.is_some()
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            embedding_entries: self.embeddings.len(),
            embedding_hits: self.embeddings.hits(),
            embedding_misses: self.embeddings.misses(),
            match_entries: self.results.len(),
        }
    }

    /// Rank candidates against free query text
    pub async fn rank(
        &self,
        query_text: &str,
        candidates: &[(&Benefit, &Membership)],
        top_k: usize,
        threshold: f64,
    ) -> Result<Vec<MatchCandidate>, MatchError> {
        self.rank_with_identity(query_text, query_text, candidates, top_k, threshold)
            .await
    }

    /// Rank candidates against a scraped page; the page URL identifies the query when present
    pub async fn rank_page(
        &self,
        page: &PageMetadata,
        candidates: &[(&Benefit, &Membership)],
        top_k: usize,
        threshold: f64,
    ) -> Result<Vec<MatchCandidate>, MatchError> {
        let text = page_text(page);
        let identity = page
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(&text);

        let matches = self
            .rank_with_identity(identity, &text, candidates, top_k, threshold)
            .await?;

        tracing::info!(
            domain = %page.domain,
            candidates = candidates.len(),
            matches = matches.len(),
            "Semantic page check"
        );
        Ok(matches)
    }

    async fn rank_with_identity(
        &self,
        identity: &str,
        query_text: &str,
        candidates: &[(&Benefit, &Membership)],
        top_k: usize,
        threshold: f64,
    ) -> Result<Vec<MatchCandidate>, MatchError> {
        if candidates.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let provider = self
            .provider
            .as_ref()
            .ok_or_else(|| MatchError::ProviderUnavailable("no embedding provider configured".into()))?;

        let ids: Vec<_> = candidates.iter().map(|(b, _)| b.id).collect();
        let key = CacheKey::semantic(identity, &ids, top_k, threshold);
        if let Some(cached) = self.results.get(&key) {
            return Ok(cached.as_ref().clone());
        }

        let query = self.embed(provider, query_text).await?;

        let mut scored = Vec::with_capacity(candidates.len());
        for (benefit, membership) in candidates {
            let vector = self.embed(provider, &benefit_text(benefit, membership)).await?;

            // degenerate vectors are excluded, never an error
            let Some(score) = cosine_similarity(&query, &vector) else {
                tracing::debug!(benefit_id = benefit.id, "Skipping degenerate embedding");
                continue;
            };
            scored.push((score, *benefit));
        }

        let matches = select_top(scored, top_k, threshold);
        self.results.insert(key, Arc::new(matches.clone()));
        Ok(matches)
    }

    async fn embed(&self, provider: &Arc<dyn EmbeddingProvider>, text: &str) -> Result<Embedding, EmbeddingError> {
        let provider = Arc::clone(provider);
        self.embeddings
            .get_or_compute(text, |text| async move { provider.embed(&text).await })
            .await
    }
}

/// Keep scores at or above `threshold`, best first, at most `top_k`
///
/// Equal scores keep their input order.
pub fn select_top(scored: Vec<(f64, &Benefit)>, top_k: usize, threshold: f64) -> Vec<MatchCandidate> {
    let mut kept: Vec<(f64, &Benefit)> = scored
        .into_iter()
        .filter(|(score, _)| *score >= threshold)
        .collect();

    kept.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    if let Some((best, benefit)) = kept.first() {
        tracing::debug!(benefit_id = benefit.id, score = best, "Top semantic match");
    }

    kept.into_iter()
        .take(top_k)
        .map(|(score, benefit)| MatchCandidate {
            benefit_id: benefit.id,
            membership_id: benefit.membership_id,
            score: MatchScore::Similarity(score),
        })
        .collect()
}
