use crate::core::aggregator::SubscriptionLink;
use crate::models::domain::{
    Benefit, BenefitId, MatchCandidate, MatchScore, Membership, MembershipId, RecommendationCandidate, SemanticMode,
};
use crate::services::CacheStats;
use serde::{Deserialize, Serialize};

/// A matched benefit with enough context for the client to render it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenefitMatchView {
    pub benefit_id: BenefitId,
    pub membership_id: MembershipId,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub membership_name: Option<String>,
    pub score: MatchScore,
}

impl BenefitMatchView {
    pub fn build(candidate: &MatchCandidate, benefits: &[Benefit], memberships: &[Membership]) -> Option<Self> {
        let benefit = benefits.iter().find(|b| b.id == candidate.benefit_id)?;
        let membership = memberships.iter().find(|m| m.id == candidate.membership_id);

        Some(Self {
            benefit_id: benefit.id,
            membership_id: benefit.membership_id,
            title: benefit.title.clone(),
            description: benefit.description.clone(),
            category: benefit.category.clone(),
            membership_name: membership.map(|m| m.name.clone()),
            score: candidate.score,
        })
    }
}

/// Response for the domain check endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResponse {
    pub domain: String,
    pub has_benefits: bool,
    pub matches: Vec<BenefitMatchView>,
}

/// Response for the semantic check endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticCheckResponse {
    pub mode: SemanticMode,
    pub threshold: f64,
    pub matches: Vec<BenefitMatchView>,
}

/// Response for the subscription match endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionMatchResponse {
    #[serde(flatten)]
    pub link: SubscriptionLink,
}

/// Response for the recommendation validation endpoint
///
/// Rejections are only counted; reasons stay in the logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateRecommendationsResponse {
    pub recommendations: Vec<RecommendationCandidate>,
    pub dropped: usize,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub embedding_provider: bool,
    pub cache: CacheStats,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}
