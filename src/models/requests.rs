use crate::models::domain::{Benefit, Membership, MembershipId, PageMetadata, SemanticMode};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Lightweight "do I have a benefit on this site" check
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CheckDomainRequest {
    #[validate(length(min = 1, max = 253))]
    pub domain: String,
    #[serde(default)]
    pub benefits: Vec<Benefit>,
    #[serde(default)]
    pub memberships: Vec<Membership>,
}

/// Semantic relevance check for a scraped page
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SemanticCheckRequest {
    #[validate(nested)]
    pub page: PageMetadata,
    #[serde(default)]
    pub benefits: Vec<Benefit>,
    #[serde(default)]
    pub memberships: Vec<Membership>,
    #[serde(default)]
    pub mode: SemanticMode,
}

/// Link a bank-statement line to the membership catalog
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubscriptionMatchRequest {
    #[validate(length(min = 1, max = 512))]
    #[serde(alias = "merchant")]
    pub description: String,
    #[serde(default)]
    pub catalog: Vec<Membership>,
    #[serde(default, alias = "ownedMembershipIds")]
    pub owned_membership_ids: Vec<MembershipId>,
}

/// Validate a batch produced by the generation step
///
/// `candidates` is passed through as raw JSON so malformed entries can be
/// dropped individually.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ValidateRecommendationsRequest {
    pub candidates: serde_json::Value,
    #[serde(default)]
    pub benefits: Vec<Benefit>,
    #[serde(default)]
    pub memberships: Vec<Membership>,
    #[validate(length(max = 1000))]
    #[serde(default, alias = "userMembershipIds")]
    pub user_membership_ids: Vec<MembershipId>,
}
