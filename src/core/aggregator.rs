use crate::core::domain_match::match_domain;
use crate::core::fuzzy::{clean_statement_descriptor, FuzzyNameMatcher};
use crate::core::semantic::{MatchError, SemanticMatcher};
use crate::core::tiers::TierModel;
use crate::core::validator::{parse_generated_batch, BatchOutcome, RecommendationValidator, ValidationContext};
use crate::models::{
    MatchCandidate, MatchThresholds, Membership, MembershipId, PageMetadata, QueryContext, SemanticMode, UserHoldings,
};
use crate::services::{CacheStats, GenerationError, GenerationInput, RecommendationGenerator};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What the merchant path decided for a statement line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SubscriptionAction {
    /// The user already holds the matched membership
    AlreadyOwned { membership_id: MembershipId },
    /// A catalog membership matched; link it to the user
    LinkExisting { membership_id: MembershipId, score: f64 },
    /// Nothing in the catalog matched; hand the name to discovery
    Discover { name: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionLink {
    pub merchant: String,
    #[serde(flatten)]
    pub action: SubscriptionAction,
}

/// Result of [`MatchAggregator::find_relevant`]
#[derive(Debug, Clone, PartialEq)]
pub enum Relevance {
    Benefits(Vec<MatchCandidate>),
    Subscription(SubscriptionLink),
}

/// Entry point for relevance queries
///
/// Each query context runs exactly one strategy: bare domains go to exact
/// matching, page metadata and search text to semantic ranking, merchant
/// descriptions to fuzzy catalog linking. Generated recommendations are
/// passed through the validator before they leave.
pub struct MatchAggregator {
    semantic: SemanticMatcher,
    fuzzy: FuzzyNameMatcher,
    validator: RecommendationValidator,
    thresholds: MatchThresholds,
}

impl MatchAggregator {
    pub fn new(semantic: SemanticMatcher, tiers: Arc<TierModel>, thresholds: MatchThresholds) -> Self {
        Self {
            semantic,
            fuzzy: FuzzyNameMatcher::new(thresholds.fuzzy_score),
            validator: RecommendationValidator::new(tiers, thresholds.savings_ceiling_minor),
            thresholds,
        }
    }

    pub fn thresholds(&self) -> &MatchThresholds {
        &self.thresholds
    }

    pub fn semantic_available(&self) -> bool {
        self.semantic.is_available()
    }

    pub fn stats(&self) -> CacheStats {
        self.semantic.cache_stats()
    }

    pub async fn find_relevant(
        &self,
        context: &QueryContext,
        holdings: &UserHoldings,
        catalog: &[Membership],
    ) -> Result<Relevance, MatchError> {
        match context {
            QueryContext::Domain { domain } => Ok(Relevance::Benefits(self.check_domain(domain, holdings))),
            QueryContext::Page(page) => self
                .semantic_check(page, holdings, SemanticMode::PageCheck)
                .await
                .map(Relevance::Benefits),
            QueryContext::Search { text } => self.search(text, holdings).await.map(Relevance::Benefits),
            QueryContext::Merchant { description } => {
                let owned: Vec<MembershipId> = holdings.memberships.iter().map(|m| m.id).collect();
                Ok(Relevance::Subscription(self.link_subscription(description, catalog, &owned)))
            }
        }
    }

    /// Exact vendor-domain matches among the user's approved benefits
    pub fn check_domain(&self, domain: &str, holdings: &UserHoldings) -> Vec<MatchCandidate> {
        let matches: Vec<MatchCandidate> = match_domain(holdings.approved_benefits(), domain)
            .into_iter()
            .map(MatchCandidate::exact)
            .collect();

        tracing::info!(domain = %domain, matches = matches.len(), "Domain check");
        matches
    }

    pub async fn semantic_check(
        &self,
        page: &PageMetadata,
        holdings: &UserHoldings,
        mode: SemanticMode,
    ) -> Result<Vec<MatchCandidate>, MatchError> {
        let candidates = holdings.approved_pairs();
        self.semantic
            .rank_page(page, &candidates, self.thresholds.top_k, self.thresholds.similarity_for(mode))
            .await
    }

    pub async fn search(&self, text: &str, holdings: &UserHoldings) -> Result<Vec<MatchCandidate>, MatchError> {
        let candidates = holdings.approved_pairs();
        self.semantic
            .rank(text, &candidates, self.thresholds.top_k, self.thresholds.search_similarity)
            .await
    }

    /// Link a bank-statement line to an active catalog membership
    pub fn link_subscription(
        &self,
        description: &str,
        catalog: &[Membership],
        owned: &[MembershipId],
    ) -> SubscriptionLink {
        let cleaned = clean_statement_descriptor(description);
        let merchant = if cleaned.is_empty() {
            description.trim().to_string()
        } else {
            cleaned
        };

        let eligible: Vec<Membership> = catalog
            .iter()
            .filter(|m| m.is_catalog && m.is_active)
            .cloned()
            .collect();

        let action = match self.fuzzy.best_match(&merchant, &eligible) {
            Some(found) if owned.contains(&found.membership.id) => SubscriptionAction::AlreadyOwned {
                membership_id: found.membership.id,
            },
            Some(found) => SubscriptionAction::LinkExisting {
                membership_id: found.membership.id,
                score: found.score,
            },
            None => SubscriptionAction::Discover { name: merchant.clone() },
        };

        tracing::info!(merchant = %merchant, action = ?action, "Subscription matched");
        SubscriptionLink { merchant, action }
    }

    /// Parse and validate a generated batch against the given context
    pub fn validate_batch(&self, generated: &serde_json::Value, ctx: &ValidationContext) -> BatchOutcome {
        let candidates = parse_generated_batch(generated);
        let outcome = self.validator.filter_batch(candidates, ctx);

        tracing::info!(
            accepted = outcome.accepted.len(),
            rejected = outcome.rejected.len(),
            "Validated recommendation batch"
        );
        outcome
    }

    /// Hand ranked matches to the generation step and keep only valid output
    pub async fn recommend(
        &self,
        generator: &dyn RecommendationGenerator,
        matches: &[MatchCandidate],
        holdings: &UserHoldings,
        catalog: &[Membership],
    ) -> Result<BatchOutcome, GenerationError> {
        if matches.is_empty() {
            return Ok(BatchOutcome::default());
        }

        let generated = generator
            .generate(GenerationInput {
                matches,
                benefits: &holdings.benefits,
                memberships: &holdings.memberships,
            })
            .await?;

        let ctx = ValidationContext::from_holdings(holdings, catalog);
        Ok(self.validate_batch(&generated, &ctx))
    }
}
