// Core matching exports
pub mod aggregator;
pub mod domain_match;
pub mod fuzzy;
pub mod semantic;
pub mod similarity;
pub mod tiers;
pub mod validator;

pub use aggregator::{MatchAggregator, Relevance, SubscriptionAction, SubscriptionLink};
pub use domain_match::{match_domain, matches_domain, normalize_domain};
pub use fuzzy::{best_match, clean_statement_descriptor, normalize_name, similarity_score, FuzzyMatch, FuzzyNameMatcher};
pub use semantic::{benefit_text, page_text, MatchError, SemanticMatcher};
pub use similarity::cosine_similarity;
pub use tiers::{TierModel, TierTableError, FALLBACK_TIER};
pub use validator::{
    parse_generated_batch, BatchOutcome, Rejection, RejectionReason, RecommendationValidator, ValidationContext,
    MAX_ACCEPTED_RECOMMENDATIONS,
};
