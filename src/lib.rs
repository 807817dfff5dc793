//! Benefit Match - relevance matching and recommendation validation for membership benefits
//!
//! Given a user's approved benefits and a query (a domain, scraped page
//! metadata, search text or a bank-statement line), decides which benefits
//! and memberships are relevant, and gates generated recommendations against
//! deterministic business rules before they reach the user.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use crate::core::{MatchAggregator, MatchError, RecommendationValidator, SemanticMatcher, TierModel};
pub use crate::models::{Benefit, MatchCandidate, MatchThresholds, Membership, QueryContext, RecommendationCandidate};
