// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    Benefit, BenefitId, MatchCandidate, MatchScore, MatchThresholds, Membership, MembershipId, PageMetadata,
    QueryContext, RecommendationCandidate, RecommendationKind, SemanticMode, UserHoldings, ValidationState,
};
pub use requests::{CheckDomainRequest, SemanticCheckRequest, SubscriptionMatchRequest, ValidateRecommendationsRequest};
pub use responses::{
    BenefitMatchView, CheckResponse, ErrorResponse, HealthResponse, SemanticCheckResponse, SubscriptionMatchResponse,
    ValidateRecommendationsResponse,
};
