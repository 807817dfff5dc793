use crate::core::{MatchAggregator, MatchError, ValidationContext};
use crate::models::{
    BenefitMatchView, CheckDomainRequest, CheckResponse, ErrorResponse, HealthResponse, MatchCandidate,
    SemanticCheckRequest, SemanticCheckResponse, SubscriptionMatchRequest, SubscriptionMatchResponse, UserHoldings,
    ValidateRecommendationsRequest, ValidateRecommendationsResponse,
};
use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;
use validator::Validate;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<MatchAggregator>,
}

/// Configure all matching routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/benefits/check", web::post().to(check_domain))
        .route("/benefits/semantic-check", web::post().to(semantic_check))
        .route("/subscriptions/match", web::post().to(match_subscription))
        .route("/recommendations/validate", web::post().to(validate_recommendations));
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let embedding_provider = state.aggregator.semantic_available();
    let status = if embedding_provider { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
        embedding_provider,
        cache: state.aggregator.stats(),
    })
}

fn bad_request(errors: validator::ValidationErrors) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponse {
        error: "Validation failed".to_string(),
        message: errors.to_string(),
        status_code: 400,
    })
}

fn match_error(err: MatchError) -> HttpResponse {
    match &err {
        MatchError::ProviderUnavailable(_) => {
            tracing::warn!("Semantic matching unavailable: {}", err);
            HttpResponse::ServiceUnavailable().json(ErrorResponse {
                error: "provider_unavailable".to_string(),
                message: err.to_string(),
                status_code: 503,
            })
        }
        MatchError::Embedding(_) => {
            tracing::error!("Semantic matching failed: {}", err);
            HttpResponse::BadGateway().json(ErrorResponse {
                error: "embedding_failed".to_string(),
                message: err.to_string(),
                status_code: 502,
            })
        }
    }
}

fn views(matches: &[MatchCandidate], holdings: &UserHoldings) -> Vec<BenefitMatchView> {
    matches
        .iter()
        .filter_map(|m| BenefitMatchView::build(m, &holdings.benefits, &holdings.memberships))
        .collect()
}

/// Exact domain check
///
/// POST /api/v1/benefits/check
///
/// ```json
/// { "domain": "www.rac.co.uk", "benefits": [...], "memberships": [...] }
/// ```
async fn check_domain(state: web::Data<AppState>, req: web::Json<CheckDomainRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        return bad_request(errors);
    }

    let req = req.into_inner();
    let holdings = UserHoldings::new(req.memberships, req.benefits);
    let matches = state.aggregator.check_domain(&req.domain, &holdings);

    HttpResponse::Ok().json(CheckResponse {
        domain: req.domain,
        has_benefits: !matches.is_empty(),
        matches: views(&matches, &holdings),
    })
}

/// Semantic page check
///
/// POST /api/v1/benefits/semantic-check
///
/// ```json
/// { "page": { "domain": "rac.co.uk", "title": "..." }, "mode": "page_check", "benefits": [...], "memberships": [...] }
/// ```
async fn semantic_check(state: web::Data<AppState>, req: web::Json<SemanticCheckRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        return bad_request(errors);
    }

    let req = req.into_inner();
    let holdings = UserHoldings::new(req.memberships, req.benefits);

    match state.aggregator.semantic_check(&req.page, &holdings, req.mode).await {
        Ok(matches) => HttpResponse::Ok().json(SemanticCheckResponse {
            mode: req.mode,
            threshold: state.aggregator.thresholds().similarity_for(req.mode),
            matches: views(&matches, &holdings),
        }),
        Err(e) => match_error(e),
    }
}

/// Bank-statement line to catalog membership
///
/// POST /api/v1/subscriptions/match
async fn match_subscription(state: web::Data<AppState>, req: web::Json<SubscriptionMatchRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        return bad_request(errors);
    }

    let link = state
        .aggregator
        .link_subscription(&req.description, &req.catalog, &req.owned_membership_ids);

    HttpResponse::Ok().json(SubscriptionMatchResponse { link })
}

/// Validate generated recommendations
///
/// POST /api/v1/recommendations/validate
async fn validate_recommendations(
    state: web::Data<AppState>,
    req: web::Json<ValidateRecommendationsRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return bad_request(errors);
    }

    let req = req.into_inner();
    let ctx = ValidationContext::new(req.benefits, req.memberships, req.user_membership_ids);
    let outcome = state.aggregator.validate_batch(&req.candidates, &ctx);

    HttpResponse::Ok().json(ValidateRecommendationsResponse {
        dropped: outcome.rejected.len(),
        recommendations: outcome.accepted,
    })
}
