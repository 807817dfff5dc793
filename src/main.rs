use actix_cors::Cors;
use actix_web::{error, http::StatusCode, middleware, web, App, HttpResponse, HttpServer};
use benefit_match::config::Settings;
use benefit_match::core::{MatchAggregator, SemanticMatcher, TierModel};
use benefit_match::routes::{self, matches::AppState};
use benefit_match::services::{EmbeddingCache, EmbeddingProvider, MatchResultCache, OpenAiEmbeddingClient};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// JSON error response for JSON payload errors
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self)
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    }
    .into()
}

fn init_tracing(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}

fn build_tiers(path: Option<&str>) -> std::io::Result<TierModel> {
    match path {
        Some(path) => TierModel::load_file(path).map_err(|e| {
            error!("Failed to load tier table {}: {}", path, e);
            std::io::Error::new(std::io::ErrorKind::InvalidData, e)
        }),
        None => Ok(TierModel::new()),
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = Settings::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e)
    })?;

    init_tracing(&settings.logging.level, &settings.logging.format);
    info!("Starting benefit matching service...");

    let tiers = Arc::new(build_tiers(settings.matching.tiers_file.as_deref())?);

    let provider: Option<Arc<dyn EmbeddingProvider>> = match settings.embedding.api_key() {
        Some(key) => match OpenAiEmbeddingClient::new(
            settings.embedding.endpoint.clone(),
            key,
            settings.embedding.model.clone(),
            settings.embedding.timeout(),
        ) {
            Ok(client) => {
                info!(
                    "Embedding provider initialized (model: {}, endpoint: {})",
                    client.model(),
                    client.endpoint()
                );
                let client: Arc<dyn EmbeddingProvider> = Arc::new(client);
                Some(client)
            }
            Err(e) => {
                error!("Failed to initialize embedding provider: {}", e);
                None
            }
        },
        None => {
            warn!("No embedding API key configured, semantic matching disabled");
            None
        }
    };

    let embeddings = Arc::new(EmbeddingCache::new(
        settings.cache.embedding_max_entries,
        Duration::from_secs(settings.cache.embedding_ttl_secs),
    ));
    let results = Arc::new(MatchResultCache::new(
        settings.cache.match_max_entries,
        Duration::from_secs(settings.cache.match_ttl_secs),
    ));
    info!(
        "Caches initialized (embeddings: {} entries / {}s, matches: {} entries / {}s)",
        settings.cache.embedding_max_entries,
        settings.cache.embedding_ttl_secs,
        settings.cache.match_max_entries,
        settings.cache.match_ttl_secs
    );

    let thresholds = settings.matching.thresholds();
    info!("Matching thresholds: {:?}", thresholds);

    let semantic = SemanticMatcher::new(provider, embeddings, results);
    let app_state = AppState {
        aggregator: Arc::new(MatchAggregator::new(semantic, tiers, thresholds)),
    };

    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
