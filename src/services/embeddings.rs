use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Default embedding endpoint (any OpenAI-compatible API works)
pub const DEFAULT_EMBEDDING_ENDPOINT: &str = "https://api.openai.com/v1/embeddings";

pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Errors that can occur when calling the embedding provider
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Embedding provider is not configured")]
    Unconfigured,

    #[error("Embedding request timed out")]
    Timeout,

    #[error("HTTP request failed: {0}")]
    RequestError(reqwest::Error),

    #[error("Provider returned HTTP {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for EmbeddingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            EmbeddingError::Timeout
        } else {
            EmbeddingError::RequestError(err)
        }
    }
}

impl EmbeddingError {
    /// Whether the provider is missing, unreachable or refusing service,
    /// as opposed to a bad response to one request
    pub fn is_unavailable(&self) -> bool {
        match self {
            EmbeddingError::Unconfigured | EmbeddingError::Timeout => true,
            EmbeddingError::RequestError(e) => e.is_connect() || e.is_timeout(),
            EmbeddingError::ApiError { status, .. } => {
                matches!(*status, 401 | 403 | 429) || *status >= 500
            }
            EmbeddingError::InvalidResponse(_) => false,
        }
    }
}

/// Narrow interface to the external text -> vector computation
#[async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Model identifier, fixed for the provider's lifetime
    fn model(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

/// OpenAI-compatible embeddings client
///
/// One request per text, bounded by the configured timeout. No retries:
/// retrying belongs to the caller.
pub struct OpenAiEmbeddingClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl std::fmt::Debug for OpenAiEmbeddingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbeddingClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiEmbeddingClient {
    /// Create a new client
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, EmbeddingError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(EmbeddingError::Unconfigured);
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            model: model.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        tracing::debug!(model = %self.model, chars = text.len(), "Requesting embedding");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: text,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status, &body));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        let data = parsed
            .data
            .into_iter()
            .min_by_key(|d| d.index)
            .ok_or_else(|| EmbeddingError::InvalidResponse("Missing data array".into()))?;

        if data.embedding.is_empty() {
            return Err(EmbeddingError::InvalidResponse("Empty embedding vector".into()));
        }

        Ok(data.embedding)
    }
}

fn api_error(status: StatusCode, body: &str) -> EmbeddingError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .and_then(|e| e.message)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());

    EmbeddingError::ApiError {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(server: &mockito::Server) -> OpenAiEmbeddingClient {
        OpenAiEmbeddingClient::new(
            format!("{}/v1/embeddings", server.url()),
            "test-key",
            DEFAULT_EMBEDDING_MODEL,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_missing_key_is_unconfigured() {
        let err = OpenAiEmbeddingClient::new(
            DEFAULT_EMBEDDING_ENDPOINT,
            "  ",
            DEFAULT_EMBEDDING_MODEL,
            Duration::from_secs(5),
        )
        .unwrap_err();
        assert!(matches!(err, EmbeddingError::Unconfigured));
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn test_embed_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/embeddings")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":[{"embedding":[0.1,0.2,0.3],"index":0}],"model":"text-embedding-3-small"}"#)
            .create_async()
            .await;

        let client = client(&server);
        assert_eq!(client.endpoint(), format!("{}/v1/embeddings", server.url()));

        let v = client.embed("Roadside assistance").await.unwrap();
        assert_eq!(v, vec![0.1, 0.2, 0.3]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_embed_unauthorized_is_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/embeddings")
            .with_status(401)
            .with_body(r#"{"error":{"message":"Incorrect API key provided"}}"#)
            .create_async()
            .await;

        let err = client(&server).embed("text").await.unwrap_err();
        match &err {
            EmbeddingError::ApiError { status, message } => {
                assert_eq!(*status, 401);
                assert_eq!(message, "Incorrect API key provided");
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn test_embed_bad_request_is_not_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/embeddings")
            .with_status(400)
            .with_body("not json")
            .create_async()
            .await;

        let err = client(&server).embed("text").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::ApiError { status: 400, .. }));
        assert!(!err.is_unavailable());
    }

    #[tokio::test]
    async fn test_embed_empty_data() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/embeddings")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":[]}"#)
            .create_async()
            .await;

        let err = client(&server).embed("text").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::InvalidResponse(_)));
    }
}
