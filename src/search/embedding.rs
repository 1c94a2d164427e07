use crate::core::config::Config;
use crate::core::error::EmbedError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// One nearest-neighbour hit from the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticHit {
    pub file_id: u64,
    pub distance: f32,
}

/// Boundary to the embedding / vector-search service.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Embed a piece of text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    /// Store (or overwrite) the vector for a file in the service's index
    async fn add_file(&self, file_id: u64, embedding: &[f32]) -> Result<(), EmbedError>;

    /// Nearest neighbours of `query`, closest first
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SemanticHit>, EmbedError>;
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct AddFileRequest<'a> {
    file_id: u64,
    embedding: &'a [f32],
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    k: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    results: Vec<SemanticHit>,
}

/// JSON-over-HTTP client for the embedding service.
#[derive(Clone)]
pub struct HttpEmbeddingClient {
    client: Client,
    base_url: String,
}

impl HttpEmbeddingClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, EmbedError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmbedError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, EmbedError> {
        Self::new(&config.embedding_url, config.embedding_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, EmbedError> {
        let response = self.client.post(self.endpoint(path)).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbedError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl EmbeddingService for HttpEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let response: EmbedResponse = self.post("embed", &EmbedRequest { text }).await?.json().await?;

        if response.embedding.is_empty() {
            return Err(EmbedError::InvalidResponse(
                "service returned an empty embedding".to_string(),
            ));
        }
        debug!("Embedded {} chars into {} dims", text.len(), response.embedding.len());
        Ok(response.embedding)
    }

    async fn add_file(&self, file_id: u64, embedding: &[f32]) -> Result<(), EmbedError> {
        self.post("add_file", &AddFileRequest { file_id, embedding })
            .await?;
        Ok(())
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<SemanticHit>, EmbedError> {
        let response: SearchResponse = self
            .post("search", &SearchRequest { query, k })
            .await?
            .json()
            .await?;
        Ok(response.results)
    }
}


