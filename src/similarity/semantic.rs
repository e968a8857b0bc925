use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{Capabilities, SemanticSimilarity, normalize_label};
use crate::error::{PipelineError, PipelineResult};
use crate::models::{DocumentField, FieldId};

/// Configuration for an OpenAI-compatible embeddings endpoint
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// Full URL of the embeddings endpoint (from EMBEDDING_API_URL)
    pub api_url: String,
    /// Bearer token, if the endpoint needs one (from EMBEDDING_API_KEY)
    pub api_key: Option<String>,
    /// Model name (from EMBEDDING_MODEL)
    pub model: String,
    /// Upper bound for the probe and for precomputing all embeddings
    pub timeout: Duration,
}

impl EmbeddingConfig {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self> {
        let api_url = std::env::var("EMBEDDING_API_URL")
            .context("EMBEDDING_API_URL environment variable not set")?;

        Ok(Self {
            api_url,
            api_key: std::env::var("EMBEDDING_API_KEY").ok(),
            model: std::env::var("EMBEDDING_MODEL").unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            timeout: Duration::from_secs(10),
        })
    }

    pub fn new(api_url: String, model: String) -> Self {
        Self {
            api_url,
            api_key: None,
            model,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Embeddings API client
pub struct EmbeddingClient {
    client: Client,
    config: EmbeddingConfig,
}

impl EmbeddingClient {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }

    /// Embed a batch of texts, one vector per input in input order
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: self.config.model.clone(),
            input: texts.to_vec(),
        };

        let mut builder = self
            .client
            .post(&self.config.api_url)
            .header("content-type", "application/json")
            .json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .context("Failed to send request to embedding API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Embedding API error: {} - {}", status, body);
        }

        let mut response: EmbeddingResponse = response
            .json()
            .await
            .context("Failed to parse embedding API response")?;

        if response.data.len() != texts.len() {
            anyhow::bail!(
                "Embedding API returned {} vectors for {} inputs",
                response.data.len(),
                texts.len()
            );
        }

        response.data.sort_by_key(|d| d.index);
        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

/// Decide once, at startup, which matching strategies this run can use
pub async fn probe_capabilities(client: Option<&EmbeddingClient>) -> Capabilities {
    let Some(client) = client else {
        info!("No embedding backend configured, semantic matching disabled");
        return Capabilities::offline();
    };

    let sample = ["ping".to_string()];
    let probe = client.embed(&sample);
    match tokio::time::timeout(client.timeout(), probe).await {
        Ok(Ok(_)) => {
            info!("Embedding backend reachable, semantic matching enabled");
            Capabilities::with_semantic()
        }
        Ok(Err(e)) => {
            warn!("Embedding backend unavailable: {:#}", e);
            Capabilities::offline()
        }
        Err(_) => {
            warn!("Embedding backend probe timed out after {:?}", client.timeout());
            Capabilities::offline()
        }
    }
}

/// Every label the semantic pass may compare: field aliases and document names
pub fn mapping_labels(field_ids: &[FieldId], documents: &[DocumentField]) -> Vec<String> {
    field_ids
        .iter()
        .flat_map(|f| f.aliases().iter().map(|a| a.to_string()))
        .chain(documents.iter().map(|d| d.name.clone()))
        .collect()
}

/// Precompute embeddings for every label the mapper may compare
///
/// Runs under the client's timeout so a slow backend cannot stall the run.
pub async fn build_semantic_index(client: &EmbeddingClient, labels: &[String]) -> PipelineResult<SemanticIndex> {
    let mut unique: Vec<String> = labels.iter().map(|l| normalize_label(l)).collect();
    unique.sort();
    unique.dedup();

    let vectors = tokio::time::timeout(client.timeout(), client.embed(&unique))
        .await
        .map_err(|_| PipelineError::BackendUnavailable("embedding precompute timed out".to_string()))?
        .map_err(|e| PipelineError::BackendUnavailable(format!("{:#}", e)))?;

    info!("Precomputed {} label embeddings", vectors.len());
    Ok(SemanticIndex::from_vectors(unique.into_iter().zip(vectors)))
}

/// Precomputed label embeddings, queried synchronously by the mapper
#[derive(Debug, Clone, Default)]
pub struct SemanticIndex {
    vectors: HashMap<String, Vec<f32>>,
}

impl SemanticIndex {
    pub fn from_vectors(pairs: impl IntoIterator<Item = (String, Vec<f32>)>) -> Self {
        Self {
            vectors: pairs
                .into_iter()
                .map(|(label, vector)| (normalize_label(&label), vector))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

impl SemanticSimilarity for SemanticIndex {
    fn similarity(&self, a: &str, b: &str) -> Option<f64> {
        let a = self.vectors.get(&normalize_label(a))?;
        let b = self.vectors.get(&normalize_label(b))?;
        cosine_similarity(a, b)
    }
}

/// Cosine similarity of two vectors, `None` for mismatched or zero vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]).unwrap() - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap().abs() < 1e-9);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), None);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), None);
    }

    #[test]
    fn test_index_looks_up_normalized_labels() {
        let index = SemanticIndex::from_vectors(vec![
            ("phone".to_string(), vec![1.0, 0.2]),
            ("Primary Contact".to_string(), vec![0.9, 0.3]),
        ]);

        let score = index.similarity("phone", "primaryContact").unwrap();
        assert!(score > 0.9);
        assert_eq!(index.similarity("phone", "unknown label"), None);
    }

    #[test]
    fn test_mapping_labels() {
        let labels = mapping_labels(&[FieldId::Email], &[DocumentField::text("Primary Contact")]);
        assert!(labels.contains(&"email address".to_string()));
        assert_eq!(labels.last().map(String::as_str), Some("Primary Contact"));
    }

    #[tokio::test]
    async fn test_probe_without_backend_is_offline() {
        let caps = probe_capabilities(None).await;
        assert!(!caps.semantic());
    }

    #[tokio::test]
    async fn test_unreachable_backend_degrades() {
        let mut config = EmbeddingConfig::new("http://127.0.0.1:9/embeddings".to_string(), "test".to_string());
        config.timeout = Duration::from_secs(2);
        let client = EmbeddingClient::new(config);

        let caps = probe_capabilities(Some(&client)).await;
        assert!(!caps.semantic());

        let result = build_semantic_index(&client, &["phone".to_string()]).await;
        assert!(matches!(result, Err(PipelineError::BackendUnavailable(_))));
    }
}
