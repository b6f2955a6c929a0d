//! OpenAI-compatible embedding client.
//!
//! Works against any server exposing `POST {endpoint}/embeddings` in OpenAI
//! format, e.g. a local sentence-transformers server hosting
//! `distiluse-base-multilingual-cased-v1`.

use async_trait::async_trait;
use finelaw_core::config::RetrievalConfig;
use finelaw_core::error::{FineLawError, Result};
use finelaw_core::traits::Embedder;
use serde_json::{Value, json};

pub struct HttpEmbedder {
    model: String,
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpEmbedder {
    pub fn new(endpoint: &str, model: &str, api_key: &str) -> Self {
        Self {
            model: model.to_string(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self::new(&config.embedding_endpoint, &config.embedding_model, &config.embedding_api_key)
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_key.is_empty() {
            req
        } else {
            req.header("Authorization", format!("Bearer {}", self.api_key))
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embeddings", self.endpoint);
        let body = json!({
            "model": self.model,
            "input": texts,
        });
        let req = self.apply_auth(self.client.post(&url).json(&body));

        let resp = req
            .send()
            .await
            .map_err(|e| FineLawError::Http(format!("embedding connection failed ({url}): {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(FineLawError::Embedding(format!(
                "{} returned {}: {}",
                self.model, status, text
            )));
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| FineLawError::Http(e.to_string()))?;
        let vectors = parse_embeddings(&json)?;

        if vectors.len() != texts.len() {
            return Err(FineLawError::Embedding(format!(
                "requested {} embeddings, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        tracing::debug!("🧮 Embedded {} texts with {}", texts.len(), self.model);
        Ok(vectors)
    }
}

/// Pull `data[*].embedding` out of a response, ordered by `index`.
fn parse_embeddings(json: &Value) -> Result<Vec<Vec<f32>>> {
    let data = json["data"]
        .as_array()
        .ok_or_else(|| FineLawError::Embedding("No data in embedding response".into()))?;

    let mut indexed: Vec<(u64, Vec<f32>)> = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let index = item["index"].as_u64().unwrap_or(position as u64);
        let vector = item["embedding"]
            .as_array()
            .ok_or_else(|| FineLawError::Embedding(format!("item {position} has no embedding")))?
            .iter()
            .map(|v| v.as_f64().map(|f| f as f32))
            .collect::<Option<Vec<f32>>>()
            .ok_or_else(|| FineLawError::Embedding(format!("item {position} is not numeric")))?;
        indexed.push((index, vector));
    }
    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_orders_by_index() {
        let json = json!({
            "object": "list",
            "data": [
                {"object": "embedding", "index": 1, "embedding": [0.0, 1.0]},
                {"object": "embedding", "index": 0, "embedding": [1.0, 0.5]},
            ],
            "model": "distiluse-base-multilingual-cased-v1",
        });
        let vectors = parse_embeddings(&json).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.5], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(parse_embeddings(&json!({"error": "boom"})).is_err());
        assert!(parse_embeddings(&json!({"data": [{"embedding": ["x"]}]})).is_err());
    }

    #[test]
    fn test_endpoint_trailing_slash() {
        let embedder = HttpEmbedder::new("http://127.0.0.1:7997/v1/", "m", "");
        assert_eq!(embedder.endpoint, "http://127.0.0.1:7997/v1");
        assert_eq!(embedder.model(), "m");
    }
}
