use serde::Deserialize;
use serde_json::json;
use std::env;

pub const EMBEDDINGS_URL_ENV: &str = "ATLAS_EMBEDDINGS_URL";
pub const EMBEDDINGS_API_KEY_ENV: &str = "ATLAS_EMBEDDINGS_API_KEY";
pub const EMBEDDINGS_MODEL_ENV: &str = "ATLAS_EMBEDDINGS_MODEL";
const DEFAULT_EMBEDDINGS_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingEntry>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingEntry {
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible `/embeddings` endpoint serving the same
/// pretrained sentence model the paper embeddings were computed with.
/// Constructed once per process and reused across queries.
pub struct QueryEmbedder {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl QueryEmbedder {
    pub fn new(base_url: &str, api_key: Option<String>, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: embeddings_endpoint(base_url),
            api_key,
            model,
        }
    }

    /// Builds a client from the environment, or None when no endpoint is
    /// configured. A missing embedder disables search only; the base
    /// cluster view keeps working.
    pub fn from_env() -> Option<Self> {
        let base_url = env::var(EMBEDDINGS_URL_ENV).ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        let api_key = env::var(EMBEDDINGS_API_KEY_ENV).ok().filter(|k| !k.is_empty());
        let model = env::var(EMBEDDINGS_MODEL_ENV)
            .unwrap_or_else(|_| DEFAULT_EMBEDDINGS_MODEL.to_string());
        Some(Self::new(&base_url, api_key, model))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, String> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "model": self.model, "input": text }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .map_err(|err| format!("Embedding request failed: {err}"))?;
        if !response.status().is_success() {
            return Err(format!(
                "Embedding endpoint returned status {}",
                response.status()
            ));
        }
        let payload: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|err| format!("Failed to decode embedding response: {err}"))?;
        first_embedding(payload)
    }
}

fn embeddings_endpoint(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    if trimmed.ends_with("/embeddings") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/embeddings")
    }
}

fn first_embedding(payload: EmbeddingsResponse) -> Result<Vec<f32>, String> {
    let entry = payload
        .data
        .into_iter()
        .next()
        .ok_or("Embedding endpoint returned no vectors")?;
    if entry.embedding.is_empty() {
        return Err("Embedding endpoint returned an empty vector".to_string());
    }
    Ok(entry.embedding)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_appends_embeddings_path() {
        assert_eq!(
            embeddings_endpoint("http://localhost:8080/v1"),
            "http://localhost:8080/v1/embeddings"
        );
        assert_eq!(
            embeddings_endpoint("http://localhost:8080/v1/"),
            "http://localhost:8080/v1/embeddings"
        );
        assert_eq!(
            embeddings_endpoint("http://localhost:8080/v1/embeddings"),
            "http://localhost:8080/v1/embeddings"
        );
    }

    #[test]
    fn first_embedding_takes_the_first_entry() {
        let payload: EmbeddingsResponse = serde_json::from_str(
            r#"{"data": [{"embedding": [0.1, 0.2]}, {"embedding": [0.3]}]}"#,
        )
        .expect("parse payload");
        assert_eq!(first_embedding(payload).expect("embedding"), vec![0.1, 0.2]);
    }

    #[test]
    fn empty_payload_is_an_error() {
        let payload: EmbeddingsResponse =
            serde_json::from_str(r#"{"data": []}"#).expect("parse payload");
        assert!(first_embedding(payload).is_err());
    }

    #[test]
    fn empty_vector_is_an_error() {
        let payload: EmbeddingsResponse =
            serde_json::from_str(r#"{"data": [{"embedding": []}]}"#).expect("parse payload");
        assert!(first_embedding(payload).is_err());
    }
}
