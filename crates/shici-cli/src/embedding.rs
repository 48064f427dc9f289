//! DashScope text-embedding client.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use shici_core::embed::EmbeddingProvider;

#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
  #[error("embedding request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("embedding provider returned {status}: {body}")]
  Status { status: StatusCode, body: String },

  #[error("embedding response carried no vector")]
  Empty,
}

impl EmbeddingError {
  /// Malformed responses are not worth retrying.
  fn is_transient(&self) -> bool { !matches!(self, Self::Empty) }
}

#[derive(Debug, Clone)]
pub struct DashScopeConfig {
  pub url:         String,
  pub api_key:     String,
  pub model:       String,
  pub dimension:   usize,
  pub attempts:    u32,
  pub retry_pause: Duration,
  pub timeout:     Duration,
}

impl Default for DashScopeConfig {
  fn default() -> Self {
    Self {
      url:         String::new(),
      api_key:     String::new(),
      model:       "text-embedding-v4".to_owned(),
      dimension:   1536,
      attempts:    3,
      retry_pause: Duration::from_secs(1),
      timeout:     Duration::from_secs(30),
    }
  }
}

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
  model:      &'a str,
  input:      EmbeddingInput<'a>,
  parameters: EmbeddingParameters,
}

#[derive(Serialize)]
struct EmbeddingInput<'a> {
  texts: [&'a str; 1],
}

#[derive(Serialize)]
struct EmbeddingParameters {
  dimension: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
  output: EmbeddingOutput,
}

#[derive(Deserialize)]
struct EmbeddingOutput {
  embeddings: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
  embedding: Vec<f32>,
}

// ─── Client ──────────────────────────────────────────────────────────────────

/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct DashScopeClient {
  client: Client,
  config: DashScopeConfig,
}

impl DashScopeClient {
  pub fn new(config: DashScopeConfig) -> Result<Self, EmbeddingError> {
    let client = Client::builder().timeout(config.timeout).build()?;
    Ok(Self { client, config })
  }

  async fn request(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
    let body = EmbeddingRequest {
      model:      &self.config.model,
      input:      EmbeddingInput { texts: [text] },
      parameters: EmbeddingParameters { dimension: self.config.dimension },
    };
    let resp = self
      .client
      .post(&self.config.url)
      .bearer_auth(&self.config.api_key)
      .json(&body)
      .send()
      .await?;

    let status = resp.status();
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      return Err(EmbeddingError::Status { status, body });
    }

    let parsed: EmbeddingResponse = resp.json().await.map_err(|e| {
      tracing::error!(error = %e, "unexpected embedding response shape");
      EmbeddingError::Empty
    })?;
    parsed
      .output
      .embeddings
      .into_iter()
      .next()
      .map(|item| item.embedding)
      .ok_or(EmbeddingError::Empty)
  }
}

impl EmbeddingProvider for DashScopeClient {
  type Error = EmbeddingError;

  async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
    let mut attempt = 1;
    loop {
      match self.request(text).await {
        Ok(vector) => return Ok(vector),
        Err(e) if e.is_transient() && attempt < self.config.attempts => {
          tracing::warn!(attempt, attempts = self.config.attempts, error = %e, "embedding request failed; retrying");
          tokio::time::sleep(self.config.retry_pause).await;
          attempt += 1;
        }
        Err(e) => return Err(e),
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn request_body_shape() {
    let body = EmbeddingRequest {
      model:      "text-embedding-v4",
      input:      EmbeddingInput { texts: ["明月"] },
      parameters: EmbeddingParameters { dimension: 1536 },
    };
    assert_eq!(
      serde_json::to_value(&body).unwrap(),
      serde_json::json!({
        "model": "text-embedding-v4",
        "input": { "texts": ["明月"] },
        "parameters": { "dimension": 1536 },
      })
    );
  }

  #[test]
  fn response_parsing_takes_first_vector() {
    let raw = r#"{"output":{"embeddings":[{"text_index":0,"embedding":[0.5,-1.0]}]},"usage":{"total_tokens":2}}"#;
    let parsed: EmbeddingResponse = serde_json::from_str(raw).unwrap();
    assert_eq!(parsed.output.embeddings[0].embedding, vec![0.5, -1.0]);
  }
}
