//! 임베딩 모듈 - 텍스트 벡터화
//!
//! 청크와 질문을 벡터로 변환하는 프로바이더입니다.
//!
//! - [`HttpEmbedding`]: OpenAI 호환 `/embeddings` 엔드포인트
//!   (text-embeddings-inference, infinity, OpenAI 등)
//! - `LocalEmbedding`: fastembed로 all-MiniLM-L6-v2 로컬 추론
//!   (`local-embeddings` 피처)
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = create_embedder(&config.embedding)?;
//! let embedding = embedder.embed("Hello, world!").await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{EmbeddingBackend, EmbeddingConfig};

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 텍스트를 벡터로 변환하는 인터페이스입니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 배치 임베딩 (기본 구현: 순차 호출)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// 프로바이더/모델 이름
    fn name(&self) -> &str;
}

// ============================================================================
// OpenAI-compatible HTTP Embedding
// ============================================================================

/// 한 요청에 담는 최대 입력 수
const MAX_BATCH: usize = 32;
/// 429/5xx/네트워크 에러 시 최대 재시도 횟수
const MAX_RETRIES: u32 = 3;
/// 재시도 시 초기 백오프 (ms)
const INITIAL_BACKOFF_MS: u64 = 1000;

/// OpenAI 호환 임베딩 구현체
#[derive(Debug)]
pub struct HttpEmbedding {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

/// OpenAI 형식 에러 응답
#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl HttpEmbedding {
    /// 새 인스턴스 생성
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            endpoint: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// 한 배치 요청 (재시도 포함)
    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        let mut last_error: Option<anyhow::Error> = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let backoff = Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt - 1));
                tracing::warn!(
                    "Embedding request failed, retrying in {:?} (attempt {}/{})",
                    backoff,
                    attempt,
                    MAX_RETRIES
                );
                tokio::time::sleep(backoff).await;
            }

            let mut req = self.client.post(&self.endpoint).json(&body);
            if let Some(ref key) = self.api_key {
                req = req.bearer_auth(key);
            }

            let response = match req.send().await {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(anyhow::anyhow!("Failed to send embedding request: {}", e));
                    continue;
                }
            };

            let status = response.status();
            let text = response
                .text()
                .await
                .context("Failed to read response body")?;

            if status.is_success() {
                let parsed: EmbedResponse =
                    serde_json::from_str(&text).context("Failed to parse embedding response")?;
                return order_embeddings(parsed, texts.len());
            }

            if status.as_u16() == 429 || status.is_server_error() {
                last_error = Some(anyhow::anyhow!("Embedding API error ({})", status));
                continue;
            }

            // 다른 4xx - 즉시 실패
            if let Ok(error) = serde_json::from_str::<ApiError>(&text) {
                anyhow::bail!("Embedding API error ({}): {}", status, error.error.message);
            }
            anyhow::bail!("Embedding API error ({}): {}", status, text);
        }

        Err(last_error
            .unwrap_or_else(|| anyhow::anyhow!("Embedding failed after {} retries", MAX_RETRIES)))
    }
}

/// 응답을 입력 순서로 정렬하고 개수 검증
fn order_embeddings(response: EmbedResponse, expected: usize) -> Result<Vec<Vec<f32>>> {
    let mut data = response.data;
    if data.len() != expected {
        anyhow::bail!(
            "Embedding count mismatch: sent {}, received {}",
            expected,
            data.len()
        );
    }

    if data.iter().all(|d| d.index.is_some()) {
        data.sort_by_key(|d| d.index.unwrap_or(0));
    }

    Ok(data.into_iter().map(|d| d.embedding).collect())
}

#[async_trait]
impl EmbeddingProvider for HttpEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let input = [text.to_string()];
        let mut vectors = self.request(&input).await?;
        vectors
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());

        for (i, batch) in texts.chunks(MAX_BATCH).enumerate() {
            tracing::debug!(
                "Embedding batch {}/{}",
                i + 1,
                texts.len().div_ceil(MAX_BATCH)
            );
            results.extend(self.request(batch).await?);
        }

        Ok(results)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Local Embedding (fastembed)
// ============================================================================

/// fastembed 로컬 임베딩 (all-MiniLM-L6-v2, 384차원)
///
/// 첫 사용 시 Hugging Face에서 모델을 내려받아 캐시합니다.
#[cfg(feature = "local-embeddings")]
pub struct LocalEmbedding {
    model: Arc<std::sync::Mutex<fastembed::TextEmbedding>>,
}

#[cfg(feature = "local-embeddings")]
impl LocalEmbedding {
    pub fn new() -> Result<Self> {
        let model = fastembed::TextEmbedding::try_new(
            fastembed::InitOptions::new(fastembed::EmbeddingModel::AllMiniLML6V2),
        )
        .map_err(|e| anyhow::anyhow!("Failed to initialize local embedding model: {}", e))?;

        Ok(Self {
            model: Arc::new(std::sync::Mutex::new(model)),
        })
    }
}

#[cfg(feature = "local-embeddings")]
#[async_trait]
impl EmbeddingProvider for LocalEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding result"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = Arc::clone(&self.model);
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
            model
                .embed(texts, None)
                .map_err(|e| anyhow::anyhow!("Local embedding failed: {}", e))
        })
        .await
        .context("Local embedding task failed")?
    }

    fn name(&self) -> &str {
        "all-MiniLM-L6-v2"
    }
}

// ============================================================================
// Factory Function
// ============================================================================

/// 설정에 맞는 임베딩 프로바이더 생성
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.backend {
        EmbeddingBackend::Http => {
            let embedder = HttpEmbedding::new(config)?;
            tracing::info!(
                "Using HTTP embedding: {} ({})",
                embedder.endpoint(),
                config.model
            );
            Ok(Arc::new(embedder))
        }
        #[cfg(feature = "local-embeddings")]
        EmbeddingBackend::Local => {
            tracing::info!("Using local embedding: all-MiniLM-L6-v2");
            Ok(Arc::new(LocalEmbedding::new()?))
        }
        #[cfg(not(feature = "local-embeddings"))]
        EmbeddingBackend::Local => anyhow::bail!(
            "Local embedding provider requires the `local-embeddings` feature.\n\
             Rebuild with: cargo build --features local-embeddings"
        ),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn config() -> EmbeddingConfig {
        AppConfig::from_lookup(|_| None).expect("config").embedding
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let mut cfg = config();
        cfg.base_url = "http://localhost:9000/v1/".to_string();
        let embedder = HttpEmbedding::new(&cfg).expect("embedder");
        assert_eq!(embedder.endpoint(), "http://localhost:9000/v1/embeddings");
        assert_eq!(embedder.name(), "sentence-transformers/all-MiniLM-L6-v2");
    }

    #[test]
    fn test_order_embeddings_by_index() {
        let response: EmbedResponse = serde_json::from_str(
            r#"{"data":[{"embedding":[2.0],"index":1},{"embedding":[1.0],"index":0}]}"#,
        )
        .expect("json");
        let ordered = order_embeddings(response, 2).expect("ordered");
        assert_eq!(ordered, vec![vec![1.0], vec![2.0]]);
    }

    #[test]
    fn test_order_embeddings_count_mismatch() {
        let response: EmbedResponse =
            serde_json::from_str(r#"{"data":[{"embedding":[1.0]}]}"#).expect("json");
        assert!(order_embeddings(response, 2).is_err());
    }

    #[cfg(not(feature = "local-embeddings"))]
    #[test]
    fn test_local_backend_requires_feature() {
        let mut cfg = config();
        cfg.backend = EmbeddingBackend::Local;
        let result = create_embedder(&cfg);
        assert!(result.is_err());
    }
}
