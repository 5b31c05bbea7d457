//! 설정 모듈
//!
//! 환경변수(.env 포함)에서 설정을 읽습니다. CLI 플래그가 있으면 덮어씁니다.
//!
//! | 환경변수 | 기본값 |
//! |---|---|
//! | `GROQ_API_KEY` | (없음) |
//! | `GROQ_MODEL` | `qwen-2.5-32b` |
//! | `GROQ_BASE_URL` | `https://api.groq.com/openai/v1` |
//! | `EMBEDDING_PROVIDER` | `http` |
//! | `EMBEDDING_BASE_URL` | `http://127.0.0.1:8081/v1` |
//! | `EMBEDDING_MODEL` | `sentence-transformers/all-MiniLM-L6-v2` |
//! | `EMBEDDING_API_KEY` | (없음) |
//! | `RAG_BIND` | `127.0.0.1:8501` |
//! | `RAG_HTTP_TIMEOUT_SECS` | `60` |
//! | `RAG_MAX_UPLOAD_BYTES` | `20971520` |

use std::time::Duration;

use anyhow::{Context, Result};

/// 기본 생성 모델
pub const DEFAULT_CHAT_MODEL: &str = "qwen-2.5-32b";
/// Groq OpenAI 호환 엔드포인트
pub const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
/// 기본 임베딩 모델
pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
/// 기본 임베딩 서버 (OpenAI 호환 /embeddings)
pub const DEFAULT_EMBEDDING_BASE_URL: &str = "http://127.0.0.1:8081/v1";
/// 웹 UI 바인드 주소
pub const DEFAULT_BIND: &str = "127.0.0.1:8501";

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

// ============================================================================
// Config Types
// ============================================================================

/// 애플리케이션 설정
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub server: ServerConfig,
}

/// 생성(LLM) 설정
#[derive(Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

// API 키가 로그에 찍히지 않도록 직접 구현
impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// 임베딩 프로바이더 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingBackend {
    /// OpenAI 호환 HTTP 임베딩 서버
    Http,
    /// fastembed 로컬 추론 (`local-embeddings` 피처)
    Local,
}

impl std::str::FromStr for EmbeddingBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "http" | "openai" => Ok(Self::Http),
            "local" | "fastembed" => Ok(Self::Local),
            other => anyhow::bail!("Unknown embedding provider: '{}' (expected http or local)", other),
        }
    }
}

/// 임베딩 설정
#[derive(Clone)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl std::fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("backend", &self.backend)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// 웹 서버 설정
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub max_upload_bytes: usize,
}

// ============================================================================
// Loading
// ============================================================================

impl AppConfig {
    /// 환경변수에서 설정 로드 (.env 파일이 있으면 먼저 적용)
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {:?}", path);
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 키 조회 함수로부터 설정 구성
    ///
    /// 빈 문자열은 미설정으로 취급합니다.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let timeout_secs = match get("RAG_HTTP_TIMEOUT_SECS") {
            Some(v) => v
                .trim()
                .parse::<u64>()
                .with_context(|| format!("Invalid RAG_HTTP_TIMEOUT_SECS: {}", v))?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        // 0초 타임아웃은 모든 요청을 즉시 실패시킴
        if timeout_secs == 0 {
            anyhow::bail!("Invalid RAG_HTTP_TIMEOUT_SECS: must be greater than zero");
        }
        let timeout = Duration::from_secs(timeout_secs);

        let max_upload_bytes = match get("RAG_MAX_UPLOAD_BYTES") {
            Some(v) => v
                .trim()
                .parse::<usize>()
                .with_context(|| format!("Invalid RAG_MAX_UPLOAD_BYTES: {}", v))?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let backend = match get("EMBEDDING_PROVIDER") {
            Some(v) => v.parse()?,
            None => EmbeddingBackend::Http,
        };

        Ok(Self {
            llm: LlmConfig {
                api_key: get("GROQ_API_KEY"),
                model: get("GROQ_MODEL").unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
                base_url: get("GROQ_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_GROQ_BASE_URL.to_string()),
                timeout,
            },
            embedding: EmbeddingConfig {
                backend,
                base_url: get("EMBEDDING_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_EMBEDDING_BASE_URL.to_string()),
                model: get("EMBEDDING_MODEL")
                    .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
                api_key: get("EMBEDDING_API_KEY"),
                timeout,
            },
            server: ServerConfig {
                bind: get("RAG_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string()),
                max_upload_bytes,
            },
        })
    }

    /// 생성 API 키 존재 여부
    pub fn has_llm_key(&self) -> bool {
        self.llm.api_key.is_some()
    }
}

// ============================================================================
// Tests
// ============================================================================
