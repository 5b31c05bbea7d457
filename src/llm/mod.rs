//! LLM 모듈 - 답변 생성
//!
//! Groq의 OpenAI 호환 chat completions API로 프롬프트 하나를 보내고
//! 답변 문자열을 받습니다. 재시도는 하지 않습니다.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;

// ============================================================================
// ChatModel Trait
// ============================================================================

/// 텍스트 생성 트레이트
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// 프롬프트 하나로 답변 생성
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// 모델 식별자
    fn model(&self) -> &str;
}

// ============================================================================
// Groq Chat
// ============================================================================

/// Groq chat completions 클라이언트
pub struct GroqChat {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI 형식 에러 응답
#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

impl GroqChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatModel for GroqChat {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            anyhow::anyhow!(
                "GROQ_API_KEY not set.\n\
                 Set: export GROQ_API_KEY=your-api-key (or add it to .env)"
            )
        })?;

        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.0,
        };

        tracing::debug!("Requesting completion from {} ({})", self.endpoint, self.model);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send chat request")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<ApiError>(&body) {
                anyhow::bail!(
                    "Groq API error ({}{}): {}",
                    status,
                    error
                        .error
                        .kind
                        .map(|k| format!(", {}", k))
                        .unwrap_or_default(),
                    error.error.message
                );
            }
            anyhow::bail!("Groq API error ({}): {}", status, body);
        }

        parse_answer(&body)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn parse_answer(body: &str) -> Result<String> {
    let parsed: ChatResponse =
        serde_json::from_str(body).context("Failed to parse chat response")?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|c| c.trim().to_string())
        .ok_or_else(|| anyhow::anyhow!("Chat response contained no answer"))
}

// ============================================================================
// Tests
// ============================================================================
