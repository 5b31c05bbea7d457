//! Query 모듈 - 검색 증강 답변
//!
//! 질문을 임베딩해 상위 [`TOP_K`]개 청크를 찾고, 고정 프롬프트에
//! 끼워 채팅 모델에 한 번 요청합니다.

use std::sync::Arc;

use serde::Serialize;

use crate::error::RagError;
use crate::knowledge::{Chunk, KnowledgeBase};
use crate::llm::ChatModel;

/// 질문당 검색할 청크 수
pub const TOP_K: usize = 5;

/// 프롬프트 머리말 (지시문)
pub const PROMPT_INSTRUCTIONS: &str = "Answer the Question based on the given context.
Please Provide accurate answer to the Question based only on the context provided.
Be concise but thorough in your response.";

/// 질의 결과
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    /// 검색된 청크 (유사도 순, 중복 제거 없음)
    pub source_chunks: Vec<Chunk>,
}

/// 프롬프트 생성
pub fn build_prompt(chunks: &[Chunk], question: &str) -> String {
    let context = chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "{}\n\n<context>\n{}\n</context>\n\nQuestion : {}",
        PROMPT_INSTRUCTIONS, context, question
    )
}

/// 질의 오케스트레이터
pub struct QueryEngine {
    chat: Arc<dyn ChatModel>,
    top_k: usize,
}

impl QueryEngine {
    pub fn new(chat: Arc<dyn ChatModel>) -> Self {
        Self { chat, top_k: TOP_K }
    }

    pub fn model(&self) -> &str {
        self.chat.model()
    }

    /// 질문에 답변
    ///
    /// 저장소가 비어 있으면 모델을 호출하지 않고 `EmptyKnowledgeBase`를 반환합니다.
    pub async fn ask(&self, knowledge: &KnowledgeBase, question: &str) -> Result<Answer, RagError> {
        let source_chunks = knowledge.retrieve(question, self.top_k).await?;

        tracing::debug!(
            "Retrieved {} chunks for question ({} chars)",
            source_chunks.len(),
            question.chars().count()
        );

        let prompt = build_prompt(&source_chunks, question);

        let answer = self
            .chat
            .complete(&prompt)
            .await
            .map_err(RagError::QueryFailure)?;

        tracing::info!(
            "Answered with {} ({} source chunks)",
            self.chat.model(),
            source_chunks.len()
        );

        Ok(Answer {
            answer,
            source_chunks,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
