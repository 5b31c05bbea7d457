//! Session 모듈 - 프로세스 단위 대화 세션
//!
//! 지식 저장소, 질의 엔진, 대화 기록, 출처별 검색 횟수를 한 곳에 묶습니다.
//! 웹 UI와 CLI는 이 타입만 사용합니다.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::AppConfig;
use crate::embedding::create_embedder;
use crate::error::RagError;
use crate::knowledge::{Chunk, KnowledgeBase, URL_SOURCE_PREFIX};
use crate::llm::GroqChat;
use crate::query::QueryEngine;
use crate::scraper::WebScraper;

/// 차트 라벨 최대 길이 (초과 시 "..." 붙임)
const LABEL_MAX_CHARS: usize = 20;

// ============================================================================
// Chat History
// ============================================================================

/// 질문/답변 한 쌍
#[derive(Debug, Clone, Serialize)]
pub struct ChatTurn {
    pub question: String,
    pub answer: String,
    /// 답변 근거 청크 (검색 순서)
    pub sources: Vec<Chunk>,
    pub asked_at: DateTime<Utc>,
}

impl ChatTurn {
    /// 근거 출처 라벨 (중복 제거, 처음 나온 순서)
    pub fn source_labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = Vec::new();
        for chunk in &self.sources {
            if !labels.contains(&chunk.source.as_str()) {
                labels.push(&chunk.source);
            }
        }
        labels
    }
}

/// 대화 기록 (시간순)
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatHistory {
    turns: Vec<ChatTurn>,
}

impl ChatHistory {
    pub fn push(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

// ============================================================================
// Retrieval Tally
// ============================================================================

/// 출처 라벨별 검색 횟수
///
/// 답변 하나에 같은 출처의 청크가 여러 개면 청크 수만큼 증가합니다.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetrievalTally {
    counts: BTreeMap<String, usize>,
}

impl RetrievalTally {
    pub fn record(&mut self, chunks: &[Chunk]) {
        for chunk in chunks {
            *self.counts.entry(chunk.source.clone()).or_insert(0) += 1;
        }
    }

    pub fn get(&self, source: &str) -> usize {
        self.counts.get(source).copied().unwrap_or(0)
    }

    pub fn counts(&self) -> &BTreeMap<String, usize> {
        &self.counts
    }

    /// 차트용: 표시 라벨로 합산, 횟수 내림차순
    pub fn by_label(&self) -> Vec<(String, usize)> {
        let mut merged: BTreeMap<String, usize> = BTreeMap::new();
        for (source, count) in &self.counts {
            *merged.entry(display_label(source)).or_insert(0) += count;
        }

        let mut rows: Vec<(String, usize)> = merged.into_iter().collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1));
        rows
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }
}

/// 차트 라벨 포맷
///
/// - `URL: https://host/path` -> `URL: host`
/// - `.pdf`/`.txt` 경로 -> 파일 이름
/// - 그 외 20자 초과 -> 앞 20자 + `...`
pub fn display_label(source: &str) -> String {
    if let Some(raw) = source.strip_prefix(URL_SOURCE_PREFIX) {
        if let Some(host) = url::Url::parse(raw)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
        {
            return format!("{}{}", URL_SOURCE_PREFIX, host);
        }
    }

    let lower = source.to_lowercase();
    if lower.ends_with(".pdf") || lower.ends_with(".txt") {
        if let Some(name) = Path::new(source).file_name().and_then(|n| n.to_str()) {
            return name.to_string();
        }
    }

    if source.chars().count() > LABEL_MAX_CHARS {
        let head: String = source.chars().take(LABEL_MAX_CHARS).collect();
        return format!("{}...", head);
    }

    source.to_string()
}

// ============================================================================
// Session
// ============================================================================

/// 세션 통계
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub document_count: usize,
    pub chunk_count: usize,
    pub sources: Vec<String>,
    pub retrievals: BTreeMap<String, usize>,
    pub turns: usize,
}

/// 대화 세션
pub struct RagSession {
    knowledge: KnowledgeBase,
    engine: QueryEngine,
    history: ChatHistory,
    tally: RetrievalTally,
}

impl RagSession {
    pub fn new(knowledge: KnowledgeBase, engine: QueryEngine) -> Self {
        Self {
            knowledge,
            engine,
            history: ChatHistory::default(),
            tally: RetrievalTally::default(),
        }
    }

    /// 설정으로 세션 구성 (임베딩, 스크래퍼, Groq 클라이언트)
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        let scraper = WebScraper::new(config.llm.timeout)?;
        let chat = GroqChat::new(&config.llm)?;

        if !config.has_llm_key() {
            tracing::warn!("GROQ_API_KEY not set - questions will fail until it is configured");
        }

        Ok(Self::new(
            KnowledgeBase::new(embedder, Arc::new(scraper)),
            QueryEngine::new(Arc::new(chat)),
        ))
    }

    // ------------------------------------------------------------------------
    // Ingest
    // ------------------------------------------------------------------------

    /// 파일 수집 (성공 여부만 반환, 실패는 로그)
    pub async fn process_file(&mut self, path: &Path, display_name: &str) -> bool {
        report(self.knowledge.ingest_file(path, display_name).await)
    }

    /// 업로드 바이트 수집
    pub async fn process_bytes(&mut self, display_name: &str, bytes: Vec<u8>) -> bool {
        report(self.knowledge.ingest_bytes(display_name, bytes).await)
    }

    /// URL 수집
    pub async fn process_url(&mut self, url: &str) -> bool {
        report(self.knowledge.ingest_url(url.trim()).await)
    }

    /// 텍스트 직접 수집
    pub async fn process_text(&mut self, source: &str, text: &str) -> bool {
        report(self.knowledge.ingest_text(source, text).await)
    }

    // ------------------------------------------------------------------------
    // Ask
    // ------------------------------------------------------------------------

    /// 질문하고 기록에 추가
    ///
    /// 성공한 경우에만 기록과 검색 횟수가 바뀝니다.
    pub async fn ask(&mut self, question: &str) -> Result<ChatTurn, RagError> {
        let answer = self.engine.ask(&self.knowledge, question).await?;

        self.tally.record(&answer.source_chunks);

        let turn = ChatTurn {
            question: question.to_string(),
            answer: answer.answer,
            sources: answer.source_chunks,
            asked_at: Utc::now(),
        };
        self.history.push(turn.clone());

        Ok(turn)
    }

    // ------------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------------

    /// 지식 저장소, 대화 기록, 검색 횟수 모두 초기화
    pub fn clear_knowledge_base(&mut self) {
        self.knowledge.clear();
        self.history.clear();
        self.tally.clear();
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            document_count: self.knowledge.document_count(),
            chunk_count: self.knowledge.chunk_count(),
            sources: self.knowledge.sources().into_iter().collect(),
            retrievals: self.tally.counts().clone(),
            turns: self.history.len(),
        }
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    pub fn tally(&self) -> &RetrievalTally {
        &self.tally
    }

    pub fn model(&self) -> &str {
        self.engine.model()
    }

    pub fn embedder_name(&self) -> &str {
        self.knowledge.embedder().name()
    }
}

fn report(result: Result<usize, RagError>) -> bool {
    match result {
        Ok(_) => true,
        Err(e) => {
            tracing::error!("Error processing content ({}): {}", e.kind(), e);
            false
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
