//! Knowledge Store - 인메모리 지식 저장소
//!
//! 수집된 문서와 파생된 벡터 인덱스를 소유합니다.
//! 문서 컬렉션과 인덱스는 이 타입을 통해서만 변경됩니다.
//!
//! 수집은 호출 단위로 all-or-nothing입니다. 추출, 청킹, 임베딩이
//! 모두 끝난 뒤에 문서와 인덱스를 한꺼번에 반영하고, 중간에 실패하면
//! 아무것도 바꾸지 않습니다.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;

use crate::embedding::EmbeddingProvider;
use crate::error::RagError;
use crate::extractor::{ContentExtractor, ExtractedText, FileKind};
use crate::scraper::UrlLoader;

use super::chunker::{default_chunker, Chunker};
use super::vector::{VectorEntry, VectorIndex};

/// URL 문서의 출처 라벨 접두어
pub const URL_SOURCE_PREFIX: &str = "URL: ";

// ============================================================================
// Types
// ============================================================================

/// 수집된 문서 (텍스트 단위 하나)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    /// 출처 라벨 (파일 이름 또는 `URL: <url>`)
    pub source: String,
    /// 원문 텍스트
    pub content: String,
    /// PDF 페이지 번호
    pub page: Option<usize>,
}

/// 문서에서 잘라낸 청크
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    pub source: String,
    pub text: String,
    pub page: Option<usize>,
    /// 문서 안에서의 순번 (0-based)
    pub chunk_index: usize,
}

/// 저장소 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreState {
    /// 문서 없음, 인덱스 없음
    Empty,
    /// 문서 1개 이상, 인덱스 있음
    Ready,
}

// ============================================================================
// KnowledgeBase
// ============================================================================

/// 지식 저장소
pub struct KnowledgeBase {
    documents: Vec<Document>,
    index: Option<VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    url_loader: Arc<dyn UrlLoader>,
    chunker: Box<dyn Chunker>,
    extractor: ContentExtractor,
}

impl KnowledgeBase {
    /// 새 저장소 생성 (기본 청커: 800자, 오버랩 80자)
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, url_loader: Arc<dyn UrlLoader>) -> Self {
        Self {
            documents: Vec::new(),
            index: None,
            embedder,
            url_loader,
            chunker: default_chunker(),
            extractor: ContentExtractor::new(),
        }
    }

    /// 청커 교체
    pub fn with_chunker(mut self, chunker: Box<dyn Chunker>) -> Self {
        self.chunker = chunker;
        self
    }

    pub(crate) fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    // ------------------------------------------------------------------------
    // Ingest
    // ------------------------------------------------------------------------

    /// 로컬 파일 수집
    ///
    /// 파서는 `display_name`의 확장자로 결정하고, 모든 단위의 출처는
    /// `display_name`이 됩니다. 추가된 문서 수를 반환합니다.
    pub async fn ingest_file(&mut self, path: &Path, display_name: &str) -> Result<usize, RagError> {
        let kind = FileKind::from_name(display_name)
            .ok_or_else(|| RagError::UnsupportedFormat(display_name.to_string()))?;

        let units = self
            .extractor
            .extract_file(path, kind)
            .await
            .map_err(|e| RagError::ingest(display_name, e))?;

        self.commit(display_name, units).await
    }

    /// 업로드된 바이트 수집 (웹 UI 경로)
    pub async fn ingest_bytes(
        &mut self,
        display_name: &str,
        bytes: Vec<u8>,
    ) -> Result<usize, RagError> {
        let kind = FileKind::from_name(display_name)
            .ok_or_else(|| RagError::UnsupportedFormat(display_name.to_string()))?;

        let units = self
            .extractor
            .extract_bytes(bytes, kind)
            .await
            .map_err(|e| RagError::ingest(display_name, e))?;

        self.commit(display_name, units).await
    }

    /// 웹 페이지 수집 (출처: `URL: <url>`)
    pub async fn ingest_url(&mut self, url: &str) -> Result<usize, RagError> {
        let source = format!("{}{}", URL_SOURCE_PREFIX, url);

        let page = self
            .url_loader
            .load(url)
            .await
            .map_err(|e| RagError::ingest(source.as_str(), e))?;

        let text = page.into_text();
        if text.trim().is_empty() {
            return Err(RagError::ingest(
                source,
                anyhow::anyhow!("No text content extracted"),
            ));
        }

        self.commit(&source, vec![ExtractedText { text, page: None }])
            .await
    }

    /// 텍스트 직접 수집
    pub async fn ingest_text(&mut self, source: &str, text: &str) -> Result<usize, RagError> {
        if text.trim().is_empty() {
            return Err(RagError::ingest(source, anyhow::anyhow!("Text is empty")));
        }

        self.commit(
            source,
            vec![ExtractedText {
                text: text.to_string(),
                page: None,
            }],
        )
        .await
    }

    /// 새 단위만 청킹/임베딩한 뒤 문서와 인덱스에 반영
    async fn commit(&mut self, source: &str, units: Vec<ExtractedText>) -> Result<usize, RagError> {
        let documents: Vec<Document> = units
            .into_iter()
            .map(|u| Document {
                source: source.to_string(),
                content: u.text,
                page: u.page,
            })
            .collect();

        let entries = self
            .prepare_entries(&documents)
            .await
            .map_err(|e| RagError::ingest(source, e))?;
        let chunk_count = entries.len();

        match self.index.as_mut() {
            Some(index) => {
                index
                    .merge(entries)
                    .map_err(|e| RagError::ingest(source, e))?;
            }
            None => {
                let index = VectorIndex::build(entries).map_err(|e| RagError::ingest(source, e))?;
                self.index = Some(index);
            }
        }

        let added = documents.len();
        self.documents.extend(documents);

        tracing::info!(
            "Added {} document(s) from {} ({} chunks, {} total documents)",
            added,
            source,
            chunk_count,
            self.documents.len()
        );

        Ok(added)
    }

    async fn prepare_entries(&self, documents: &[Document]) -> anyhow::Result<Vec<VectorEntry>> {
        let chunks: Vec<Chunk> = documents
            .iter()
            .flat_map(|doc| {
                self.chunker
                    .chunk(&doc.content)
                    .into_iter()
                    .enumerate()
                    .map(move |(i, text)| Chunk {
                        source: doc.source.clone(),
                        text,
                        page: doc.page,
                        chunk_index: i,
                    })
            })
            .collect();

        if chunks.is_empty() {
            anyhow::bail!("No chunks generated");
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self
            .embedder
            .embed_batch(&texts)
            .await
            .context("Failed to embed chunks")?;

        if embeddings.len() != chunks.len() {
            anyhow::bail!(
                "Embedding count mismatch: {} chunks, {} embeddings",
                chunks.len(),
                embeddings.len()
            );
        }

        Ok(chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| VectorEntry { chunk, embedding })
            .collect())
    }

    // ------------------------------------------------------------------------
    // Retrieval
    // ------------------------------------------------------------------------

    /// 질문과 가장 가까운 청크 `k`개 (유사도 순)
    pub async fn retrieve(&self, question: &str, k: usize) -> Result<Vec<Chunk>, RagError> {
        let index = self.index.as_ref().ok_or(RagError::EmptyKnowledgeBase)?;

        let query_embedding = self
            .embedder
            .embed(question)
            .await
            .context("Failed to embed question")
            .map_err(RagError::QueryFailure)?;

        let results = index
            .search(&query_embedding, k)
            .context("Vector search failed")
            .map_err(RagError::QueryFailure)?;

        Ok(results.into_iter().map(|r| r.chunk).collect())
    }

    // ------------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------------

    /// 문서와 인덱스 전체 삭제 (멱등)
    pub fn clear(&mut self) {
        let removed = self.documents.len();
        self.documents.clear();
        self.index = None;
        tracing::info!("Knowledge base cleared ({} documents removed)", removed);
    }

    /// 문서 수 (청크 수 아님)
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// 인덱스의 청크 수
    pub fn chunk_count(&self) -> usize {
        self.index.as_ref().map(VectorIndex::len).unwrap_or(0)
    }

    /// 고유 출처 라벨
    pub fn sources(&self) -> BTreeSet<String> {
        self.documents.iter().map(|d| d.source.clone()).collect()
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn index(&self) -> Option<&VectorIndex> {
        self.index.as_ref()
    }

    pub fn state(&self) -> StoreState {
        if self.index.is_some() {
            StoreState::Ready
        } else {
            StoreState::Empty
        }
    }

    /// 현재 문서로 인덱스를 처음부터 다시 만듦
    pub async fn rebuild_index(&mut self) -> anyhow::Result<usize> {
        if self.documents.is_empty() {
            self.index = None;
            return Ok(0);
        }

        let entries = self.prepare_entries(&self.documents).await?;
        let index = VectorIndex::build(entries)?;
        let count = index.len();
        self.index = Some(index);

        tracing::info!("Rebuilt vector index ({} chunks)", count);
        Ok(count)
    }
}

// ============================================================================
// Tests
// ============================================================================
