//! docchat-rag - 문서/웹 페이지 기반 질의응답 (RAG)
//!
//! 업로드한 텍스트/PDF 파일과 웹 페이지를 인메모리 벡터 인덱스에 넣고,
//! 질문과 가까운 청크 5개를 근거로 Groq 모델이 답변합니다.
//! 상태는 프로세스 수명 동안만 유지됩니다.

pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extractor;
pub mod knowledge;
pub mod llm;
pub mod query;
pub mod scraper;
pub mod server;
pub mod session;

#[cfg(test)]
mod test_support;

// Re-exports
pub use config::AppConfig;
pub use embedding::{create_embedder, EmbeddingProvider, HttpEmbedding};
pub use error::RagError;
pub use extractor::{ContentExtractor, ExtractedText, FileKind};
pub use knowledge::{
    default_chunker, ChunkConfig, Chunk, Chunker, Document, KnowledgeBase, RecursiveChunker,
    SearchResult, StoreState, VectorEntry, VectorIndex,
};
pub use llm::{ChatModel, GroqChat};
pub use query::{Answer, QueryEngine, TOP_K};
pub use crate::scraper::{ScrapedContent, UrlLoader, WebScraper};
pub use session::{display_label, ChatTurn, RagSession, SessionStats};
