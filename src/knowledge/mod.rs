//! Knowledge 모듈 - 인메모리 RAG 지식 저장소
//!
//! - Store: 문서 컬렉션과 수집 파이프라인 (추출 -> 청킹 -> 임베딩)
//! - Vector: 코사인 유사도 기반 전수 검색 인덱스
//! - Chunker: 재귀 문자 분할 (800자, 오버랩 80자)

mod chunker;
mod store;
mod vector;

// Re-exports
pub use chunker::{
    default_chunker, ChunkConfig, Chunker, RecursiveChunker, CHUNK_OVERLAP, CHUNK_SIZE,
};
pub use store::{Chunk, Document, KnowledgeBase, StoreState, URL_SOURCE_PREFIX};
pub use vector::{cosine_similarity, SearchResult, VectorEntry, VectorIndex};
