//! 에러 타입
//!
//! 수집(ingest)과 질의(ask) 경계에서 사용하는 타입 에러입니다.
//! 내부 단계는 `anyhow::Result`로 컨텍스트를 붙여 전파하고,
//! 외부로 나가는 지점에서 [`RagError`]로 분류합니다.

use thiserror::Error;

/// RAG 작업 에러
#[derive(Debug, Error)]
pub enum RagError {
    /// 지원하지 않는 파일 확장자
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    /// 로더/파서 실패, 네트워크 실패, 빈 콘텐츠
    #[error("Failed to ingest {source_label}: {cause:#}")]
    IngestFailure {
        source_label: String,
        cause: anyhow::Error,
    },

    /// 인덱스가 없는 상태에서 질의
    #[error("No documents in knowledge base. Please add content first.")]
    EmptyKnowledgeBase,

    /// 임베딩/검색/생성 단계 실패
    #[error("Query failed: {0:#}")]
    QueryFailure(anyhow::Error),
}

impl RagError {
    /// 수집 실패 생성
    pub fn ingest(source_label: impl Into<String>, cause: anyhow::Error) -> Self {
        Self::IngestFailure {
            source_label: source_label.into(),
            cause,
        }
    }

    /// 기계 판독용 에러 코드
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat(_) => "unsupported_format",
            Self::IngestFailure { .. } => "ingest_failure",
            Self::EmptyKnowledgeBase => "empty_knowledge_base",
            Self::QueryFailure(_) => "query_failure",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            RagError::UnsupportedFormat("a.docx".into()).kind(),
            "unsupported_format"
        );
        assert_eq!(RagError::EmptyKnowledgeBase.kind(), "empty_knowledge_base");
        assert_eq!(
            RagError::QueryFailure(anyhow::anyhow!("boom")).kind(),
            "query_failure"
        );
    }

    #[test]
    fn test_ingest_failure_message_includes_cause() {
        let err = RagError::ingest("URL: http://x", anyhow::anyhow!("connection refused"));
        let msg = err.to_string();
        assert!(msg.contains("URL: http://x"));
        assert!(msg.contains("connection refused"));
    }
}
