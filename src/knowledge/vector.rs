//! Vector Index - 인메모리 벡터 검색
//!
//! 청크 임베딩을 삽입 순서대로 보관하고 코사인 유사도로 전수 검색합니다.
//! 인덱스는 문서 집합에서 언제든 다시 만들 수 있는 캐시입니다.
//!
//! - `build`: 모든 엔트리를 교체
//! - `merge`: 기존 엔트리는 그대로 두고 뒤에 추가

use anyhow::Result;

use super::store::Chunk;

// ============================================================================
// Types
// ============================================================================

/// 벡터 엔트리
#[derive(Debug, Clone)]
pub struct VectorEntry {
    /// 원본 청크
    pub chunk: Chunk,
    /// 임베딩 벡터
    pub embedding: Vec<f32>,
}

/// 검색 결과
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub chunk: Chunk,
    /// 코사인 유사도 (-1.0 ~ 1.0)
    pub similarity: f32,
}

// ============================================================================
// VectorIndex
// ============================================================================

/// 인메모리 벡터 인덱스
#[derive(Debug, Clone)]
pub struct VectorIndex {
    entries: Vec<VectorEntry>,
    dimension: usize,
}

impl VectorIndex {
    /// 엔트리들로 새 인덱스 생성
    ///
    /// 모든 임베딩은 같은 차원이어야 합니다.
    pub fn build(entries: Vec<VectorEntry>) -> Result<Self> {
        let dimension = match entries.first() {
            Some(first) => first.embedding.len(),
            None => anyhow::bail!("Cannot build index from empty entries"),
        };

        if dimension == 0 {
            anyhow::bail!("Embedding dimension must be greater than zero");
        }
        check_dimensions(&entries, dimension)?;

        tracing::debug!(
            "Built vector index: {} entries, dimension {}",
            entries.len(),
            dimension
        );

        Ok(Self { entries, dimension })
    }

    /// 기존 인덱스에 엔트리 추가
    ///
    /// 검증이 끝난 뒤에만 변경하므로 실패 시 인덱스는 그대로입니다.
    pub fn merge(&mut self, entries: Vec<VectorEntry>) -> Result<usize> {
        check_dimensions(&entries, self.dimension)?;

        let added = entries.len();
        self.entries.extend(entries);

        tracing::debug!("Merged {} entries (total {})", added, self.entries.len());
        Ok(added)
    }

    /// 상위 `limit`개 검색
    ///
    /// 유사도 내림차순, 동점은 삽입 순서를 유지합니다.
    pub fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        if query_embedding.len() != self.dimension {
            anyhow::bail!(
                "Query embedding dimension {} does not match index dimension {}",
                query_embedding.len(),
                self.dimension
            );
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_similarity(query_embedding, &e.embedding)))
            .collect();

        // sort_by는 안정 정렬
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .map(|(i, similarity)| SearchResult {
                chunk: self.entries[i].chunk.clone(),
                similarity,
            })
            .collect())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn entries(&self) -> &[VectorEntry] {
        &self.entries
    }
}

fn check_dimensions(entries: &[VectorEntry], dimension: usize) -> Result<()> {
    if let Some(bad) = entries.iter().find(|e| e.embedding.len() != dimension) {
        anyhow::bail!(
            "Embedding dimension mismatch: expected {}, got {} (source: {})",
            dimension,
            bad.embedding.len(),
            bad.chunk.source
        );
    }
    Ok(())
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 코사인 유사도 계산
///
/// 결과는 -1.0 ~ 1.0 범위입니다. 길이가 다르거나 영벡터면 0.0입니다.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

// ============================================================================
// Tests
// ============================================================================
