//! Text Chunking Module
//!
//! 재귀 문자 분할기를 제공합니다.
//! 문단 → 줄 → 단어 → 문자 순으로 구분자를 낮춰 가며
//! 목표 크기 이하의 청크를 만들고, 인접 청크 사이에 오버랩을 둡니다.

use std::collections::VecDeque;

/// 청크 목표 크기 (문자 수)
pub const CHUNK_SIZE: usize = 800;
/// 청크 간 오버랩 (문자 수)
pub const CHUNK_OVERLAP: usize = 80;

/// 기본 구분자 (우선순위 순)
const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkConfig {
    /// 최대 청크 크기 (문자 수)
    pub chunk_size: usize,
    /// 오버랩 크기 (문자 수)
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            chunk_overlap: CHUNK_OVERLAP,
        }
    }
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 청크로 분할
    fn chunk(&self, text: &str) -> Vec<String>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// RecursiveChunker
// ============================================================================

/// 재귀 문자 분할기
///
/// - 텍스트에 존재하는 첫 번째 구분자로 분할 (구분자는 다음 조각 앞에 유지)
/// - 목표 크기 이상인 조각은 다음 구분자로 재귀 분할
/// - 작은 조각은 목표 크기까지 병합하고, 뒤쪽 조각을 오버랩으로 이월
/// - 결과 청크는 앞뒤 공백 제거
pub struct RecursiveChunker {
    config: ChunkConfig,
}

impl RecursiveChunker {
    /// 설정으로 생성
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    /// 기본 설정(800/80)으로 생성
    pub fn with_defaults() -> Self {
        Self::new(ChunkConfig::default())
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut final_chunks = Vec::new();

        // 텍스트에 존재하는 첫 구분자 선택
        let mut separator = separators.last().copied().unwrap_or("");
        let mut remaining: &[&str] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = sep;
                break;
            }
            if text.contains(sep) {
                separator = sep;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut good_splits: Vec<&str> = Vec::new();

        for piece in split_keep_separator(text, separator) {
            if char_len(piece) < self.config.chunk_size {
                good_splits.push(piece);
                continue;
            }

            if !good_splits.is_empty() {
                final_chunks.extend(self.merge_splits(&good_splits));
                good_splits.clear();
            }

            if remaining.is_empty() {
                final_chunks.push(piece.to_string());
            } else {
                final_chunks.extend(self.split_recursive(piece, remaining));
            }
        }

        if !good_splits.is_empty() {
            final_chunks.extend(self.merge_splits(&good_splits));
        }

        final_chunks
    }

    /// 작은 조각을 목표 크기까지 병합
    ///
    /// 청크를 내보낸 뒤에는 누적 길이가 오버랩 이하가 될 때까지
    /// 앞쪽 조각을 버려서 남은 조각이 다음 청크의 머리가 됩니다.
    fn merge_splits(&self, splits: &[&str]) -> Vec<String> {
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        let mut chunks = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &split in splits {
            let len = char_len(split);

            if total + len > size {
                if total > size {
                    tracing::warn!(
                        "Created a chunk of size {}, which is longer than the specified {}",
                        total,
                        size
                    );
                }

                if !current.is_empty() {
                    if let Some(chunk) = join_pieces(&current) {
                        chunks.push(chunk);
                    }

                    while total > overlap || (total + len > size && total > 0) {
                        match current.pop_front() {
                            Some(front) => total -= char_len(front),
                            None => break,
                        }
                    }
                }
            }

            current.push_back(split);
            total += len;
        }

        if let Some(chunk) = join_pieces(&current) {
            chunks.push(chunk);
        }

        chunks
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return vec![];
        }

        let mut chunks = self.split_recursive(text, &DEFAULT_SEPARATORS);
        chunks.retain(|c| !c.trim().is_empty());
        chunks
    }

    fn name(&self) -> &'static str {
        "RecursiveChunker"
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 문자 수 (UTF-8 바이트 수가 아님)
#[inline]
fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// 구분자로 분할하되 구분자를 다음 조각 앞에 붙여 둠
///
/// 빈 구분자는 문자 단위 분할입니다. 빈 조각은 제거합니다.
fn split_keep_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut last = 0;
    for (idx, _) in text.match_indices(separator) {
        pieces.push(&text[last..idx]);
        last = idx;
    }
    pieces.push(&text[last..]);

    pieces.into_iter().filter(|p| !p.is_empty()).collect()
}

fn join_pieces(pieces: &VecDeque<&str>) -> Option<String> {
    let joined: String = pieces.iter().copied().collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// ============================================================================
// Factory Functions
// ============================================================================

/// 기본 청커 생성 (800자, 오버랩 80자)
pub fn default_chunker() -> Box<dyn Chunker> {
    Box::new(RecursiveChunker::with_defaults())
}

// ============================================================================
// Tests
// ============================================================================
