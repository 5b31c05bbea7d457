//! PDF 텍스트 추출 모듈
//!
//! pdf-extract 크레이트를 사용하여 PDF에서 페이지별 텍스트를 추출합니다.

use anyhow::{Context, Result};

/// PDF 바이트에서 페이지별 텍스트 추출
///
/// (페이지 번호, 텍스트) 튜플 벡터로 반환합니다. 페이지 번호는 1부터 시작하며,
/// 빈 페이지도 번호를 차지합니다.
pub fn extract_pages_from_bytes(bytes: &[u8]) -> Result<Vec<(usize, String)>> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .context("Failed to extract text from PDF")?;

    if pages.iter().all(|p| p.trim().is_empty()) {
        tracing::warn!("No text extracted from PDF. It might be a scanned document.");
        return Ok(vec![]);
    }

    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(i, text)| (i + 1, text.trim().to_string()))
        .collect())
}

// ============================================================================
// Tests
// ============================================================================
