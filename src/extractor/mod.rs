//! 콘텐츠 추출 모듈
//!
//! 업로드된 파일에서 텍스트 단위(unit)를 추출합니다.
//! - 텍스트 파일(.txt): UTF-8로 읽어 1개 단위
//! - PDF 파일(.pdf): pdf-extract로 페이지별 단위

pub mod pdf;

use std::path::Path;

use anyhow::{Context, Result};

// ============================================================================
// File Kinds
// ============================================================================

/// 지원하는 파일 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// 일반 텍스트
    Text,
    /// PDF
    Pdf,
}

impl FileKind {
    /// 확장자로 종류 결정 (대소문자 무시)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "txt" => Some(FileKind::Text),
            "pdf" => Some(FileKind::Pdf),
            _ => None,
        }
    }

    /// 파일 이름에서 종류 결정
    pub fn from_name(name: &str) -> Option<Self> {
        Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Text => "TXT",
            FileKind::Pdf => "PDF",
        }
    }
}

// ============================================================================
// Extracted Content
// ============================================================================

/// 추출된 텍스트 단위
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedText {
    /// 추출된 텍스트
    pub text: String,
    /// PDF 페이지 번호 (1부터 시작)
    pub page: Option<usize>,
}

// ============================================================================
// Content Extractor
// ============================================================================

/// 콘텐츠 추출기
#[derive(Debug, Default, Clone)]
pub struct ContentExtractor;

impl ContentExtractor {
    pub fn new() -> Self {
        Self
    }

    /// 파일에서 추출
    pub async fn extract_file(&self, path: &Path, kind: FileKind) -> Result<Vec<ExtractedText>> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read file: {:?}", path))?;
        self.extract_bytes(bytes, kind).await
    }

    /// 메모리 상의 바이트에서 추출
    ///
    /// 공백뿐인 단위는 버리고, 남는 단위가 없으면 에러입니다.
    pub async fn extract_bytes(&self, bytes: Vec<u8>, kind: FileKind) -> Result<Vec<ExtractedText>> {
        let units = match kind {
            FileKind::Text => extract_text(bytes)?,
            FileKind::Pdf => {
                // PDF 추출은 CPU 바운드이므로 spawn_blocking 사용
                tokio::task::spawn_blocking(move || pdf::extract_pages_from_bytes(&bytes))
                    .await
                    .context("PDF extraction task failed")??
                    .into_iter()
                    .map(|(page, text)| ExtractedText {
                        text,
                        page: Some(page),
                    })
                    .collect()
            }
        };

        let units: Vec<ExtractedText> = units
            .into_iter()
            .filter(|u| !u.text.trim().is_empty())
            .collect();

        if units.is_empty() {
            anyhow::bail!("No text could be extracted ({})", kind.as_str());
        }

        Ok(units)
    }
}

fn extract_text(bytes: Vec<u8>) -> Result<Vec<ExtractedText>> {
    let text = String::from_utf8(bytes).context("Text file is not valid UTF-8")?;
    // 메모장 등이 붙이는 UTF-8 BOM 제거
    let text = match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => text,
    };
    Ok(vec![ExtractedText { text, page: None }])
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::pdf_fixture;

    #[test]
    fn test_file_kind_from_name() {
        assert_eq!(FileKind::from_name("notes.txt"), Some(FileKind::Text));
        assert_eq!(FileKind::from_name("REPORT.PDF"), Some(FileKind::Pdf));
        assert_eq!(FileKind::from_name("dir/a.b.Txt"), Some(FileKind::Text));
        assert_eq!(FileKind::from_name("slides.pptx"), None);
        assert_eq!(FileKind::from_name("README"), None);
        assert_eq!(FileKind::from_name("archive.txt.zip"), None);
    }

    #[tokio::test]
    async fn test_extract_text_bytes() {
        let extractor = ContentExtractor::new();
        let units = extractor
            .extract_bytes(b"hello world".to_vec(), FileKind::Text)
            .await
            .expect("extract");
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].text, "hello world");
        assert_eq!(units[0].page, None);
    }

    #[tokio::test]
    async fn test_extract_text_strips_bom() {
        let extractor = ContentExtractor::new();
        let bytes = "\u{feff}Rust ownership rules.".as_bytes().to_vec();
        let units = extractor
            .extract_bytes(bytes, FileKind::Text)
            .await
            .expect("extract");
        assert_eq!(units[0].text, "Rust ownership rules.");
    }

    #[tokio::test]
    async fn test_extract_pdf_bytes_per_page() {
        let extractor = ContentExtractor::new();
        let bytes = pdf_fixture(&["Alpha page one text", "", "Bravo page three text"]);
        let units = extractor
            .extract_bytes(bytes, FileKind::Pdf)
            .await
            .expect("extract");

        // 빈 페이지는 빠지지만 번호는 유지
        let pages: Vec<Option<usize>> = units.iter().map(|u| u.page).collect();
        assert_eq!(pages, vec![Some(1), Some(3)]);
        assert!(units[0].text.contains("Alpha page one text"));
        assert!(units[1].text.contains("Bravo page three text"));
    }

    #[tokio::test]
    async fn test_extract_empty_text_fails() {
        let extractor = ContentExtractor::new();
        let result = extractor.extract_bytes(b"  \n ".to_vec(), FileKind::Text).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_extract_invalid_utf8_fails() {
        let extractor = ContentExtractor::new();
        let result = extractor
            .extract_bytes(vec![0xff, 0xfe, 0x00, 0x80], FileKind::Text)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_extract_garbage_pdf_fails() {
        let extractor = ContentExtractor::new();
        let result = extractor
            .extract_bytes(b"definitely not a pdf".to_vec(), FileKind::Pdf)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_extract_file_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("doc.txt");
        std::fs::write(&path, "from disk").expect("write");

        let extractor = ContentExtractor::new();
        let units = extractor
            .extract_file(&path, FileKind::Text)
            .await
            .expect("extract");
        assert_eq!(units[0].text, "from disk");
    }
}
