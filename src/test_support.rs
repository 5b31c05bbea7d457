//! 테스트 더블 (임베딩, 채팅 모델, URL 로더) 및 PDF 픽스처

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::knowledge::KnowledgeBase;
use crate::llm::ChatModel;
use crate::scraper::{ScrapedContent, UrlLoader};

const KEYWORDS: [&str; 6] = ["rust", "python", "ocean", "mountain", "paris", "tokio"];

/// 키워드 포함 여부로 벡터를 만드는 결정적 임베딩
///
/// `fail`을 켜면 모든 호출이 실패하고, `calls`는 호출 횟수를 셉니다.
#[derive(Default)]
pub struct KeywordEmbedding {
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
}

impl KeywordEmbedding {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("embedding service down");
        }
        let lower = text.to_lowercase();
        let mut v: Vec<f32> = KEYWORDS
            .iter()
            .map(|k| if lower.contains(k) { 1.0 } else { 0.0 })
            .collect();
        v.push(0.01);
        Ok(v)
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

/// 받은 프롬프트를 기록하고 고정 답변을 돌려주는 채팅 모델
pub struct RecordingChat {
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
    pub fail: bool,
}

impl RecordingChat {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            fail: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().ok().and_then(|p| p.last().cloned())
    }
}

#[async_trait]
impl ChatModel for RecordingChat {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        if self.fail {
            anyhow::bail!("Groq API error (503 Service Unavailable)");
        }
        Ok("stub answer".to_string())
    }

    fn model(&self) -> &str {
        "recording"
    }
}

/// 메모리의 고정 페이지를 돌려주는 URL 로더
#[derive(Default)]
pub struct StaticPages(pub HashMap<String, String>);

impl StaticPages {
    pub fn with_page(mut self, url: &str, content: &str) -> Self {
        self.0.insert(url.to_string(), content.to_string());
        self
    }
}

#[async_trait]
impl UrlLoader for StaticPages {
    async fn load(&self, url: &str) -> Result<ScrapedContent> {
        let content = self
            .0
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("HTTP 404 Not Found from {}", url))?;
        Ok(ScrapedContent {
            title: None,
            content,
            url: url.to_string(),
        })
    }
}

/// 키워드 임베딩과 고정 페이지를 가진 빈 저장소
///
/// `http://example.com`은 본문이 있고 `http://blank.example`은 공백뿐입니다.
pub fn knowledge_base() -> KnowledgeBase {
    knowledge_base_with_embedder().0
}

/// [`knowledge_base`]와 같지만 임베딩 핸들도 돌려줌
pub fn knowledge_base_with_embedder() -> (KnowledgeBase, Arc<KeywordEmbedding>) {
    let embedder = KeywordEmbedding::new();
    let pages = StaticPages::default()
        .with_page(
            "http://example.com",
            "Paris is the capital of France and sits on the Seine.",
        )
        .with_page("http://blank.example", "   ");
    let kb = KnowledgeBase::new(embedder.clone(), Arc::new(pages));
    (kb, embedder)
}

// ============================================================================
// PDF Fixture
// ============================================================================

/// 페이지마다 Helvetica 한 줄을 가진 최소 PDF
///
/// 빈 문자열은 글자 없는 텍스트 블록만 가진 페이지가 됩니다.
/// xref 오프셋은 조립하면서 계산합니다.
pub fn pdf_fixture(pages: &[&str]) -> Vec<u8> {
    const FONT_ID: usize = 3;
    let page_id = |i: usize| 4 + i * 2;

    let kids: Vec<String> = (0..pages.len())
        .map(|i| format!("{} 0 R", page_id(i)))
        .collect();

    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            pages.len()
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];

    for (i, text) in pages.iter().enumerate() {
        let content = if text.is_empty() {
            "BT ET".to_string()
        } else {
            let escaped = text
                .replace('\\', "\\\\")
                .replace('(', "\\(")
                .replace(')', "\\)");
            format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", escaped)
        };
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 {} 0 R >> >> /Contents {} 0 R >>",
            FONT_ID,
            page_id(i) + 1
        ));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            content.len(),
            content
        ));
    }

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref_start = out.len();
    out.extend_from_slice(
        format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes(),
    );
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_start
        )
        .as_bytes(),
    );
    out
}
