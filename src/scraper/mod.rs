//! 웹 스크래퍼 모듈 - URL 콘텐츠 추출
//!
//! 페이지를 가져와 본문 텍스트만 남깁니다. 스크립트/스타일은 제외합니다.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};

/// 스크랩된 콘텐츠
#[derive(Debug, Clone)]
pub struct ScrapedContent {
    /// 페이지 제목
    pub title: Option<String>,
    /// 본문 텍스트 (HTML 태그 제거됨)
    pub content: String,
    /// 원본 URL
    pub url: String,
}

impl ScrapedContent {
    /// 제목이 있으면 머리에 붙인 문서 텍스트
    pub fn into_text(self) -> String {
        match self.title {
            Some(title) if !self.content.starts_with(&title) => {
                format!("{}\n\n{}", title, self.content)
            }
            _ => self.content,
        }
    }
}

// ============================================================================
// UrlLoader Trait
// ============================================================================

/// URL 로더 트레이트
///
/// 지식 저장소는 이 인터페이스로만 웹 페이지를 가져옵니다.
#[async_trait]
pub trait UrlLoader: Send + Sync {
    /// URL에서 텍스트 추출
    async fn load(&self, url: &str) -> Result<ScrapedContent>;
}

// ============================================================================
// WebScraper
// ============================================================================

/// 웹 스크래퍼
pub struct WebScraper {
    client: reqwest::Client,
}

impl WebScraper {
    /// 새 스크래퍼 생성
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("docchat-rag/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("HTTP 클라이언트 생성 실패")?;

        Ok(Self { client })
    }

    /// URL에서 콘텐츠 추출
    pub async fn scrape(&self, url: &str) -> Result<ScrapedContent> {
        let parsed = url::Url::parse(url).with_context(|| format!("Invalid URL: {}", url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!("Unsupported URL scheme: {}", parsed.scheme());
        }

        tracing::info!("Scraping: {}", url);

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .context("HTTP 요청 실패")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP {} from {}", status, url);
        }

        let html = response.text().await.context("응답 본문 읽기 실패")?;
        let scraped = parse_page(url, &html);

        if scraped.content.trim().is_empty() {
            anyhow::bail!("No text content extracted from {}", url);
        }

        Ok(scraped)
    }
}

#[async_trait]
impl UrlLoader for WebScraper {
    async fn load(&self, url: &str) -> Result<ScrapedContent> {
        self.scrape(url).await
    }
}

/// HTML 문서 파싱
pub fn parse_page(url: &str, html: &str) -> ScrapedContent {
    let document = Html::parse_document(html);
    ScrapedContent {
        title: extract_title(&document),
        content: extract_content(&document),
        url: url.to_string(),
    }
}

/// 제목 추출 (<title>, 없으면 <h1>)
fn extract_title(document: &Html) -> Option<String> {
    for selector_str in ["title", "h1"] {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(element) = document.select(&selector).next() {
                let title = element.text().collect::<String>().trim().to_string();
                if !title.is_empty() {
                    return Some(title);
                }
            }
        }
    }

    None
}

/// 본문 추출 (HTML 태그 제거)
fn extract_content(document: &Html) -> String {
    // 우선순위: article > main > body
    let selectors = [
        "article",
        "main",
        "[role=main]",
        ".content",
        "#content",
        "body",
    ];

    for selector_str in selectors {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(element) = document.select(&selector).next() {
                let text = extract_text_from_element(&element);
                if text.len() > 100 {
                    return text;
                }
            }
        }
    }

    // 폴백: 전체 body 텍스트
    if let Ok(selector) = Selector::parse("body") {
        if let Some(element) = document.select(&selector).next() {
            return extract_text_from_element(&element);
        }
    }

    String::new()
}

/// 요소에서 텍스트 추출 (스크립트/스타일/noscript 제외)
fn extract_text_from_element(element: &scraper::ElementRef) -> String {
    let mut text = String::new();

    for node in element.descendants() {
        let Some(t) = node.value().as_text() else {
            continue;
        };

        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| matches!(e.name(), "script" | "style" | "noscript"))
        });
        if hidden {
            continue;
        }

        let trimmed = t.trim();
        if !trimmed.is_empty() {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(trimmed);
        }
    }

    // 연속 공백 정리
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
