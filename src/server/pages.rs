//! 서버 렌더링 HTML 페이지
//!
//! 템플릿 엔진 없이 문자열로 조립합니다. 사용자 입력과 문서 내용은
//! 모두 [`escape_html`]을 거칩니다.

use std::fmt::Write;

use crate::session::{display_label, ChatHistory, SessionStats};

/// 업로드 결과 메시지
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flash {
    Success(String),
    Error(String),
    Info(String),
}

impl Flash {
    fn class(&self) -> &'static str {
        match self {
            Flash::Success(_) => "flash success",
            Flash::Error(_) => "flash error",
            Flash::Info(_) => "flash info",
        }
    }

    fn message(&self) -> &str {
        match self {
            Flash::Success(m) | Flash::Error(m) | Flash::Info(m) => m,
        }
    }
}

/// 최소한의 HTML 이스케이프
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; margin: 0; display: flex; min-height: 100vh; }
nav { width: 200px; background: #f0f2f6; padding: 1.5rem 1rem; }
nav a { display: block; padding: .4rem .6rem; color: #262730; text-decoration: none; border-radius: 4px; }
nav a.active { background: #ff4b4b; color: white; }
main { flex: 1; padding: 2rem 3rem; max-width: 900px; }
.flash { padding: .6rem 1rem; border-radius: 4px; margin: .4rem 0; }
.flash.success { background: #e6f4ea; color: #1e4620; }
.flash.error { background: #fdecea; color: #611a15; }
.flash.info { background: #e8f0fe; color: #174ea6; }
.turn { margin: 1rem 0; }
.bubble { padding: .7rem 1rem; border-radius: 6px; white-space: pre-wrap; }
.bubble.user { background: #f0f2f6; }
.bubble.assistant { background: #fff8e1; }
.metric { font-size: 2rem; font-weight: 600; }
.bar-row { display: flex; align-items: center; margin: .3rem 0; }
.bar-label { width: 220px; font-size: .9rem; overflow: hidden; }
.bar { background: #ff4b4b; height: 1.2rem; border-radius: 3px; }
.bar-count { margin-left: .5rem; font-size: .9rem; }
form { margin: 1rem 0; }
input[type=text], input[type=url] { width: 70%; padding: .4rem; }
"#;

fn layout(active: &str, title: &str, body: &str) -> String {
    let mut nav = String::new();
    for (href, label) in [("/upload", "Upload"), ("/chat", "Chat"), ("/stats", "Statistics")] {
        let class = if href == active { " class=\"active\"" } else { "" };
        let _ = write!(nav, "<a href=\"{}\"{}>{}</a>", href, class, label);
    }

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title} - Document Chat</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
         <nav><h3>Navigation</h3>{nav}</nav>\n<main>\n<h1>{title}</h1>\n{body}\n</main>\n</body>\n</html>\n"
    )
}

fn render_flashes(flashes: &[Flash]) -> String {
    flashes
        .iter()
        .map(|f| {
            format!(
                "<div class=\"{}\">{}</div>",
                f.class(),
                escape_html(f.message())
            )
        })
        .collect()
}

fn render_sources(stats: &SessionStats) -> String {
    if stats.sources.is_empty() {
        return String::new();
    }

    let mut html = String::from("<h3>Sources</h3>\n<ul>");
    for source in &stats.sources {
        let _ = write!(html, "<li>{}</li>", escape_html(source));
    }
    html.push_str("</ul>\n");
    html
}

// ============================================================================
// Pages
// ============================================================================

/// 업로드 페이지
pub fn upload_page(stats: &SessionStats, flashes: &[Flash]) -> String {
    let mut body = render_flashes(flashes);

    body.push_str(
        r#"<h2>Upload Documents</h2>
<form action="/upload/files" method="post" enctype="multipart/form-data">
<input type="file" name="files" accept=".txt,.pdf" multiple>
<button type="submit">Process Files</button>
</form>
<h2>Add Web Content</h2>
<form action="/upload/url" method="post">
<input type="url" name="url" placeholder="https://example.com/article" required>
<button type="submit">Process URL</button>
</form>
"#,
    );

    let _ = write!(
        body,
        "<h2>Knowledge Base Status</h2>\n<p>Total documents in knowledge base: {}</p>\n",
        stats.document_count
    );
    body.push_str(&render_sources(stats));
    body.push_str(
        r#"<form action="/clear" method="post"><button type="submit">Clear Knowledge Base</button></form>"#,
    );

    layout("/upload", "Document Upload", &body)
}

/// 채팅 페이지
pub fn chat_page(stats: &SessionStats, history: &ChatHistory, error: Option<&str>) -> String {
    let mut body = String::new();

    if stats.document_count == 0 {
        body.push_str(
            "<div class=\"flash info\">Please upload some documents or add web content first!</div>\n\
             <p><a href=\"/upload\">Go to Upload</a></p>",
        );
        return layout("/chat", "Chat with Your Documents", &body);
    }

    for turn in history.turns() {
        let _ = write!(
            body,
            "<div class=\"turn\">\n<div class=\"bubble user\"><strong>You:</strong> {}</div>\n\
             <div class=\"bubble assistant\"><strong>Assistant:</strong> {}</div>\n",
            escape_html(&turn.question),
            escape_html(&turn.answer)
        );
        if !turn.sources.is_empty() {
            body.push_str("<details><summary>View Sources</summary><ul>");
            for chunk in &turn.sources {
                let page = chunk
                    .page
                    .map(|p| format!(" (page {})", p))
                    .unwrap_or_default();
                let _ = write!(
                    body,
                    "<li>Source: {}{}</li>",
                    escape_html(&chunk.source),
                    page
                );
            }
            body.push_str("</ul></details>\n");
        }
        body.push_str("</div>\n");
    }

    if let Some(error) = error {
        let _ = write!(
            body,
            "<div class=\"flash error\">Error: {}</div>\n",
            escape_html(error)
        );
    }

    body.push_str(
        r#"<form action="/chat" method="post">
<input type="text" name="question" placeholder="Ask a question about your documents" required autofocus>
<button type="submit">Ask</button>
</form>"#,
    );

    layout("/chat", "Chat with Your Documents", &body)
}

/// 통계 페이지 (순수 HTML/CSS 가로 막대 차트)
pub fn stats_page(stats: &SessionStats, rows: &[(String, usize)]) -> String {
    let mut body = format!(
        "<h2>Document Statistics</h2>\n<div>Total Documents</div>\n<div class=\"metric\">{}</div>\n",
        stats.document_count
    );
    body.push_str(&render_sources(stats));

    body.push_str("<h2>Document Retrieval Frequency</h2>\n");
    if rows.is_empty() {
        body.push_str(
            "<div class=\"flash info\">No retrieval data yet. Start chatting to generate statistics!</div>",
        );
        return layout("/stats", "System Statistics", &body);
    }

    let max = rows.iter().map(|(_, c)| *c).max().unwrap_or(1).max(1);
    for (label, count) in rows {
        let width = (*count as f64 / max as f64 * 100.0).round();
        let _ = write!(
            body,
            "<div class=\"bar-row\"><span class=\"bar-label\" title=\"{label}\">{label}</span>\
             <span class=\"bar\" style=\"width: {width}%\"></span>\
             <span class=\"bar-count\">{count}</span></div>\n",
            label = escape_html(label),
            width = width,
            count = count
        );
    }

    layout("/stats", "System Statistics", &body)
}

/// 통계 JSON의 차트 라벨
pub fn chart_labels(stats: &SessionStats) -> Vec<(String, String)> {
    stats
        .sources
        .iter()
        .map(|s| (s.clone(), display_label(s)))
        .collect()
}
