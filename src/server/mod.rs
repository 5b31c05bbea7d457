//! 웹 UI 서버
//!
//! axum 라우터 하나에 업로드/채팅/통계 페이지를 올립니다.
//! 세션은 프로세스당 하나이고 `tokio::sync::Mutex`로 요청을 직렬화합니다.
//!
//! | 경로 | 설명 |
//! |---|---|
//! | `GET /` | `/chat`으로 리다이렉트 |
//! | `GET /upload` | 파일/URL 업로드 폼, 저장소 상태 |
//! | `POST /upload/files` | multipart 파일 업로드 (.txt, .pdf) |
//! | `POST /upload/url` | URL 수집 |
//! | `POST /clear` | 지식 저장소 초기화 |
//! | `GET /chat`, `POST /chat` | 대화 |
//! | `GET /stats` | 출처별 검색 횟수 차트 |
//! | `GET /health` | 헬스 체크 |
//! | `GET /api/stats` | 통계 JSON |

pub mod pages;

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    response::{Html, Redirect},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::session::{RagSession, SessionStats};

use pages::Flash;

/// 핸들러 공유 상태
#[derive(Clone)]
pub struct AppState {
    session: Arc<Mutex<RagSession>>,
}

impl AppState {
    pub fn new(session: RagSession) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
        }
    }
}

/// 라우터 구성
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    // JSON 엔드포인트를 다른 오리진의 스크립트에서 읽을 수 있도록
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(|| async { Redirect::to("/chat") }))
        .route("/upload", get(handle_upload_page))
        .route(
            "/upload/files",
            post(handle_upload_files).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/upload/url", post(handle_upload_url))
        .route("/clear", post(handle_clear))
        .route("/chat", get(handle_chat_page).post(handle_ask))
        .route("/stats", get(handle_stats_page))
        .route("/health", get(handle_health))
        .route("/api/stats", get(handle_api_stats))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 서버 실행 (종료 시그널까지 블록)
pub async fn run_server(config: &ServerConfig, session: RagSession) -> anyhow::Result<()> {
    let app = router(AppState::new(session), config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    tracing::info!("Web UI listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Upload
// ============================================================================

async fn handle_upload_page(State(state): State<AppState>) -> Html<String> {
    let session = state.session.lock().await;
    Html(pages::upload_page(&session.stats(), &[]))
}

/// 업로드 본문이 깨졌거나 한도를 넘으면 그때까지의 결과와 함께 에러를 표시
async fn handle_upload_files(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Html<String> {
    let mut flashes = Vec::new();
    let mut session = state.session.lock().await;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Failed to read multipart field: {}", e);
                flashes.push(Flash::Error(format!("Failed to read upload: {}", e)));
                break;
            }
        };

        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        if filename.is_empty() {
            continue;
        }

        let data = match field.bytes().await {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!("Failed to read upload {}: {}", filename, e);
                flashes.push(Flash::Error(format!(
                    "Failed to process {}: {}",
                    filename, e
                )));
                break;
            }
        };

        let size_kb = data.len() as f64 / 1024.0;
        tracing::info!("Processing upload: {} ({} bytes)", filename, data.len());

        if session.process_bytes(&filename, data.to_vec()).await {
            flashes.push(Flash::Success(format!(
                "Successfully processed {} ({:.1}KB)",
                filename, size_kb
            )));
        } else {
            flashes.push(Flash::Error(format!("Failed to process {}", filename)));
        }
    }

    if flashes.is_empty() {
        flashes.push(Flash::Info("No files selected".to_string()));
    }

    Html(pages::upload_page(&session.stats(), &flashes))
}

#[derive(Debug, Deserialize)]
struct UrlForm {
    url: String,
}

async fn handle_upload_url(
    State(state): State<AppState>,
    Form(form): Form<UrlForm>,
) -> Html<String> {
    let url = form.url.trim();
    let mut session = state.session.lock().await;

    let flash = if url.is_empty() {
        Flash::Error("Please enter a URL".to_string())
    } else if session.process_url(url).await {
        Flash::Success(format!("Successfully processed URL: {}", url))
    } else {
        Flash::Error(format!("Failed to process URL: {}", url))
    };

    Html(pages::upload_page(&session.stats(), &[flash]))
}

async fn handle_clear(State(state): State<AppState>) -> Html<String> {
    let mut session = state.session.lock().await;
    session.clear_knowledge_base();

    Html(pages::upload_page(
        &session.stats(),
        &[Flash::Success("Knowledge base cleared!".to_string())],
    ))
}

// ============================================================================
// Chat
// ============================================================================

async fn handle_chat_page(State(state): State<AppState>) -> Html<String> {
    let session = state.session.lock().await;
    Html(pages::chat_page(&session.stats(), session.history(), None))
}

#[derive(Debug, Deserialize)]
struct AskForm {
    question: String,
}

async fn handle_ask(State(state): State<AppState>, Form(form): Form<AskForm>) -> Html<String> {
    let question = form.question.trim();
    let mut session = state.session.lock().await;

    let error = if question.is_empty() {
        None
    } else {
        match session.ask(question).await {
            Ok(_) => None,
            Err(e) => {
                tracing::error!("Question failed ({}): {}", e.kind(), e);
                Some(e.to_string())
            }
        }
    };

    Html(pages::chat_page(
        &session.stats(),
        session.history(),
        error.as_deref(),
    ))
}

// ============================================================================
// Stats
// ============================================================================

async fn handle_stats_page(State(state): State<AppState>) -> Html<String> {
    let session = state.session.lock().await;
    let rows = session.tally().by_label();
    Html(pages::stats_page(&session.stats(), &rows))
}

#[derive(Serialize)]
struct StatsResponse {
    #[serde(flatten)]
    stats: SessionStats,
    labels: Vec<LabelEntry>,
    model: String,
    embedder: String,
}

#[derive(Serialize)]
struct LabelEntry {
    source: String,
    label: String,
}

async fn handle_api_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let session = state.session.lock().await;
    let stats = session.stats();
    let labels = pages::chart_labels(&stats)
        .into_iter()
        .map(|(source, label)| LabelEntry { source, label })
        .collect();

    Json(StatsResponse {
        stats,
        labels,
        model: session.model().to_string(),
        embedder: session.embedder_name().to_string(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryEngine;
    use crate::test_support::{knowledge_base, RecordingChat};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app() -> Router {
        app_with_limit(1024 * 1024)
    }

    fn app_with_limit(max_upload_bytes: usize) -> Router {
        let session = RagSession::new(knowledge_base(), QueryEngine::new(RecordingChat::new()));
        router(AppState::new(session), max_upload_bytes)
    }

    fn multipart_request(boundary: &str, body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/upload/files")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .expect("request")
    }

    async fn body_text(response: Response) -> String {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        String::from_utf8(bytes.to_vec()).expect("utf8")
    }

    fn form(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request")
    }

    fn multipart(files: &[(&str, &str)]) -> Request<Body> {
        let boundary = "XBOUNDARYX";
        let mut body = String::new();
        for (name, content) in files {
            body.push_str(&format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n{content}\r\n"
            ));
        }
        body.push_str(&format!("--{boundary}--\r\n"));

        multipart_request(boundary, body)
    }

    #[tokio::test]
    async fn test_root_redirects_to_chat() {
        let response = app().oneshot(get("/")).await.expect("response");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(header::LOCATION).expect("location"),
            "/chat"
        );
    }

    #[tokio::test]
    async fn test_health() {
        let response = app().oneshot(get("/health")).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value =
            serde_json::from_str(&body_text(response).await).expect("json");
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_upload_files_reports_each_file() {
        let response = app()
            .oneshot(multipart(&[
                ("doc1.txt", "Rust ownership and borrowing."),
                ("deck.pptx", "slides"),
            ]))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let html = body_text(response).await;
        assert!(html.contains("Successfully processed doc1.txt (0.0KB)"));
        assert!(html.contains("Failed to process deck.pptx"));
        assert!(html.contains("Total documents in knowledge base: 1"));
    }

    #[tokio::test]
    async fn test_truncated_upload_keeps_earlier_results() {
        // 두 번째 파트가 닫는 경계 없이 끝남
        let body = "--XBOUNDARYX\r\nContent-Disposition: form-data; name=\"files\"; filename=\"a.txt\"\r\n\
                    Content-Type: text/plain\r\n\r\nRust ownership.\r\n\
                    --XBOUNDARYX\r\nContent-Disposition: form-data; name=\"files\"; filename=\"b.txt\"\r\n\
                    Content-Type: text/plain\r\n\r\nthis part never ends"
            .to_string();

        let response = app()
            .oneshot(multipart_request("XBOUNDARYX", body))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).expect("type"),
            "text/html; charset=utf-8"
        );

        let html = body_text(response).await;
        assert!(html.contains("Successfully processed a.txt"));
        assert!(html.contains("<div class=\"flash error\">Failed to "));
        assert!(html.contains("Total documents in knowledge base: 1"));
    }

    #[tokio::test]
    async fn test_oversized_upload_renders_error_page() {
        let content = "rust ".repeat(100);
        let response = app_with_limit(64)
            .oneshot(multipart(&[("big.txt", content.as_str())]))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let html = body_text(response).await;
        assert!(html.contains("<div class=\"flash error\">Failed to "));
        assert!(!html.contains("bad_request"));
        assert!(html.contains("name=\"files\""));
        assert!(html.contains("Total documents in knowledge base: 0"));
    }

    #[tokio::test]
    async fn test_chat_flow_and_stats() {
        let app = app();

        let response = app
            .clone()
            .oneshot(form("/upload/url", "url=http%3A%2F%2Fexample.com"))
            .await
            .expect("response");
        let html = body_text(response).await;
        assert!(html.contains("Successfully processed URL: http://example.com"));

        let response = app
            .clone()
            .oneshot(form("/chat", "question=Where+is+Paris%3F"))
            .await
            .expect("response");
        let html = body_text(response).await;
        assert!(html.contains("Where is Paris?"));
        assert!(html.contains("stub answer"));
        assert!(html.contains("Source: URL: http://example.com"));

        let response = app
            .clone()
            .oneshot(get("/api/stats"))
            .await
            .expect("response");
        let json: serde_json::Value =
            serde_json::from_str(&body_text(response).await).expect("json");
        assert_eq!(json["document_count"], 1);
        assert_eq!(json["retrievals"]["URL: http://example.com"], 1);
        assert_eq!(json["labels"][0]["label"], "URL: example.com");

        let response = app.oneshot(get("/stats")).await.expect("response");
        let html = body_text(response).await;
        assert!(html.contains("URL: example.com"));
        assert!(!html.contains("No retrieval data yet"));
    }

    #[tokio::test]
    async fn test_ask_on_empty_store_renders_error() {
        let response = app()
            .oneshot(form("/chat", "question=anything"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        // 문서가 없으면 업로드 안내만 표시
        assert!(html.contains("Please upload some documents"));
    }

    #[tokio::test]
    async fn test_clear_resets_counts() {
        let app = app();
        app.clone()
            .oneshot(multipart(&[("a.txt", "rust")]))
            .await
            .expect("response");

        let response = app
            .clone()
            .oneshot(form("/clear", ""))
            .await
            .expect("response");
        let html = body_text(response).await;
        assert!(html.contains("Knowledge base cleared!"));
        assert!(html.contains("Total documents in knowledge base: 0"));
    }
}
