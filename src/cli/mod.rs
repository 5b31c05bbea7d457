//! CLI 모듈
//!
//! docchat-rag 명령어 정의 및 구현
//!
//! 지식 저장소는 프로세스 메모리에만 있으므로 `ingest`와 `ask`는
//! 같은 실행 안에서 입력을 수집한 뒤 동작합니다.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};

use crate::config::AppConfig;
use crate::server;
use crate::session::{display_label, RagSession};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "docchat-rag")]
#[command(version, about = "문서/웹 페이지 기반 질의응답 (RAG)", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 웹 UI 서버 실행
    Serve {
        /// 바인드 주소 (기본: RAG_BIND 또는 127.0.0.1:8501)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// 파일, URL, 텍스트를 수집하고 결과 출력
    Ingest {
        #[command(flatten)]
        inputs: IngestArgs,
    },

    /// 입력을 수집한 뒤 질문
    Ask {
        /// 질문
        question: String,

        #[command(flatten)]
        inputs: IngestArgs,

        /// 근거 청크 내용까지 출력
        #[arg(long)]
        show_chunks: bool,
    },

    /// 설정 및 API 키 상태 확인
    Status,
}

/// 수집 입력
#[derive(Args, Debug, Default, Clone)]
pub struct IngestArgs {
    /// 수집할 파일 (.txt, .pdf), 여러 번 지정 가능
    #[arg(short, long)]
    pub file: Vec<PathBuf>,

    /// 수집할 URL, 여러 번 지정 가능
    #[arg(short, long)]
    pub url: Vec<String>,

    /// 직접 입력할 텍스트
    #[arg(short, long)]
    pub text: Option<String>,
}

impl IngestArgs {
    fn is_empty(&self) -> bool {
        self.file.is_empty() && self.url.is_empty() && self.text.is_none()
    }
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::from_env()?;

    match cli.command {
        Commands::Serve { bind } => cmd_serve(config, bind).await,
        Commands::Ingest { inputs } => cmd_ingest(&config, &inputs).await,
        Commands::Ask {
            question,
            inputs,
            show_chunks,
        } => cmd_ask(&config, &question, &inputs, show_chunks).await,
        Commands::Status => cmd_status(&config),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 웹 UI 서버 (serve)
async fn cmd_serve(mut config: AppConfig, bind: Option<String>) -> Result<()> {
    if let Some(bind) = bind {
        config.server.bind = bind;
    }

    let session = RagSession::from_config(&config)?;
    println!("[*] 웹 UI: http://{}", config.server.bind);

    server::run_server(&config.server, session).await
}

/// 문서 수집 명령어 (ingest)
async fn cmd_ingest(config: &AppConfig, inputs: &IngestArgs) -> Result<()> {
    if inputs.is_empty() {
        bail!("--file, --url, --text 중 하나 이상을 지정해야 합니다");
    }

    let mut session = RagSession::from_config(config)?;
    let (success, failed) = ingest_all(&mut session, inputs).await;

    let stats = session.stats();
    println!();
    println!("[OK] 완료: 성공 {}, 실패 {}", success, failed);
    println!(
        "     문서 {} 건, 청크 {} 개",
        stats.document_count, stats.chunk_count
    );
    for source in &stats.sources {
        println!("     - {}", source);
    }

    Ok(())
}

/// 질문 명령어 (ask)
async fn cmd_ask(
    config: &AppConfig,
    question: &str,
    inputs: &IngestArgs,
    show_chunks: bool,
) -> Result<()> {
    if !config.has_llm_key() {
        bail!(
            "GROQ_API_KEY가 설정되지 않았습니다.\n\n\
             설정 방법:\n  \
             export GROQ_API_KEY=your-api-key\n  \
             또는 .env 파일에 GROQ_API_KEY=... 추가"
        );
    }

    let mut session = RagSession::from_config(config)?;
    if !inputs.is_empty() {
        let (success, failed) = ingest_all(&mut session, inputs).await;
        println!("[*] 수집: 성공 {}, 실패 {}", success, failed);
    }

    println!("[*] 질문 중: \"{}\"", question);

    let turn = session.ask(question).await?;

    println!();
    println!("{}", turn.answer);
    println!();
    println!("[*] 출처 ({} 청크):", turn.sources.len());

    for (i, chunk) in turn.sources.iter().enumerate() {
        let page = chunk
            .page
            .map(|p| format!(" (page {})", p))
            .unwrap_or_default();
        println!("  {}. {}{}", i + 1, display_label(&chunk.source), page);
        if show_chunks {
            println!("     {}", truncate_text(&chunk.text, 200));
        }
    }

    Ok(())
}

/// 상태 명령어 (status)
fn cmd_status(config: &AppConfig) -> Result<()> {
    println!("docchat-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();

    if config.has_llm_key() {
        println!("[OK] GROQ_API_KEY: 설정됨");
    } else {
        println!("[!] GROQ_API_KEY: 미설정");
        println!("    설정: export GROQ_API_KEY=your-key");
    }

    println!("[*] 생성 모델: {} ({})", config.llm.model, config.llm.base_url);
    println!(
        "[*] 임베딩: {:?} / {} ({})",
        config.embedding.backend, config.embedding.model, config.embedding.base_url
    );
    println!("[*] 웹 UI 바인드: {}", config.server.bind);
    println!(
        "[*] 업로드 한도: {}, HTTP 타임아웃: {:?}",
        format_bytes(config.server.max_upload_bytes),
        config.llm.timeout
    );

    Ok(())
}

/// 모든 입력 수집 (성공, 실패 개수)
async fn ingest_all(session: &mut RagSession, inputs: &IngestArgs) -> (usize, usize) {
    let mut success = 0;
    let mut failed = 0;
    let total = inputs.file.len() + inputs.url.len() + usize::from(inputs.text.is_some());
    let mut step = 0;

    for path in &inputs.file {
        step += 1;
        let name = file_display_name(path);
        let size = std::fs::metadata(path).map(|m| m.len() as usize).unwrap_or(0);
        print!("[{}/{}] {} ({})... ", step, total, name, format_bytes(size));

        if session.process_file(path, &name).await {
            println!("완료");
            success += 1;
        } else {
            println!("실패");
            failed += 1;
        }
    }

    for url in &inputs.url {
        step += 1;
        print!("[{}/{}] {}... ", step, total, url);

        if session.process_url(url).await {
            println!("완료");
            success += 1;
        } else {
            println!("실패");
            failed += 1;
        }
    }

    if let Some(ref text) = inputs.text {
        step += 1;
        print!("[{}/{}] direct-input... ", step, total);

        if session.process_text("direct-input", text).await {
            println!("완료");
            success += 1;
        } else {
            println!("실패");
            failed += 1;
        }
    }

    (success, failed)
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 파일 출처 라벨 (파일 이름, 없으면 경로 전체)
fn file_display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================
