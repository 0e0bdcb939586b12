use std::sync::Arc;

use study_coach::api::{AppState, app_routes};
use study_coach::chat::{ChatConfig, ChatService, SessionLocks};
use study_coach::config::AppConfig;
use study_coach::llm::{LlmConfig, create_provider};
use study_coach::schedule::ScheduleService;
use study_coach::store::{Database, LibSqlBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export OPENROUTER_API_KEY=sk-or-...");
        std::process::exit(1);
    });

    eprintln!("📚 Study Coach v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.model);
    eprintln!("   API base: {}", config.api_base);
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!("   HTTP: http://0.0.0.0:{}/", config.port);

    // ── LLM ─────────────────────────────────────────────────────────────
    let llm = create_provider(&LlmConfig::from(&config))?;

    // ── Database ────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .unwrap_or_else(|e| {
                eprintln!(
                    "Error: Failed to open database at {}: {}",
                    config.db_path.display(),
                    e
                );
                std::process::exit(1);
            }),
    );

    // ── Services ────────────────────────────────────────────────────────
    let locks = Arc::new(SessionLocks::new());
    let chat = ChatService::new(
        Arc::clone(&db),
        Arc::clone(&llm),
        Arc::clone(&locks),
        ChatConfig {
            system_prompt: config.system_prompt.clone(),
            history_window: config.history_window,
        },
    );
    let schedule = ScheduleService::new(Arc::clone(&db), llm, config.system_prompt.clone());

    let app = app_routes(AppState {
        db,
        chat: Arc::new(chat),
        schedule: Arc::new(schedule),
        locks,
    });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, model = %config.model, "HTTP server started");
    axum::serve(listener, app).await?;

    Ok(())
}
