use std::sync::Arc;

use clap::Parser;

use tandem_session::server;
use tandem_session::state::{CoordinatorConfig, CoordinatorState};
use tandem_session::store::InMemoryDocumentStore;

// ── CLI Arguments ─────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "tandem-session", version, about = "Tandem live session coordinator")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = 8080, env = "PORT")]
    port: u16,

    /// Maximum messages kept per chat log
    #[arg(long, default_value_t = 100, env = "CHAT_HISTORY_LIMIT")]
    chat_history_limit: usize,

    /// Frontend origin allowed by CORS (any origin when unset)
    #[arg(long, env = "FRONTEND_URL")]
    frontend_origin: Option<String>,
}

// ── Entry Point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tandem_session=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();

    let config = CoordinatorConfig {
        port: args.port,
        chat_history_limit: args.chat_history_limit,
        frontend_origin: args.frontend_origin,
    };

    let documents = Arc::new(InMemoryDocumentStore::new());
    let state = CoordinatorState::new(config, documents);
    let app = server::router(state);

    let addr = format!("0.0.0.0:{}", args.port);
    tracing::info!("Tandem session coordinator starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
