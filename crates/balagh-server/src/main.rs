mod cleanup;
mod config;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{Method, header::CONTENT_TYPE};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use balagh_api::sink::{SqliteMediaStore, SqliteReportSink};
use balagh_api::state::{AppState, AppStateInner};
use balagh_conversation::gemini::GeminiClient;
use balagh_conversation::pipeline::ChatPipeline;
use balagh_conversation::prompt;
use balagh_conversation::sink::ReportSink;
use balagh_conversation::store::MemoryConversationStore;
use balagh_crypto::keys::ServerKeyPair;
use balagh_db::Database;

use crate::config::ServerConfig;

const EVICTION_SWEEP_EVERY: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "balagh=debug,tower_http=debug".into()),
        )
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {e:#}");
            std::process::exit(1);
        }
    };

    let keys = match ServerKeyPair::initialize(
        config.server_public.as_deref(),
        config.server_secret.as_deref(),
    ) {
        Ok(keys) => keys,
        Err(e) => {
            eprintln!("FATAL: server key material is invalid: {e}");
            eprintln!("       Check SERVER_X25519_PRIV / SERVER_X25519_PUB and restart.");
            std::process::exit(1);
        }
    };

    let db = Arc::new(Database::open(&config.db_path)?);

    let assistant = Arc::new(GeminiClient::new(
        config.gemini_api_key.clone(),
        &config.gemini_model,
        &config.gemini_base_url,
        config.assistant_timeout,
    )?);
    info!("Assistant model: {}", config.gemini_model);

    let store = Arc::new(MemoryConversationStore::new(prompt::system_preamble()));
    let reports: Arc<dyn ReportSink> = Arc::new(SqliteReportSink::new(db.clone()));
    let pipeline = ChatPipeline::new(
        store.clone(),
        assistant,
        reports.clone(),
        config.assistant_timeout,
    );

    match config.session_idle {
        Some(max_idle) => {
            tokio::spawn(cleanup::run_eviction_loop(store, max_idle, EVICTION_SWEEP_EVERY));
            info!("Idle conversations evicted after {}s", max_idle.as_secs());
        }
        None => info!("Idle conversation eviction disabled"),
    }

    let state: AppState = Arc::new(AppStateInner {
        keys,
        pipeline,
        reports,
        media: Arc::new(SqliteMediaStore::new(db)),
        replay_window_secs: config.replay_window_secs,
        body_limit_bytes: config.body_limit_bytes,
    });

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(false);

    let app = balagh_api::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Balagh server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    tracing::warn!("Failed to install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
