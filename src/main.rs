use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use topicliar::{
    api,
    config::AppConfig,
    llm,
    lock::KeyedLock,
    oracle::{LlmOracle, Oracle, ScriptedOracle},
    research::{CannedResearcher, ResearchConfig, TopicResearcher, WebResearcher},
    scanner,
    state::AppState,
    store::{MemoryBackend, Store},
};

const PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "topicliar=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting topicliar...");

    let config = AppConfig::from_env();
    let llm_config = llm::LlmConfig::from_env();
    let research_config = ResearchConfig::from_env();

    let (oracle, researcher): (Arc<dyn Oracle>, Arc<dyn TopicResearcher>) =
        match llm_config.build_provider() {
            Ok(provider) => {
                tracing::info!("LLM provider '{}' initialized", provider.name());
                let researcher = WebResearcher::new(research_config)
                    .with_summarizer(provider.clone(), llm_config.clone());
                (
                    Arc::new(LlmOracle::new(provider, llm_config)),
                    Arc::new(researcher),
                )
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to initialize LLM provider: {}. Falling back to exact-match judging.",
                    e
                );
                (
                    Arc::new(ScriptedOracle::new()),
                    Arc::new(CannedResearcher::new()),
                )
            }
        };

    let backend = Arc::new(MemoryBackend::new());
    let store = Store::new(backend.clone(), config.session_ttl);
    let state = Arc::new(
        AppState::new(store, oracle, researcher, config.game.clone())
            .with_round_lock(KeyedLock::with_pool_capacity(config.round_lock_pool)),
    );

    let scanner = scanner::spawn_inactivity_scanner(state.clone(), config.scan_interval);

    let purger = tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let purged = backend.purge_expired().await;
            if purged > 0 {
                tracing::debug!("Purged {} expired entries", purged);
            }
        }
    });

    let app = api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on http://{}", config.bind_addr);

    let listener = match tokio::net::TcpListener::bind(config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", config.bind_addr, e);
            std::process::exit(1);
        }
    };

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutting down");
        })
        .await;

    scanner.abort();
    purger.abort();

    if let Err(e) = served {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
