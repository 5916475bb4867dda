//! Ragwise HTTP gateway
//!
//! The entry point for all external requests.
//! Handles:
//! - Question turns, blocking and streamed as server-sent events
//! - Document and URL ingestion into the shared store
//! - Rate limiting and concurrency limits
//! - Observability (logging, metrics)

mod handlers;
mod middleware;

#[cfg(test)]
mod tests;

use anyhow::Context;
use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use ragwise_agent::Agent;
use ragwise_common::{
    config::AppConfig,
    embeddings::create_embedder,
    errors::Result,
    llm::create_completion_service,
    metrics, telemetry,
};
use ragwise_ingestion::Ingestor;
use ragwise_search::{create_web_search, DocumentStore, InMemoryVectorStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use crate::middleware::rate_limit::RateLimit;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub agent: Arc<Agent>,
    pub ingestor: Arc<Ingestor>,
    pub store: Arc<dyn DocumentStore>,
    pub rate_limit: Option<RateLimit>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        agent: Arc<Agent>,
        ingestor: Arc<Ingestor>,
        store: Arc<dyn DocumentStore>,
    ) -> Result<Self> {
        let rate_limit = RateLimit::from_config(&config.rate_limit)?;
        Ok(Self {
            config: Arc::new(config),
            agent,
            ingestor,
            store,
            rate_limit,
        })
    }

    /// Wire the store, completion service, web search, agent and ingestor
    fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let embedder = create_embedder(&config.embedding).context("embedding service")?;
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryVectorStore::new(embedder));
        let llm = create_completion_service(&config.llm).context("completion service")?;
        let web_search = create_web_search(&config.web_search).context("web search provider")?;

        let agent = Arc::new(Agent::new(
            llm,
            store.clone(),
            web_search,
            config.agent.clone(),
            config.store.top_k,
        ));
        let ingestor = Arc::new(Ingestor::new(store.clone(), &config.ingestion).context("ingestor")?);

        Ok(Self::new(config, agent, ingestor, store)?)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("failed to load configuration")?;
    telemetry::init_tracing(&config.observability);
    config.validate()?;

    info!(
        version = ragwise_common::VERSION,
        service = %config.observability.service_name,
        "Starting Ragwise gateway"
    );

    if config.observability.metrics_port != 0 {
        let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .install()
            .context("failed to install Prometheus exporter")?;
        info!(%metrics_addr, "Prometheus exporter listening");
    }
    metrics::register_metrics();

    let state = AppState::from_config(config)?;
    spawn_seed_ingestion(&state);

    let addr: SocketAddr = format!("{}:{}", state.config.server.host, state.config.server.port)
        .parse()
        .context("invalid server address")?;
    let app = create_router(state);

    info!(%addr, "Listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Index the configured seed URLs without holding up startup
fn spawn_seed_ingestion(state: &AppState) {
    let urls = state.config.ingestion.seed_urls.clone();
    if urls.is_empty() {
        return;
    }

    let ingestor = state.ingestor.clone();
    tokio::spawn(async move {
        match ingestor.ingest_urls(&urls).await {
            Ok(report) => {
                for failed in &report.failed {
                    warn!(source = %failed.source, error = %failed.error, "Seed source skipped");
                }
                info!(
                    sources = report.sources,
                    chunks = report.chunks_indexed,
                    "Seed ingestion finished"
                );
            }
            Err(e) => error!(error = %e, "Seed ingestion failed"),
        }
    });
}

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let api_routes = Router::new()
        .route("/ask", post(handlers::ask::ask))
        .route("/ask/stream", post(handlers::ask::ask_stream))
        .route("/documents", post(handlers::documents::ingest_documents))
        .route("/documents/urls", post(handlers::documents::ingest_urls))
        .route("/graph", get(handlers::graph::graph));

    let api_routes = match state.rate_limit.clone() {
        Some(limit) => api_routes.layer(from_fn_with_state(limit, middleware::rate_limit::rate_limit)),
        None => api_routes,
    };

    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/v1", api_routes)
        .layer(from_fn(middleware::metrics::track_requests))
        .layer(GlobalConcurrencyLimitLayer::new(
            state.config.server.max_concurrent_requests.max(1),
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown"),
        _ = terminate => info!("Received SIGTERM, starting shutdown"),
    }
}
