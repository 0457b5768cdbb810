mod config;
mod metrics;
mod ranking;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use gravitalia_api::middleware::TokenVerifier;
use gravitalia_api::snowflake::Snowflake;
use gravitalia_api::upstream::{HttpMedia, HttpOAuth, HttpSearch};
use gravitalia_api::{AppState, AppStateInner, OAuthLinks};
use gravitalia_db::{Cache, GraphRepo, Memgraph, MemoryCache, MemoryGraph, RedisCache};
use gravitalia_gateway::Dispatcher;

use crate::config::Config;
use crate::metrics::Metrics;

/// Five base64 images plus the JSON around them.
const BODY_LIMIT: usize = 64 * 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "gravitalia_server=debug,gravitalia_api=debug,gravitalia_db=debug,gravitalia_gateway=debug,tower_http=debug".into()
            }),
        )
        .init();

    let config = Config::from_env()?;

    let graph: Arc<dyn GraphRepo> = if config.uses_memory_graph() {
        warn!("Using the in-memory graph, data is lost on restart");
        Arc::new(MemoryGraph::new())
    } else {
        Arc::new(
            Memgraph::connect(
                &config.graph_url,
                &config.graph_username,
                &config.graph_password,
            )
            .await?,
        )
    };
    let cache: Arc<dyn Cache> = if config.uses_memory_cache() {
        warn!("Using the in-memory cache");
        Arc::new(MemoryCache::new())
    } else {
        Arc::new(RedisCache::connect(&config.cache_url).await?)
    };

    let tokens = match &config.rsa_public_key {
        Some(pem) => TokenVerifier::from_rsa_pem(pem)?,
        None => TokenVerifier::from_secret(&config.jwt_secret),
    };
    if config.global_auth.is_empty() {
        warn!("GLOBAL_AUTH is empty, admin routes are disabled");
    }

    let client = reqwest::Client::new();
    let state: AppState = Arc::new(AppStateInner {
        graph: graph.clone(),
        cache,
        media: Arc::new(HttpMedia::new(
            client.clone(),
            &config.tagger_url,
            &config.uploader_url,
        )),
        search: Arc::new(HttpSearch::new(
            client.clone(),
            &config.search_url,
            &config.search_auth,
        )),
        oauth: Arc::new(HttpOAuth::new(
            client,
            &config.oauth_api,
            &config.oauth_client_id,
            &config.oauth_secret,
            &config.redirect_url,
        )),
        tokens,
        dispatcher: Dispatcher::new(),
        ids: Snowflake::new(config.region_id, config.worker_id),
        global_auth: config.global_auth.clone(),
        links: OAuthLinks {
            oauth_host: config.oauth_host.clone(),
            client_id: config.oauth_client_id.clone(),
            redirect_url: config.redirect_url.clone(),
            frontend_url: config.frontend_url.clone(),
        },
    });

    tokio::spawn(ranking::run_ranking_loop(graph));

    let app = metrics::instrument(gravitalia_api::router(state), Metrics::new())
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Gravitalia listening on {}", addr);

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
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
