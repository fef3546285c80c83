use axum::{http::HeaderValue, middleware, Router};
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use crate::{
    middleware::{access_log_middleware, request_id_middleware, RequestSpan},
    routes::create_routes,
    AppState, ServerConfig,
};

pub struct CidServer {
    pub app: Router,
    pub addr: SocketAddr,
}

impl CidServer {
    pub fn new(config: ServerConfig) -> anyhow::Result<Self> {
        let addr = config.socket_addr()?;
        let state = AppState::new(config)?;
        Ok(Self::with_state(state, addr))
    }

    pub fn with_state(state: AppState, addr: SocketAddr) -> Self {
        Self {
            app: build_app(state),
            addr,
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        info!("Starting CID server on {}", listener.local_addr()?);

        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(Into::into)
    }
}

/// Routes plus the middleware stack; the request id is assigned before the
/// trace span opens so the span can carry it.
pub fn build_app(state: AppState) -> Router {
    let config = state.config.clone();

    create_routes(state)
        .layer(cors_layer(&config.cors_origins))
        .layer(RequestBodyLimitLayer::new(config.max_request_size))
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout)))
        .layer(middleware::from_fn(access_log_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(RequestSpan))
        .layer(middleware::from_fn(request_id_middleware))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|origin| origin == "*") {
        AllowOrigin::from(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("Ignoring invalid CORS origin {origin:?}");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

// Graceful shutdown handler
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received shutdown signal");
}
