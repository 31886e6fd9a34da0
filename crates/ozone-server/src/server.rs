use std::{net::SocketAddr, sync::Arc};

use axum::{Router, middleware};
use ozone_auth::{Gateway, GatewayState, router, spawn_cleanup_task};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    config::AppConfig,
    middleware::{RequestId, request_id},
};

pub struct OzoneServer {
    addr: SocketAddr,
    config: AppConfig,
    gateway: Arc<Gateway>,
    app: Router,
}

/// Wire the gateway from the `auth` section of the configuration.
pub fn build_gateway(cfg: &AppConfig) -> anyhow::Result<Arc<Gateway>> {
    let gateway = Gateway::from_config(&cfg.auth, cfg.request_timeout())?;
    Ok(Arc::new(gateway))
}

pub fn build_app(cfg: &AppConfig) -> anyhow::Result<Router> {
    Ok(build_app_with_gateway(build_gateway(cfg)?))
}

pub fn build_app_with_gateway(gateway: Arc<Gateway>) -> Router {
    router(GatewayState::new(gateway))
        // Middleware stack (order: request id -> cors -> trace)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    let req_id = req
                        .extensions()
                        .get::<RequestId>()
                        .map(|id| id.as_str().to_string())
                        .unwrap_or_default();
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(request_id))
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub fn build(self) -> anyhow::Result<OzoneServer> {
        let gateway = build_gateway(&self.config)?;
        let app = build_app_with_gateway(gateway.clone());

        Ok(OzoneServer {
            addr: self.addr,
            config: self.config,
            gateway,
            app,
        })
    }
}

impl OzoneServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let sweeper = if self.config.auth.cache.enabled {
            spawn_cleanup_task(
                self.gateway.cache().clone(),
                self.config.auth.cache.cleanup_interval,
            )
        } else {
            None
        };

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!(
            addr = %self.addr,
            issuers = self.config.auth.issuers.len(),
            default_issuer = %self.config.auth.default_issuer,
            "listening"
        );
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        if let Some(handle) = sweeper {
            handle.abort();
        }
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
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
    tracing::info!("shutdown signal received");
}
