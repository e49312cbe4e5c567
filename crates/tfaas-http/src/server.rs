//! HTTP Server
//!
//! Plain HTTP only; put a TLS-terminating proxy in front when needed.

use crate::middleware::{apply_middleware, MiddlewareConfig};
use crate::{Result, ServerError};
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

pub struct HttpServer {
    config: ServerConfig,
    router: Router,
}

impl HttpServer {
    pub fn builder() -> HttpServerBuilder {
        HttpServerBuilder::new()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Serve until ctrl-c
    pub async fn serve(self) -> Result<()> {
        self.serve_with_shutdown(shutdown_signal()).await
    }

    /// Serve until `signal` resolves, letting in-flight requests finish
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr)
            .await
            .map_err(ServerError::BindError)?;
        self.serve_listener(listener, signal).await
    }

    /// Serve on an already bound listener
    pub async fn serve_listener<F>(self, listener: TcpListener, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr().map_err(ServerError::BindError)?;
        info!("HTTP server listening on http://{}", addr);

        axum::serve(listener, self.router)
            .with_graceful_shutdown(signal)
            .await
            .map_err(ServerError::BindError)?;

        info!("HTTP server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Builder for HttpServer
pub struct HttpServerBuilder {
    bind: String,
    router: Option<Router>,
    middleware_config: MiddlewareConfig,
}

impl HttpServerBuilder {
    pub fn new() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            router: None,
            middleware_config: MiddlewareConfig::default(),
        }
    }

    /// Set bind address (host:port format or just port)
    pub fn bind(mut self, addr: impl Into<String>) -> Self {
        let addr = addr.into();
        self.bind = if addr.parse::<u16>().is_ok() {
            format!("0.0.0.0:{}", addr)
        } else {
            addr
        };
        self
    }

    pub fn router(mut self, router: Router) -> Self {
        self.router = Some(router);
        self
    }

    pub fn cors(mut self, enabled: bool) -> Self {
        self.middleware_config.cors_enabled = enabled;
        self
    }

    pub fn cors_origins(mut self, origins: Vec<String>) -> Self {
        self.middleware_config = self.middleware_config.cors_origins(origins);
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.middleware_config.timeout = duration;
        self
    }

    pub fn build(self) -> Result<HttpServer> {
        let bind_addr: SocketAddr = self
            .bind
            .parse()
            .map_err(|_| ServerError::InvalidAddress(self.bind.clone()))?;

        let router = self.router.unwrap_or_default();
        let router = apply_middleware(router, self.middleware_config);

        Ok(HttpServer {
            config: ServerConfig { bind_addr },
            router,
        })
    }
}

impl Default for HttpServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
