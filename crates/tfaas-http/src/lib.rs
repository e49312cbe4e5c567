//! tfaas-http: HTTP server for the provisioning service
//!
//! ```text
//! tfaas-service
//!     └── tfaas-http (this crate)
//!         ├── Middleware stack (CORS, tracing, timeout, headers)
//!         └── Router composition
//!             ├── /apply, /destroy, /job/:id, /metrics → tfaas_jobs::create_router()
//!             └── /health                              → service
//! ```

pub mod middleware;
pub mod router;
pub mod server;

pub use middleware::{MiddlewareConfig, MiddlewareStack};
pub use router::RouterBuilder;
pub use server::{HttpServer, HttpServerBuilder, ServerConfig};

// Re-export axum for convenience
pub use axum;

/// Error types for the HTTP server
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Server binding error: {0}")]
    BindError(#[from] std::io::Error),

    #[error("Invalid bind address: {0}")]
    InvalidAddress(String),
}

pub type Result<T> = std::result::Result<T, ServerError>;

/// Prelude for convenient imports
pub mod prelude {
    pub use super::axum::{
        extract::{Json, Path, State},
        response::{IntoResponse, Response},
        routing::{get, post},
        Router,
    };
    pub use super::middleware::{MiddlewareConfig, MiddlewareStack};
    pub use super::router::RouterBuilder;
    pub use super::server::{HttpServer, HttpServerBuilder, ServerConfig};
    pub use super::Result;
}
