//! Router Composition
//!
//! Service crates export plain axum routers; the builder mounts them and
//! records what was mounted for the startup log.

use axum::Router;
use tracing::info;

/// Builder for composing service routers
pub struct RouterBuilder {
    router: Router,
    services: Vec<(String, &'static str)>, // (mount point, name)
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            services: Vec::new(),
        }
    }

    /// Add a router under a prefix
    pub fn nest(mut self, prefix: &'static str, name: &'static str, router: Router) -> Self {
        info!("Mounting service '{}' at {}", name, prefix);
        self.router = self.router.nest(prefix, router);
        self.services.push((prefix.to_string(), name));
        self
    }

    /// Merge a router at the root
    pub fn merge(mut self, name: &'static str, router: Router) -> Self {
        info!("Mounting service '{}' at /", name);
        self.router = self.router.merge(router);
        self.services.push(("/".to_string(), name));
        self
    }

    /// Add a single route to the root router
    pub fn route(mut self, path: &str, method_router: axum::routing::MethodRouter) -> Self {
        self.router = self.router.route(path, method_router);
        self
    }

    /// Mounted services as (mount point, name)
    pub fn services(&self) -> &[(String, &'static str)] {
        &self.services
    }

    pub fn build(self) -> Router {
        self.router
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}
