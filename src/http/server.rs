//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the sample binding routes
//! - Wire up middleware (tracing, timeout, request ID)
//! - Bind server to listener
//! - Graceful shutdown on Ctrl+C

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::binding::{Binder, ClientAuthBinder};
use crate::config::AppConfig;
use crate::http::handlers;
use crate::http::pipeline::Pipeline;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};

/// HTTP server for the sample binding routes.
pub struct HttpServer {
    router: Router,
    config: AppConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: AppConfig) -> Self {
        let router = Self::build_router(&config);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(config: &AppConfig) -> Router {
        let pipeline = Pipeline::from_config(&config.binding);
        let token_pipeline = pipeline
            .clone()
            .prepend_binders([Arc::new(ClientAuthBinder) as Arc<dyn Binder>])
            .disable_no_vary_search();

        Router::new()
            .route(
                "/items/{id}",
                get(pipeline.handler(handlers::get_item)).delete(pipeline.raw_handler(handlers::delete_item)),
            )
            .route("/items", post(pipeline.handler(handlers::create_item)))
            .route("/upload", post(pipeline.handler(handlers::upload)))
            .route("/token", post(token_pipeline.handler(handlers::issue_token)))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            max_body_size = self.config.binding.max_body_size,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The router, for serving under a caller-managed listener.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
