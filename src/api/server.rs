//! Command API HTTP server with axum router and graceful shutdown.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{get_list, get_root, get_usercache, post_cmd, post_tellraw, AppState};
use super::ApiError;
use crate::config::ApiConfig;
use crate::shell::ShellSupervisor;

/// HTTP front-end to the game shell.
#[derive(Debug)]
pub struct ApiServer {
    config: ApiConfig,
    state: AppState,
    cancel: CancellationToken,
}

impl ApiServer {
    /// Create a server that shuts down when `cancel` fires.
    #[must_use]
    pub fn new(config: ApiConfig, shell: Arc<ShellSupervisor>, cancel: CancellationToken) -> Self {
        let state = AppState::new(shell, &config.tag, config.usercache.clone());
        Self {
            config,
            state,
            cancel,
        }
    }

    /// Get the configured address as a string.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.address, self.config.port)
    }

    /// Build the axum router with all routes and middleware.
    pub fn build_router(&self) -> Router {
        let router = Router::new()
            .route("/", get(get_root))
            .route("/cmd", post(post_cmd))
            .route("/list", get(get_list))
            .route("/tellraw", post(post_tellraw))
            .route("/usercache", get(get_usercache))
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http());

        if self.config.cors_permissive {
            router.layer(CorsLayer::permissive())
        } else {
            router
        }
    }

    /// Serve on an already bound listener until the cancellation token fires.
    ///
    /// # Errors
    ///
    /// Returns an error if serving fails.
    pub async fn serve(self, listener: TcpListener) -> Result<(), ApiError> {
        let cancel = self.cancel.clone();
        let app = self.build_router();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel.cancelled().await;
                tracing::info!("API server shutting down gracefully");
            })
            .await?;
        Ok(())
    }

    /// Run the server, binding to the configured address.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind or serve.
    pub async fn run(self) -> Result<(), ApiError> {
        let address = self.address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| ApiError::BindError {
                address: address.clone(),
                source,
            })?;

        tracing::info!(address = %address, "Starting API server");
        self.serve(listener).await
    }
}
