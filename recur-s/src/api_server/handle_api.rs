use super::*;

use axum::{routing::post, Router};
use std::future::Future;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::api_server::predict;

impl ApiServer {
    pub async fn run_api_server(
        self: Arc<Self>,
        addr: &str,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let app = self.create_api_router().await;
        let listener = tokio::net::TcpListener::bind(addr).await?;

        info!("API server listening on {}", listener.local_addr()?);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(Into::into)
    }

    // Create API Router; /predict wins over the static bundle mounted at /
    pub async fn create_api_router(self: Arc<Self>) -> Router {
        let static_files = ServeDir::new(&self.static_dir);
        let state = Arc::clone(&self);
        Router::new()
            .route("/predict", post(predict::predict))
            .fallback_service(static_files)
            .layer(CorsLayer::permissive())
            .with_state(state)
    }
}
