use axum::Router;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::classify::ServerErrorsFailureClass;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::infrastructure::config::ServerConfig;
use crate::infrastructure::messaging::RetentionSweeper;
use crate::presentation::http::{
    handlers::{ChatHandler, HealthHandler, IndexHandler, SearchHandler},
    routes::{chat_routes, health_routes, index_routes, search_routes},
};

pub struct HttpServer {
    health_handler: Arc<HealthHandler>,
    chat_handler: Arc<ChatHandler>,
    search_handler: Arc<SearchHandler>,
    index_handler: Arc<IndexHandler>,
    retention_sweeper: Option<Arc<RetentionSweeper>>,
    port: u16,
    body_limit_bytes: usize,
}

impl HttpServer {
    pub fn new(
        health_handler: Arc<HealthHandler>,
        chat_handler: Arc<ChatHandler>,
        search_handler: Arc<SearchHandler>,
        index_handler: Arc<IndexHandler>,
        retention_sweeper: Option<Arc<RetentionSweeper>>,
        config: &ServerConfig,
    ) -> Self {
        Self {
            health_handler,
            chat_handler,
            search_handler,
            index_handler,
            retention_sweeper,
            port: config.port,
            body_limit_bytes: config.body_limit_bytes,
        }
    }

    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .merge(health_routes(self.health_handler.clone()))
            .merge(chat_routes(self.chat_handler.clone()))
            .merge(search_routes(self.search_handler.clone()))
            .merge(index_routes(self.index_handler.clone()))
            .layer(cors)
            .layer(RequestBodyLimitLayer::new(self.body_limit_bytes))
            .layer(
                TraceLayer::new_for_http()
                    .on_request(
                        |request: &axum::http::Request<axum::body::Body>, _span: &tracing::Span| {
                            tracing::info!(
                                "Received request: {} {}",
                                request.method(),
                                request.uri()
                            );
                        },
                    )
                    .on_response(
                        |response: &axum::http::Response<axum::body::Body>,
                         latency: std::time::Duration,
                         _span: &tracing::Span| {
                            tracing::info!(
                                "Response: {} (took {} ms)",
                                response.status(),
                                latency.as_millis()
                            );
                        },
                    )
                    .on_failure(
                        |error: ServerErrorsFailureClass,
                         latency: std::time::Duration,
                         _span: &tracing::Span| {
                            tracing::error!(
                                "Request failed: {:?} (took {} ms)",
                                error,
                                latency.as_millis()
                            );
                        },
                    ),
            )
    }

    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(sweeper) = self.retention_sweeper.clone() {
            tokio::spawn(async move {
                sweeper.start().await;
            });
        }

        let app = self.router();
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));

        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Listening on {}", addr);
        axum::serve(listener, app).await?;

        Ok(())
    }
}
