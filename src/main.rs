mod application;
mod domain;
mod infrastructure;
mod presentation;

use infrastructure::{AppConfig, AppContainer};
use presentation::http::HttpServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = AppConfig::from_env()?;
    let container = AppContainer::new(&config).await?;

    let server = HttpServer::new(
        container.health_handler.clone(),
        container.chat_handler.clone(),
        container.search_handler.clone(),
        container.index_handler.clone(),
        container.retention_sweeper.clone(),
        &config.server,
    );

    server.run().await
}
