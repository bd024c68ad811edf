//! HTTP Server for the SQL chat page
//!
//! Same as `sql-chat serve`, configured from the environment only.

use sql_chat::config::AppConfig;
use sql_chat::db::{display_target, PgDatabase};
use sql_chat::llm::LlmClient;
use sql_chat::pipeline::SqlChat;
use sql_chat::{logging, web};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();
    logging::init_tracing(false);

    let config = AppConfig::from_env()?;
    info!("Starting SQL chat server...");
    info!("Database: {}", display_target(&config.database_url));
    info!("Model: {} via {}", config.llm.model, config.llm.provider);

    let db = PgDatabase::connect(&config.database_url, config.max_connections).await?;
    let llm = LlmClient::from_config(&config.llm);
    let chat = SqlChat::start(Arc::new(db), Arc::new(llm)).await?;

    web::serve(&config.bind_addr, Arc::new(chat)).await?;
    Ok(())
}
