mod config;
mod error;
mod health;
mod links;
mod menu;
mod nav;
mod scraper;
mod storage;
mod tg;

use dotenvy::dotenv;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // missing secrets abort here, before anything talks to Telegram
    let config = config::Config::from_env()?;

    let scraper = scraper::ScraperClient::new(&config.api_base_url, &config.api_key, config.http_timeout)?;
    let store = storage::MemoryStore::new(config.session_idle);
    let links = links::LinkFormatter::new(&config.streaming_hub_url);
    let nav = Arc::new(nav::Navigator::new(scraper, store, links, config.result_limit));

    match config.health_port {
        Some(port) => {
            health::spawn(port).await?;
        }
        None => tracing::info!("HTTP server disabled (ENABLE_HTTP_SERVER=false)"),
    }

    let bot = Bot::new(config.bot_token);
    tg::run(bot, nav).await;
    Ok(())
}
