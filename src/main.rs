//! relay_bot console viewer
//!
//! Pick a guild and text channel, then read, chat, or both from the terminal.

use relay_bot::bot;
use relay_bot::config::Config;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    relay_bot::init_tracing();

    info!("relay_bot viewer starting...");

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            error!("Please ensure DISCORD_TOKEN is set in .env file");
            std::process::exit(1);
        }
    };

    info!(
        "Configuration loaded from {} ({} admin(s), suggestion channel: {})",
        config.sideload_path.display(),
        config.admin_ids.len(),
        config
            .suggestion_channel_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "unset".to_string())
    );

    // Run the bot
    if let Err(e) = bot::viewer::run(config).await {
        error!("Bot error: {}", e);
        std::process::exit(1);
    }
}
