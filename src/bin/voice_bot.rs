//! relay_bot voice bot
//!
//! Joins a voice channel on `!join` and plays a local audio file on `!choose`.

use relay_bot::bot;
use relay_bot::config::Config;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    relay_bot::init_tracing();

    info!("relay_bot voice bot starting...");

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            error!("Please ensure DISCORD_TOKEN is set in .env file");
            std::process::exit(1);
        }
    };

    info!("Command prefix: {}", config.command_prefix);

    if let Err(e) = bot::voice::run(config).await {
        error!("Bot error: {}", e);
        std::process::exit(1);
    }
}
