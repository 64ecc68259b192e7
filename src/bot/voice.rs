//! Voice bot event handler: `!join` and `!choose`

use serenity::all::{Client, Context, EventHandler, GatewayIntents, Message, Ready};
use serenity::async_trait;
use songbird::SerenityInit;
use std::sync::Arc;
use tracing::{error, info};

use crate::commands::voice::{self, VoiceCommand};
use crate::config::Config;
use crate::session::{SongbirdPlayer, VoiceSessions};
use crate::BoxError;

/// Bot state shared across handlers
pub struct VoiceBot {
    pub config: Arc<Config>,
    pub sessions: VoiceSessions<SongbirdPlayer>,
}

/// Main event handler for the voice bot
pub struct Handler {
    pub bot: Arc<VoiceBot>,
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("Logged in as {} (ID: {})", ready.user.name, ready.user.id);
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        let prefix = self.bot.config.command_prefix.as_str();
        let command = match VoiceCommand::parse_in_guild(&msg.content, prefix, msg.guild_id) {
            Ok(Some(command)) => command,
            Ok(None) => return,
            Err(usage) => {
                if let Err(e) = msg.channel_id.say(&ctx.http, usage.to_string()).await {
                    error!("Failed to send usage: {}", e);
                }
                return;
            }
        };

        let result = match &command {
            VoiceCommand::Join(identifier) => {
                voice::handle_join(&ctx, &msg, &self.bot.sessions, prefix, identifier).await
            }
            VoiceCommand::Choose(path) => {
                voice::handle_choose(&ctx, &msg, &self.bot.sessions, prefix, path).await
            }
        };

        if let Err(e) = result {
            error!("Command error: {}", e);
            if let Err(e) = msg.channel_id.say(&ctx.http, format!("⚠️ Error: {}", e)).await {
                error!("Failed to send error reply: {}", e);
            }
        }
    }
}

/// Create and run the voice bot
pub async fn run(config: Config) -> Result<(), BoxError> {
    let config = Arc::new(config);
    let bot = Arc::new(VoiceBot {
        config: config.clone(),
        sessions: VoiceSessions::new(),
    });

    let handler = Handler { bot };

    // Create client with voice support
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_VOICE_STATES;

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird()
        .await?;

    info!("Starting voice bot...");
    client.start().await?;

    Ok(())
}
