//! Console viewer event handler
//!
//! One gateway `message` handler serves every mode; the console flow runs
//! as a separate task started on the first `ready`.

use serenity::all::{Client, Context, EventHandler, GatewayIntents, Message, Ready};
use serenity::async_trait;
use std::sync::Arc;
use tracing::{error, info};

use super::{shutdown, ShardManagerKey};
use crate::commands::suggestions;
use crate::config::Config;
use crate::console::StdinConsole;
use crate::viewer::modes::{self, Flow};
use crate::viewer::{selector, ChatLine, RemoteChannel, ViewerState};
use crate::BoxError;

/// Viewer state shared across handlers
pub struct ViewerBot {
    pub config: Arc<Config>,
    pub state: Arc<ViewerState>,
}

/// Main event handler for the viewer
pub struct Handler {
    pub bot: Arc<ViewerBot>,
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("Logged in as {} (ID: {})", ready.user.name, ready.user.id);
        println!("Logged in as {} (ID: {})", ready.user.name, ready.user.id);
        println!("------");
        self.bot.state.set_bot_id(ready.user.id);

        if !self.bot.state.claim_console() {
            return;
        }

        let state = self.bot.state.clone();
        tokio::spawn(async move {
            match run_console(&ctx, &state).await {
                Ok(Flow::Detached) => info!("Console detached, displaying incoming messages"),
                Ok(_) => shutdown(&ctx).await,
                Err(e) => {
                    error!("Console session failed: {}", e);
                    shutdown(&ctx).await;
                }
            }
        });
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if self.bot.state.should_display(msg.channel_id, msg.author.id) {
            println!("{}", ChatLine::from_message(&msg));
        }

        if !msg.author.bot && suggestions::is_invocation(&msg.content) {
            if let Err(e) = suggestions::handle_remove(&ctx, &msg, &self.bot.config).await {
                error!("Command error: {}", e);
            }
        }
    }
}

/// Selector → dispatcher loop on the process console
async fn run_console(ctx: &Context, state: &ViewerState) -> Result<Flow, BoxError> {
    let mut console = StdinConsole::new();
    let bot_id = state
        .bot_id()
        .unwrap_or_else(|| ctx.cache.current_user().id);

    loop {
        state.set_mode(None);
        let selected = selector::select_channel(&mut console, &ctx.http).await?;
        state.select(selected.clone());

        let channel = RemoteChannel::new(ctx.http.clone(), ctx.cache.clone(), bot_id, selected);
        match modes::dispatch(&mut console, &channel, state).await? {
            Flow::Reselect => continue,
            flow => return Ok(flow),
        }
    }
}

/// Create and run the viewer client
pub async fn run(config: Config) -> Result<(), BoxError> {
    let config = Arc::new(config);
    let bot = Arc::new(ViewerBot {
        config: config.clone(),
        state: Arc::new(ViewerState::new()),
    });

    let handler = Handler { bot };

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .await?;

    {
        let mut data = client.data.write().await;
        data.insert::<ShardManagerKey>(client.shard_manager.clone());
    }

    info!("Starting viewer...");
    client.start().await?;

    Ok(())
}
