//! Discord clients for the console viewer and the voice bot

pub mod viewer;
pub mod voice;

use serenity::all::{Context, ShardManager};
use std::sync::Arc;
use tracing::info;

/// Type key for storing the shard manager in client data
pub struct ShardManagerKey;

impl serenity::prelude::TypeMapKey for ShardManagerKey {
    type Value = Arc<ShardManager>;
}

/// Close every shard, ending `Client::start`
pub async fn shutdown(ctx: &Context) {
    let manager = ctx.data.read().await.get::<ShardManagerKey>().cloned();
    if let Some(manager) = manager {
        info!("Shutting down all shards");
        manager.shutdown_all().await;
    }
}
