//! relay_bot - Discord console relay and voice playback
//!
//! Two programs share this crate: an interactive console viewer/sender for
//! one text channel at a time, and a voice bot that plays local audio files
//! on request.

pub mod bot;
pub mod commands;
pub mod config;
pub mod console;
pub mod session;
pub mod viewer;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Error type returned by command handlers and client run loops
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Initialize logging on stderr so console prompts on stdout stay readable
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "info,relay_bot=debug".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
