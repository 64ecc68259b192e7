//! Configuration management for the relay and voice bots
//!
//! Loads settings from environment variables (.env file) and an optional
//! sideloaded JSON file holding the admin list.

use serde::Deserialize;
use serenity::all::{ChannelId, UserId};
use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Discord bot token
    pub discord_token: String,
    /// Users allowed to run `$rm`
    pub admin_ids: Vec<UserId>,
    /// Channel the bot posts suggestion embeds into
    pub suggestion_channel_id: Option<ChannelId>,
    /// Prefix for voice bot text commands
    pub command_prefix: String,
    /// Path of the sideloaded key-value file
    pub sideload_path: PathBuf,
}

/// Contents of the sideloaded JSON file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
struct Sideload {
    #[serde(default)]
    admin_ids: Vec<u64>,
    #[serde(default)]
    suggestion_channel_id: Option<u64>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let discord_token = env::var("DISCORD_TOKEN")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("DISCORD_TOKEN".to_string()))?;

        let sideload_path: PathBuf = env::var("BOT_CONFIG")
            .unwrap_or_else(|_| "config.json".to_string())
            .into();
        let sideload = load_sideload(&sideload_path)?;

        let admin_ids = match env::var("ADMIN_IDS").ok().filter(|s| !s.trim().is_empty()) {
            Some(raw) => parse_admin_ids(&raw)?,
            None => sideload.admin_ids.into_iter().map(UserId::new).collect(),
        };

        let suggestion_channel_id = env::var("SUGGESTION_CHANNEL_ID")
            .ok()
            .filter(|s| !s.is_empty())
            .map(|s| {
                parse_id(&s).ok_or_else(|| {
                    ConfigError::InvalidValue("SUGGESTION_CHANNEL_ID".to_string(), s)
                })
            })
            .transpose()?
            .or(sideload.suggestion_channel_id.filter(|id| *id != 0))
            .map(ChannelId::new);

        let command_prefix = env::var("COMMAND_PREFIX")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "!".to_string());

        Ok(Self {
            discord_token,
            admin_ids,
            suggestion_channel_id,
            command_prefix,
            sideload_path,
        })
    }

    /// Whether the user may run admin commands
    pub fn is_admin(&self, user_id: UserId) -> bool {
        self.admin_ids.contains(&user_id)
    }
}

fn load_sideload(path: &Path) -> Result<Sideload, ConfigError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Sideload::default()),
        Err(e) => {
            return Err(ConfigError::InvalidValue(
                path.display().to_string(),
                e.to_string(),
            ))
        }
    };
    serde_json::from_str(&raw)
        .map_err(|e| ConfigError::InvalidValue(path.display().to_string(), e.to_string()))
}

fn parse_id(s: &str) -> Option<u64> {
    s.trim().parse::<u64>().ok().filter(|id| *id != 0)
}

/// Parse a comma separated list of user ids
pub fn parse_admin_ids(raw: &str) -> Result<Vec<UserId>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            parse_id(s)
                .map(UserId::new)
                .ok_or_else(|| ConfigError::InvalidValue("ADMIN_IDS".to_string(), s.to_string()))
        })
        .collect()
}

/// Fixed limits used by the console viewer and the bots
pub mod limits {
    use std::time::Duration;

    /// Messages printed when Both mode starts
    pub const BACKLOG_SIZE: u8 = 10;
    /// Look-back window for Past mode, in minutes
    pub const PAST_WINDOW_MINUTES: i64 = 10;
    /// Maximum messages fetched inside the Past window
    pub const PAST_LIMIT: u8 = 100;
    /// Messages shown when the Past window is empty
    pub const PAST_FALLBACK: u8 = 20;
    /// Messages scanned for suggestions by `$rm`
    pub const SUGGESTION_SCAN: u8 = 100;
    /// How long `$rm` waits for the admin's choice
    pub const ADMIN_REPLY_TIMEOUT: Duration = Duration::from_secs(30);
    /// Cadence of the "still playing" check
    pub const PLAYBACK_POLL: Duration = Duration::from_secs(1);
    /// Attempts allowed at the mode menu before giving up
    pub const MODE_MENU_ATTEMPTS: usize = 5;
}
