//! Interactive console viewer
//!
//! Holds the per-process viewer session: which channel is selected, which
//! mode is active, and whether incoming messages are currently echoed.

pub mod channel;
pub mod modes;
pub mod selector;

use parking_lot::RwLock;
use serenity::all::{ChannelId, GuildId, UserId};
use std::sync::atomic::{AtomicBool, Ordering};

pub use channel::{ChannelIo, ChatLine, RemoteChannel};
pub use modes::Mode;

/// The text channel chosen through the selector flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedChannel {
    pub guild_id: GuildId,
    pub id: ChannelId,
    pub name: String,
}

/// Viewer session shared between the console task and the gateway handler
#[derive(Default)]
pub struct ViewerState {
    selected: RwLock<Option<SelectedChannel>>,
    mode: RwLock<Option<Mode>>,
    paused: AtomicBool,
    bot_id: RwLock<Option<UserId>>,
    console_started: AtomicBool,
}

impl ViewerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_bot_id(&self, id: UserId) {
        *self.bot_id.write() = Some(id);
    }

    pub fn bot_id(&self) -> Option<UserId> {
        *self.bot_id.read()
    }

    pub fn select(&self, channel: SelectedChannel) {
        *self.selected.write() = Some(channel);
    }

    pub fn selected_id(&self) -> Option<ChannelId> {
        self.selected.read().as_ref().map(|c| c.id)
    }

    pub fn set_mode(&self, mode: Option<Mode>) {
        *self.mode.write() = mode;
    }

    pub fn mode(&self) -> Option<Mode> {
        *self.mode.read()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Suppress echoing until the returned guard is dropped
    pub fn pause(&self) -> PauseGuard<'_> {
        self.paused.store(true, Ordering::SeqCst);
        PauseGuard { flag: &self.paused }
    }

    /// Returns true only for the first caller
    pub fn claim_console(&self) -> bool {
        !self.console_started.swap(true, Ordering::SeqCst)
    }

    /// Whether an incoming message should be printed to the console
    pub fn should_display(&self, channel_id: ChannelId, author_id: UserId) -> bool {
        if self.selected_id() != Some(channel_id) {
            return false;
        }
        if self.bot_id() == Some(author_id) {
            return false;
        }
        match self.mode() {
            Some(Mode::Read) => true,
            Some(Mode::Both) => !self.is_paused(),
            _ => false,
        }
    }
}

/// Clears the display-paused flag on drop
pub struct PauseGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for PauseGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Nickname, then global name, then username
pub fn display_name<'a>(nick: Option<&'a str>, global_name: Option<&'a str>, name: &'a str) -> &'a str {
    nick.or(global_name).unwrap_or(name)
}
