//! Voice session management
//!
//! Tracks which user owns which open voice connection, and wraps a
//! songbird call behind a small playback interface.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serenity::all::{GuildId, UserId};
use songbird::error::JoinError;
use songbird::tracks::{ControlError, PlayMode, TrackHandle};
use songbird::{Call, Songbird};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Voice connection error: {0}")]
    Join(#[from] JoinError),
    #[error("Track control error: {0}")]
    Control(#[from] ControlError),
}

/// Playback operations on one open voice connection
#[async_trait]
pub trait VoicePlayer: Send + Sync {
    /// Stop whatever is currently playing
    async fn stop(&self);

    /// Begin playing the file at `path`
    async fn start(&self, path: &Path) -> Result<(), VoiceError>;

    async fn is_playing(&self) -> bool;

    /// Leave the voice channel
    async fn disconnect(&self) -> Result<(), VoiceError>;
}

/// Why a join was refused before connecting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinRefusal {
    /// The user already has a session, or a join in flight
    UserBusy,
    /// Another user's session owns this guild's call
    GuildBusy(UserId),
}

struct Slot<P> {
    guild_id: GuildId,
    /// `None` while the connection is still being made
    player: Option<Arc<P>>,
}

/// Map from inviting user to that user's voice connection.
///
/// Songbird keeps one call per guild, so each guild is owned by at most
/// one user at a time.
pub struct VoiceSessions<P> {
    sessions: DashMap<UserId, Slot<P>>,
    guilds: DashMap<GuildId, UserId>,
}

impl<P> Default for VoiceSessions<P> {
    fn default() -> Self {
        Self {
            sessions: DashMap::new(),
            guilds: DashMap::new(),
        }
    }
}

impl<P> VoiceSessions<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `guild_id` for `user_id` before connecting.
    ///
    /// Locks the user entry, then the guild entry; no other method holds
    /// both, so the claim is atomic.
    pub fn reserve(&self, user_id: UserId, guild_id: GuildId) -> Result<(), JoinRefusal> {
        let user_slot = match self.sessions.entry(user_id) {
            Entry::Occupied(_) => return Err(JoinRefusal::UserBusy),
            Entry::Vacant(slot) => slot,
        };
        match self.guilds.entry(guild_id) {
            Entry::Occupied(owner) => return Err(JoinRefusal::GuildBusy(*owner.get())),
            Entry::Vacant(slot) => {
                slot.insert(user_id);
            }
        }
        user_slot.insert(Slot {
            guild_id,
            player: None,
        });
        Ok(())
    }

    /// Attach the connected player to a reservation
    pub fn activate(&self, user_id: UserId, player: P) -> bool {
        match self.sessions.get_mut(&user_id) {
            Some(mut slot) if slot.player.is_none() => {
                slot.player = Some(Arc::new(player));
                true
            }
            _ => false,
        }
    }

    /// Reserve and activate in one step
    pub fn insert(&self, user_id: UserId, guild_id: GuildId, player: P) -> Result<(), JoinRefusal> {
        self.reserve(user_id, guild_id)?;
        self.activate(user_id, player);
        Ok(())
    }

    /// The user's connected player, if the join has completed
    pub fn get(&self, user_id: UserId) -> Option<Arc<P>> {
        self.sessions.get(&user_id).and_then(|r| r.player.clone())
    }

    /// Drop the user's session or reservation and release its guild
    pub fn remove(&self, user_id: UserId) -> Option<Arc<P>> {
        let (_, slot) = self.sessions.remove(&user_id)?;
        self.guilds
            .remove_if(&slot.guild_id, |_, owner| *owner == user_id);
        slot.player
    }

    pub fn contains(&self, user_id: UserId) -> bool {
        self.sessions.contains_key(&user_id)
    }

    /// User whose session owns the guild's call
    pub fn owner_of(&self, guild_id: GuildId) -> Option<UserId> {
        self.guilds.get(&guild_id).map(|r| *r.value())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// A songbird call plus the track it is currently playing
pub struct SongbirdPlayer {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    call: Arc<Mutex<Call>>,
    track: parking_lot::Mutex<Option<TrackHandle>>,
}

impl SongbirdPlayer {
    pub fn new(manager: Arc<Songbird>, guild_id: GuildId, call: Arc<Mutex<Call>>) -> Self {
        Self {
            manager,
            guild_id,
            call,
            track: parking_lot::Mutex::new(None),
        }
    }
}

#[async_trait]
impl VoicePlayer for SongbirdPlayer {
    async fn stop(&self) {
        self.track.lock().take();
        self.call.lock().await.stop();
    }

    async fn start(&self, path: &Path) -> Result<(), VoiceError> {
        let input = songbird::input::File::new(path.to_path_buf());
        let handle = self.call.lock().await.play_input(input.into());
        debug!("[{}] Started track {}", self.guild_id, handle.uuid());
        *self.track.lock() = Some(handle);
        Ok(())
    }

    async fn is_playing(&self) -> bool {
        let Some(handle) = self.track.lock().clone() else {
            return false;
        };
        // A track whose state can no longer be queried has ended
        match handle.get_info().await {
            Ok(state) => matches!(state.playing, PlayMode::Play | PlayMode::Pause),
            Err(_) => false,
        }
    }

    async fn disconnect(&self) -> Result<(), VoiceError> {
        self.track.lock().take();
        self.manager.remove(self.guild_id).await?;
        Ok(())
    }
}
