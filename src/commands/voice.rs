//! Voice commands: !join, !choose

use serenity::all::{ChannelId, ChannelType, Context, GuildId, Message, UserId};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::limits;
use crate::session::{JoinRefusal, SongbirdPlayer, VoiceError, VoicePlayer, VoiceSessions};
use crate::BoxError;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CommandError {
    #[error("Usage: {prefix}{name} {usage}")]
    MissingArgument {
        prefix: String,
        name: &'static str,
        usage: &'static str,
    },
}

/// A parsed voice bot command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceCommand {
    Join(String),
    Choose(String),
}

impl VoiceCommand {
    /// Parse `content`; `Ok(None)` when it is not one of our commands
    pub fn parse(content: &str, prefix: &str) -> Result<Option<Self>, CommandError> {
        let Some(body) = content.trim().strip_prefix(prefix) else {
            return Ok(None);
        };
        let (name, rest) = body.split_once(char::is_whitespace).unwrap_or((body, ""));
        let argument = strip_quotes(rest.trim());

        let (build, name, usage): (fn(String) -> Self, &'static str, &'static str) = match name {
            "join" => (VoiceCommand::Join, "join", "<channel id | #name>"),
            "choose" => (VoiceCommand::Choose, "choose", "<audio file path>"),
            _ => return Ok(None),
        };
        if argument.is_empty() {
            return Err(CommandError::MissingArgument {
                prefix: prefix.to_string(),
                name,
                usage,
            });
        }
        Ok(Some(build(argument.to_string())))
    }

    /// Like [`parse`](Self::parse), but messages outside a guild are never commands
    pub fn parse_in_guild(
        content: &str,
        prefix: &str,
        guild_id: Option<GuildId>,
    ) -> Result<Option<Self>, CommandError> {
        if guild_id.is_none() {
            return Ok(None);
        }
        Self::parse(content, prefix)
    }
}

fn strip_quotes(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(s)
}

/// Find a voice channel by numeric id, falling back to its name
pub fn resolve_voice_channel<'a>(
    identifier: &str,
    channels: &'a [(ChannelId, String)],
) -> Option<&'a (ChannelId, String)> {
    let by_id = if !identifier.is_empty() && identifier.bytes().all(|b| b.is_ascii_digit()) {
        identifier
            .parse::<u64>()
            .ok()
            .and_then(|id| channels.iter().find(|(cid, _)| cid.get() == id))
    } else {
        None
    };
    by_id.or_else(|| {
        let name = identifier.trim_matches('#');
        channels.iter().find(|(_, n)| n == name)
    })
}

/// Result of a `choose` request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChooseOutcome {
    NotJoined,
    MissingFile(String),
    Finished(String),
}

impl ChooseOutcome {
    pub fn reply(&self, prefix: &str) -> String {
        match self {
            ChooseOutcome::NotJoined => {
                format!("You need to join a voice channel first using {}join.", prefix)
            }
            ChooseOutcome::MissingFile(path) => format!("Audio file {} does not exist.", path),
            ChooseOutcome::Finished(path) => {
                format!("Finished playing {} and left the voice channel.", path)
            }
        }
    }
}

/// Play `path` on the user's session, wait for it to end, then disconnect
pub async fn choose<P: VoicePlayer>(
    sessions: &VoiceSessions<P>,
    user_id: UserId,
    path: &str,
    poll: Duration,
) -> Result<ChooseOutcome, VoiceError> {
    let Some(player) = sessions.get(user_id) else {
        return Ok(ChooseOutcome::NotJoined);
    };

    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Ok(ChooseOutcome::MissingFile(path.to_string()));
    }

    if player.is_playing().await {
        player.stop().await;
    }
    player.start(Path::new(path)).await?;

    while player.is_playing().await {
        tokio::time::sleep(poll).await;
    }

    if let Err(e) = player.disconnect().await {
        warn!("Failed to leave voice channel for {}: {}", user_id, e);
    }
    sessions.remove(user_id);

    Ok(ChooseOutcome::Finished(path.to_string()))
}

/// Reply for a join refused before connecting
pub fn refusal_reply(refusal: JoinRefusal, prefix: &str) -> String {
    match refusal {
        JoinRefusal::UserBusy => format!(
            "You already have an active voice session. Use {}choose to play audio.",
            prefix
        ),
        JoinRefusal::GuildBusy(owner) => format!(
            "<@{}> is already using voice in this server. Wait until their audio finishes.",
            owner
        ),
    }
}

/// Handle `join <id|#name>`
pub async fn handle_join(
    ctx: &Context,
    msg: &Message,
    sessions: &VoiceSessions<SongbirdPlayer>,
    prefix: &str,
    identifier: &str,
) -> Result<(), BoxError> {
    let guild_id = msg.guild_id.ok_or("Must be used in a guild")?;

    if let Err(refusal) = sessions.reserve(msg.author.id, guild_id) {
        msg.channel_id
            .say(&ctx.http, refusal_reply(refusal, prefix))
            .await?;
        return Ok(());
    }

    // Every path that does not activate the reservation must release it
    let joined = connect(ctx, guild_id, identifier).await;
    let reply = match joined {
        Ok(Some((player, channel_id, name))) => {
            if !sessions.activate(msg.author.id, player) {
                warn!("Reservation for {} vanished during join", msg.author.id);
            }
            info!(
                "Joined voice channel {} in guild {} for {}",
                channel_id, guild_id, msg.author.id
            );
            format!("Joined {}!", name)
        }
        Ok(None) => {
            sessions.remove(msg.author.id);
            format!("Could not find a voice channel by ID or name: {}", identifier)
        }
        Err(e) => {
            sessions.remove(msg.author.id);
            return Err(e);
        }
    };

    msg.channel_id.say(&ctx.http, reply).await?;
    Ok(())
}

/// Resolve the voice channel and connect; `None` when it does not exist
async fn connect(
    ctx: &Context,
    guild_id: GuildId,
    identifier: &str,
) -> Result<Option<(SongbirdPlayer, ChannelId, String)>, BoxError> {
    let voice_channels: Vec<(ChannelId, String)> = guild_id
        .channels(&ctx.http)
        .await?
        .into_values()
        .filter(|c| c.kind == ChannelType::Voice)
        .map(|c| (c.id, c.name))
        .collect();

    let Some((channel_id, name)) = resolve_voice_channel(identifier, &voice_channels).cloned() else {
        return Ok(None);
    };

    let manager = songbird::get(ctx).await.ok_or("Songbird not registered")?;
    let call = manager.join(guild_id, channel_id).await?;
    Ok(Some((SongbirdPlayer::new(manager, guild_id, call), channel_id, name)))
}

/// Handle `choose <path>`
pub async fn handle_choose(
    ctx: &Context,
    msg: &Message,
    sessions: &VoiceSessions<SongbirdPlayer>,
    prefix: &str,
    path: &str,
) -> Result<(), BoxError> {
    let outcome = choose(sessions, msg.author.id, path, limits::PLAYBACK_POLL).await?;
    if let ChooseOutcome::Finished(_) = &outcome {
        info!("Finished playback of {} for {}", path, msg.author.id);
    }
    msg.channel_id.say(&ctx.http, outcome.reply(prefix)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::fake::FakePlayer;
    use std::sync::atomic::Ordering;

    const POLL: Duration = Duration::from_millis(1);

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            VoiceCommand::parse("!join #music room", "!").unwrap(),
            Some(VoiceCommand::Join("#music room".to_string()))
        );
        assert_eq!(
            VoiceCommand::parse("!choose \"my song.mp3\"", "!").unwrap(),
            Some(VoiceCommand::Choose("my song.mp3".to_string()))
        );
        assert_eq!(VoiceCommand::parse("!leave", "!").unwrap(), None);
        assert_eq!(VoiceCommand::parse("join 123", "!").unwrap(), None);
        assert_eq!(VoiceCommand::parse("!joined 123", "!").unwrap(), None);
    }

    #[test]
    fn test_parse_missing_argument() {
        let err = VoiceCommand::parse("!choose   ", "!").unwrap_err();
        assert_eq!(err.to_string(), "Usage: !choose <audio file path>");
        assert!(VoiceCommand::parse("?join", "?").is_err());
    }

    #[test]
    fn test_direct_messages_get_no_usage_reply() {
        for content in ["!join", "!choose", "!join lobby"] {
            assert_eq!(VoiceCommand::parse_in_guild(content, "!", None), Ok(None));
        }
        assert!(VoiceCommand::parse_in_guild("!join", "!", Some(GuildId::new(9))).is_err());
    }

    #[test]
    fn test_resolve_voice_channel() {
        let channels = vec![
            (ChannelId::new(555), "Lounge".to_string()),
            (ChannelId::new(777), "2024".to_string()),
        ];
        assert_eq!(resolve_voice_channel("555", &channels).unwrap().1, "Lounge");
        assert_eq!(resolve_voice_channel("#Lounge", &channels).unwrap().0, ChannelId::new(555));
        assert_eq!(resolve_voice_channel("Lounge", &channels).unwrap().0, ChannelId::new(555));
        // digits that are not an id still match a name
        assert_eq!(resolve_voice_channel("2024", &channels).unwrap().0, ChannelId::new(777));
        assert!(resolve_voice_channel("999", &channels).is_none());
        assert!(resolve_voice_channel("#lounge", &channels).is_none());
    }

    #[tokio::test]
    async fn test_choose_without_join_does_not_play() {
        let sessions: VoiceSessions<FakePlayer> = VoiceSessions::new();
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();

        let outcome = choose(&sessions, UserId::new(1), path, POLL).await.unwrap();
        assert_eq!(outcome, ChooseOutcome::NotJoined);
        assert_eq!(
            outcome.reply("!"),
            "You need to join a voice channel first using !join."
        );
    }

    #[tokio::test]
    async fn test_choose_missing_file_keeps_session() {
        let sessions = VoiceSessions::new();
        let user = UserId::new(1);
        sessions.insert(user, GuildId::new(9), FakePlayer::default()).unwrap();

        let outcome = choose(&sessions, user, "/definitely/not/here.mp3", POLL).await.unwrap();
        assert_eq!(outcome, ChooseOutcome::MissingFile("/definitely/not/here.mp3".to_string()));
        let player = sessions.get(user).unwrap();
        assert!(player.started.lock().is_empty());
        assert!(!player.disconnected.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_choose_plays_to_end_then_leaves() {
        let sessions = VoiceSessions::new();
        let user = UserId::new(1);
        sessions
            .insert(
                user,
                GuildId::new(9),
                FakePlayer {
                    polls_until_done: 3,
                    ..Default::default()
                },
            )
            .unwrap();
        let player = sessions.get(user).unwrap();
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();

        let outcome = choose(&sessions, user, path, POLL).await.unwrap();
        assert_eq!(outcome, ChooseOutcome::Finished(path.to_string()));
        assert_eq!(player.started.lock().len(), 1);
        assert_eq!(player.polls.load(Ordering::SeqCst), 4);
        assert!(player.disconnected.load(Ordering::SeqCst));
        assert!(!sessions.contains(user));
        assert_eq!(sessions.owner_of(GuildId::new(9)), None);
    }

    #[tokio::test]
    async fn test_choose_while_join_in_flight_does_not_play() {
        let sessions: VoiceSessions<FakePlayer> = VoiceSessions::new();
        let user = UserId::new(1);
        sessions.reserve(user, GuildId::new(9)).unwrap();
        let file = tempfile::NamedTempFile::new().unwrap();

        let outcome = choose(&sessions, user, file.path().to_str().unwrap(), POLL).await.unwrap();
        assert_eq!(outcome, ChooseOutcome::NotJoined);
        assert!(sessions.contains(user));
    }

    #[test]
    fn test_refusal_replies() {
        assert_eq!(
            refusal_reply(JoinRefusal::UserBusy, "!"),
            "You already have an active voice session. Use !choose to play audio."
        );
        assert!(refusal_reply(JoinRefusal::GuildBusy(UserId::new(42)), "!").starts_with("<@42> "));
    }

    #[tokio::test]
    async fn test_choose_stops_current_audio_first() {
        let sessions = VoiceSessions::new();
        let user = UserId::new(1);
        let busy = FakePlayer::default();
        busy.playing.store(true, Ordering::SeqCst);
        sessions
            .insert(
                user,
                GuildId::new(9),
                FakePlayer {
                    polls_until_done: 5,
                    ..busy
                },
            )
            .unwrap();
        let player = sessions.get(user).unwrap();
        let file = tempfile::NamedTempFile::new().unwrap();

        choose(&sessions, user, file.path().to_str().unwrap(), POLL).await.unwrap();
        assert_eq!(player.stops.load(Ordering::SeqCst), 1);
    }
}
