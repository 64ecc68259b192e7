//! Access to the selected text channel

use async_trait::async_trait;
use serenity::all::{Cache, GetMessages, Http, Message, MessageId, UserId};
use std::fmt;
use std::sync::Arc;

use super::{display_name, SelectedChannel};
use crate::BoxError;

/// One rendered channel message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    pub id: MessageId,
    pub author_id: UserId,
    pub author: String,
    pub content: String,
}

impl ChatLine {
    pub fn from_message(msg: &Message) -> Self {
        let nick = msg.member.as_ref().and_then(|m| m.nick.as_deref());
        Self {
            id: msg.id,
            author_id: msg.author.id,
            author: display_name(nick, msg.author.global_name.as_deref(), &msg.author.name)
                .to_string(),
            content: msg.content.clone(),
        }
    }
}

impl fmt::Display for ChatLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.author, self.content)
    }
}

/// Operations the mode handlers perform on the selected channel
#[async_trait]
pub trait ChannelIo: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, content: &str) -> Result<(), BoxError>;

    /// The newest `limit` messages, oldest first
    async fn latest(&self, limit: u8) -> Result<Vec<ChatLine>, BoxError>;

    /// Up to `limit` messages newer than `after`, oldest first
    async fn since(&self, after: MessageId, limit: u8) -> Result<Vec<ChatLine>, BoxError>;

    /// Whether the bot may read this channel's history
    async fn can_read_history(&self) -> Result<bool, BoxError>;
}

/// The selected channel, reached through serenity's HTTP client and cache
pub struct RemoteChannel {
    http: Arc<Http>,
    cache: Arc<Cache>,
    bot_id: UserId,
    selected: SelectedChannel,
}

impl RemoteChannel {
    pub fn new(http: Arc<Http>, cache: Arc<Cache>, bot_id: UserId, selected: SelectedChannel) -> Self {
        Self {
            http,
            cache,
            bot_id,
            selected,
        }
    }

    async fn fetch(&self, builder: GetMessages) -> Result<Vec<ChatLine>, BoxError> {
        let messages = self.selected.id.messages(&self.http, builder).await?;
        let mut lines: Vec<ChatLine> = messages.iter().map(ChatLine::from_message).collect();
        lines.sort_by_key(|line| line.id);
        Ok(lines)
    }
}

#[async_trait]
impl ChannelIo for RemoteChannel {
    fn name(&self) -> &str {
        &self.selected.name
    }

    async fn send(&self, content: &str) -> Result<(), BoxError> {
        self.selected.id.say(&self.http, content).await?;
        Ok(())
    }

    async fn latest(&self, limit: u8) -> Result<Vec<ChatLine>, BoxError> {
        self.fetch(GetMessages::new().limit(limit)).await
    }

    async fn since(&self, after: MessageId, limit: u8) -> Result<Vec<ChatLine>, BoxError> {
        self.fetch(GetMessages::new().after(after).limit(limit)).await
    }

    async fn can_read_history(&self) -> Result<bool, BoxError> {
        let permissions = {
            let guild = self
                .cache
                .guild(self.selected.guild_id)
                .ok_or("Guild not in cache")?;
            let channel = guild
                .channels
                .get(&self.selected.id)
                .ok_or("Channel not in cache")?;
            let member = guild
                .members
                .get(&self.bot_id)
                .ok_or("Bot member not in cache")?;
            guild.user_permissions_in(channel, member)
        };
        Ok(permissions.read_message_history())
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// In-memory channel recording sends and the pause flag seen at each send
    pub struct FakeChannel {
        pub history: Vec<ChatLine>,
        pub readable: bool,
        pub fail_sends: bool,
        pub sent: Mutex<Vec<String>>,
        pub paused_at_send: Mutex<Vec<bool>>,
        pub pause_watch: Option<Arc<crate::viewer::ViewerState>>,
        pub since_called: AtomicBool,
    }

    impl FakeChannel {
        pub fn new(history: Vec<ChatLine>) -> Self {
            Self {
                history,
                readable: true,
                fail_sends: false,
                sent: Mutex::new(Vec::new()),
                paused_at_send: Mutex::new(Vec::new()),
                pause_watch: None,
                since_called: AtomicBool::new(false),
            }
        }
    }

    pub fn line(id: u64, author_id: u64, content: &str) -> ChatLine {
        ChatLine {
            id: MessageId::new(id),
            author_id: UserId::new(author_id),
            author: format!("user{}", author_id),
            content: content.to_string(),
        }
    }

    #[async_trait]
    impl ChannelIo for FakeChannel {
        fn name(&self) -> &str {
            "general"
        }

        async fn send(&self, content: &str) -> Result<(), BoxError> {
            if let Some(state) = &self.pause_watch {
                self.paused_at_send.lock().push(state.is_paused());
            }
            if self.fail_sends {
                return Err("send rejected".into());
            }
            self.sent.lock().push(content.to_string());
            Ok(())
        }

        async fn latest(&self, limit: u8) -> Result<Vec<ChatLine>, BoxError> {
            let skip = self.history.len().saturating_sub(limit as usize);
            Ok(self.history[skip..].to_vec())
        }

        async fn since(&self, after: MessageId, limit: u8) -> Result<Vec<ChatLine>, BoxError> {
            self.since_called.store(true, Ordering::SeqCst);
            Ok(self
                .history
                .iter()
                .filter(|line| line.id > after)
                .take(limit as usize)
                .cloned()
                .collect())
        }

        async fn can_read_history(&self) -> Result<bool, BoxError> {
            Ok(self.readable)
        }
    }
}
