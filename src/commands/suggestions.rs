//! Admin command: $rm (delete a posted suggestion)

use serenity::all::{ChannelId, Context, GetMessages, Message, MessageId, UserId};
use tracing::info;

use crate::config::{limits, Config};
use crate::console::select_index;
use crate::BoxError;

pub const COMMAND: &str = "$rm";

const DENIED: &str = "You do not have permission to use this command.";
const MESSAGE_LIMIT: usize = 1900;
const PREVIEW_CHARS: usize = 100;

/// A bot-authored suggestion embed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub id: MessageId,
    pub description: String,
}

/// Whether `content` invokes this command
pub fn is_invocation(content: &str) -> bool {
    content.split_whitespace().next() == Some(COMMAND)
}

/// What a message asks of `$rm`, decided before any channel access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovePlan {
    Ignore,
    Denied,
    NotConfigured,
    Scan(ChannelId),
}

/// Decide how to answer `content` from `author`; the admin gate wins over arguments
pub fn plan_remove(config: &Config, author: UserId, content: &str) -> RemovePlan {
    if !is_invocation(content) {
        return RemovePlan::Ignore;
    }
    if !config.is_admin(author) {
        return RemovePlan::Denied;
    }
    match config.suggestion_channel_id {
        Some(channel) => RemovePlan::Scan(channel),
        None => RemovePlan::NotConfigured,
    }
}

/// Keep messages written by the bot that carry an embed description
pub fn collect_suggestions<'a>(
    messages: impl IntoIterator<Item = (MessageId, UserId, Option<&'a str>)>,
    bot_id: UserId,
) -> Vec<Suggestion> {
    messages
        .into_iter()
        .filter(|(_, author, _)| *author == bot_id)
        .filter_map(|(id, _, description)| {
            description.map(|d| Suggestion {
                id,
                description: d.to_string(),
            })
        })
        .collect()
}

/// Numbered listing split into message-sized chunks
pub fn format_listing(suggestions: &[Suggestion]) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::from("Reply with the number of the suggestion to delete:\n");

    for (i, suggestion) in suggestions.iter().enumerate() {
        let mut preview: String = suggestion
            .description
            .chars()
            .take(PREVIEW_CHARS)
            .collect::<String>()
            .replace('\n', " ");
        if suggestion.description.chars().count() > PREVIEW_CHARS {
            preview.push_str("...");
        }
        let line = format!("{}. {}\n", i + 1, preview);
        if current.len() + line.len() > MESSAGE_LIMIT {
            chunks.push(std::mem::take(&mut current));
        }
        current.push_str(&line);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// The admin's reply must be only ASCII digits
pub fn is_digit_reply(content: &str) -> bool {
    let trimmed = content.trim();
    !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit())
}

/// Handle $rm
pub async fn handle_remove(ctx: &Context, msg: &Message, config: &Config) -> Result<(), BoxError> {
    let suggestion_channel = match plan_remove(config, msg.author.id, &msg.content) {
        RemovePlan::Ignore => return Ok(()),
        RemovePlan::Denied => {
            msg.channel_id.say(&ctx.http, DENIED).await?;
            info!("Denied {} to non-admin {}", COMMAND, msg.author.id);
            return Ok(());
        }
        RemovePlan::NotConfigured => {
            msg.channel_id
                .say(&ctx.http, "No suggestion channel is configured.")
                .await?;
            return Ok(());
        }
        RemovePlan::Scan(channel) => channel,
    };

    let bot_id = ctx.cache.current_user().id;
    let messages = suggestion_channel
        .messages(&ctx.http, GetMessages::new().limit(limits::SUGGESTION_SCAN))
        .await?;
    let suggestions = collect_suggestions(
        messages.iter().map(|m| {
            let description = m.embeds.iter().find_map(|e| e.description.as_deref());
            (m.id, m.author.id, description)
        }),
        bot_id,
    );

    if suggestions.is_empty() {
        msg.channel_id.say(&ctx.http, "No suggestions found.").await?;
        return Ok(());
    }

    for chunk in format_listing(&suggestions) {
        msg.channel_id.say(&ctx.http, chunk).await?;
    }

    let reply = msg
        .author
        .await_reply(&ctx.shard)
        .channel_id(msg.channel_id)
        .timeout(limits::ADMIN_REPLY_TIMEOUT)
        .filter(|m: &Message| is_digit_reply(&m.content))
        .next()
        .await;

    let Some(reply) = reply else {
        msg.channel_id
            .say(&ctx.http, "Timed out. No suggestion was deleted.")
            .await?;
        return Ok(());
    };

    match select_index(&reply.content, suggestions.len()) {
        Ok(index) => {
            let target = &suggestions[index];
            suggestion_channel.delete_message(&ctx.http, target.id).await?;
            msg.channel_id
                .say(&ctx.http, format!("Suggestion {} deleted.", index + 1))
                .await?;
            info!("{} deleted suggestion {} ({})", msg.author.id, index + 1, target.id);
        }
        Err(_) => {
            msg.channel_id.say(&ctx.http, "Invalid selection.").await?;
        }
    }

    Ok(())
}
