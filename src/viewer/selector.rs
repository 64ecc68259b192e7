//! Guild and channel selection on the console

use serenity::all::{ChannelType, GuildChannel, GuildInfo, Http};
use std::fmt::Display;

use super::SelectedChannel;
use crate::console::{numbered_lines, select_index, ConsoleError, LineSource};
use crate::BoxError;

/// Print `items` numbered from 1 and return the one the user picks
pub async fn pick<'a, L, T, N, I>(
    console: &mut L,
    items: &'a [T],
    what: &'static str,
    prompt: &str,
    describe: impl Fn(&T) -> (N, I),
) -> Result<&'a T, ConsoleError>
where
    L: LineSource + ?Sized,
    N: Display,
    I: Display,
{
    if items.is_empty() {
        return Err(ConsoleError::Empty(what));
    }
    for line in numbered_lines(items.iter().map(describe)) {
        println!("{}", line);
    }
    let input = console.read_line(prompt).await?;
    Ok(&items[select_index(&input, items.len())?])
}

/// Text channels in display order
pub fn text_channels(channels: impl IntoIterator<Item = GuildChannel>) -> Vec<GuildChannel> {
    let mut text: Vec<GuildChannel> = channels
        .into_iter()
        .filter(|c| c.kind == ChannelType::Text)
        .collect();
    text.sort_by_key(|c| (c.position, c.id));
    text
}

/// Walk the user through choosing a guild, then one of its text channels
pub async fn select_channel<L: LineSource + ?Sized>(
    console: &mut L,
    http: &Http,
) -> Result<SelectedChannel, BoxError> {
    let guilds: Vec<GuildInfo> = http.get_guilds(None, None).await?;
    let guild = pick(
        console,
        &guilds,
        "guilds",
        "Enter the number of the guild to join: ",
        |g| (g.name.clone(), g.id),
    )
    .await?;
    println!("Selected guild: {}", guild.name);

    let channels = text_channels(guild.id.channels(http).await?.into_values());
    let channel = pick(
        console,
        &channels,
        "text channels",
        "Enter the number of the channel to chat in: ",
        |c| (c.name.clone(), c.id),
    )
    .await?;
    println!("Selected channel: {}", channel.name);

    Ok(SelectedChannel {
        guild_id: guild.id,
        id: channel.id,
        name: channel.name.clone(),
    })
}
