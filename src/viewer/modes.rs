//! Mode dispatcher and the Read/Chat/Both/Past handlers
//!
//! Gateway events are never re-registered here; handlers only flip the
//! mode recorded in [`ViewerState`] and the gateway handler reads it.

use chrono::{DateTime, Duration, Utc};
use serenity::all::MessageId;
use tracing::{debug, warn};

use super::{ChannelIo, ChatLine, ViewerState};
use crate::config::limits;
use crate::console::{ConsoleError, LineSource};

/// Milliseconds between the Unix epoch and the first Discord snowflake
const DISCORD_EPOCH_MS: i64 = 1_420_070_400_000;

pub const SEND_PROMPT: &str = "Press Enter to send a message...";
pub const MESSAGE_PROMPT: &str =
    "Enter your message (or type 'exit' to quit, or press 'c' to change mode): ";
const MODE_PROMPT: &str = "Enter the mode number (1, 2, 3, or 4): ";

/// Console viewing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Read,
    Chat,
    Both,
    Past,
}

impl Mode {
    pub fn from_choice(s: &str) -> Option<Self> {
        match s.trim() {
            "1" => Some(Mode::Read),
            "2" => Some(Mode::Chat),
            "3" => Some(Mode::Both),
            "4" => Some(Mode::Past),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Read => "Read",
            Mode::Chat => "Chat",
            Mode::Both => "Both",
            Mode::Past => "Past",
        }
    }
}

fn print_menu() {
    println!("Choose mode:");
    println!("1. Read Mode (only view messages)");
    println!("2. Chat Mode (only send messages)");
    println!("3. Both Mode (view and send messages alternately)");
    println!("4. Past Mode (view messages from the last {} minutes)", limits::PAST_WINDOW_MINUTES);
}

/// Show the menu until a valid mode is entered, up to the attempt limit
pub async fn prompt_mode<L: LineSource + ?Sized>(console: &mut L) -> Result<Mode, ConsoleError> {
    for _ in 0..limits::MODE_MENU_ATTEMPTS {
        print_menu();
        let input = console.read_line(MODE_PROMPT).await?;
        match Mode::from_choice(&input) {
            Some(mode) => return Ok(mode),
            None => println!("Invalid mode selected."),
        }
    }
    Err(ConsoleError::TooManyAttempts(limits::MODE_MENU_ATTEMPTS))
}

/// What the console flow does after the dispatcher returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Read mode: incoming messages keep printing, the console is done
    Detached,
    /// `exit` was entered: close the connection
    Exit,
    /// Past mode finished: start over at guild selection
    Reselect,
}

/// Outcome of a Chat/Both input loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    Exit,
    ChangeMode,
}

enum Input<'a> {
    Exit,
    ChangeMode,
    Empty,
    Text(&'a str),
}

fn classify(text: &str) -> Input<'_> {
    let command = text.trim();
    if command.eq_ignore_ascii_case("exit") {
        Input::Exit
    } else if command.eq_ignore_ascii_case("c") {
        Input::ChangeMode
    } else if command.is_empty() {
        Input::Empty
    } else {
        Input::Text(text)
    }
}

/// Prompt-and-send loop shared by Chat and Both mode.
///
/// With `pause` set, the display is paused from the message prompt until
/// the send completes or the entry is aborted.
pub async fn run_input_loop<L, C>(
    console: &mut L,
    channel: &C,
    pause: Option<&ViewerState>,
) -> Result<InputOutcome, ConsoleError>
where
    L: LineSource + ?Sized,
    C: ChannelIo + ?Sized,
{
    loop {
        console.read_line(SEND_PROMPT).await?;
        let _paused = pause.map(ViewerState::pause);
        let text = console.read_line(MESSAGE_PROMPT).await?;

        match classify(&text) {
            Input::Exit => {
                println!("Exiting...");
                return Ok(InputOutcome::Exit);
            }
            Input::ChangeMode => {
                println!("Switching mode...");
                return Ok(InputOutcome::ChangeMode);
            }
            Input::Empty => continue,
            Input::Text(content) => match channel.send(content).await {
                Ok(()) => println!("Message sent to {}", channel.name()),
                Err(e) => {
                    warn!("Failed to send message to {}: {}", channel.name(), e);
                    println!("Failed to send message: {}", e);
                }
            },
        }
    }
}

/// The last messages not written by the bot, oldest first
pub async fn backlog<C: ChannelIo + ?Sized>(
    channel: &C,
    state: &ViewerState,
) -> Result<Vec<ChatLine>, crate::BoxError> {
    let bot_id = state.bot_id();
    let lines = channel.latest(limits::BACKLOG_SIZE).await?;
    Ok(lines
        .into_iter()
        .filter(|line| Some(line.author_id) != bot_id)
        .collect())
}

/// First snowflake that could have been created at `at`
pub fn snowflake_at(at: DateTime<Utc>) -> MessageId {
    let ms = (at.timestamp_millis() - DISCORD_EPOCH_MS).max(0) as u64;
    MessageId::new((ms << 22).max(1))
}

/// Result of a Past mode fetch
#[derive(Debug, PartialEq, Eq)]
pub enum PastMessages {
    NoPermission,
    Recent(Vec<ChatLine>),
    Fallback(Vec<ChatLine>),
}

/// Messages from the past window, or the last few when the window is empty
pub async fn past_messages<C: ChannelIo + ?Sized>(
    channel: &C,
    now: DateTime<Utc>,
) -> Result<PastMessages, crate::BoxError> {
    if !channel.can_read_history().await? {
        return Ok(PastMessages::NoPermission);
    }

    let cutoff = snowflake_at(now - Duration::minutes(limits::PAST_WINDOW_MINUTES));
    let recent = channel.since(cutoff, limits::PAST_LIMIT).await?;
    if !recent.is_empty() {
        return Ok(PastMessages::Recent(recent));
    }

    debug!("No messages in the last {} minutes, falling back", limits::PAST_WINDOW_MINUTES);
    Ok(PastMessages::Fallback(channel.latest(limits::PAST_FALLBACK).await?))
}

async fn show_past<C: ChannelIo + ?Sized>(channel: &C) {
    match past_messages(channel, Utc::now()).await {
        Ok(PastMessages::NoPermission) => {
            println!("Missing permission to read message history in {}", channel.name());
        }
        Ok(PastMessages::Recent(lines)) => {
            println!(
                "Messages from the last {} minutes in {}:",
                limits::PAST_WINDOW_MINUTES,
                channel.name()
            );
            lines.iter().for_each(|line| println!("{}", line));
        }
        Ok(PastMessages::Fallback(lines)) => {
            println!(
                "No messages in the last {} minutes. Showing the last {} messages:",
                limits::PAST_WINDOW_MINUTES,
                lines.len()
            );
            lines.iter().for_each(|line| println!("{}", line));
        }
        Err(e) => {
            warn!("Past mode fetch failed: {}", e);
            println!("Failed to fetch past messages: {}", e);
        }
    }
}

/// Run the mode menu against the selected channel until a handler ends the flow
pub async fn dispatch<L, C>(
    console: &mut L,
    channel: &C,
    state: &ViewerState,
) -> Result<Flow, ConsoleError>
where
    L: LineSource + ?Sized,
    C: ChannelIo + ?Sized,
{
    loop {
        let mode = prompt_mode(console).await?;
        println!("Switched to {} Mode...", mode.as_str());

        let outcome = match mode {
            Mode::Read => {
                state.set_mode(Some(Mode::Read));
                return Ok(Flow::Detached);
            }
            Mode::Chat => {
                state.set_mode(Some(Mode::Chat));
                run_input_loop(console, channel, None).await?
            }
            Mode::Both => {
                match backlog(channel, state).await {
                    Ok(lines) => lines.iter().for_each(|line| println!("{}", line)),
                    Err(e) => warn!("Failed to fetch backlog: {}", e),
                }
                state.set_mode(Some(Mode::Both));
                run_input_loop(console, channel, Some(state)).await?
            }
            Mode::Past => {
                state.set_mode(None);
                show_past(channel).await;
                return Ok(Flow::Reselect);
            }
        };

        state.set_mode(None);
        match outcome {
            InputOutcome::Exit => return Ok(Flow::Exit),
            InputOutcome::ChangeMode => continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::scripted::ScriptedConsole;
    use crate::viewer::channel::fake::{line, FakeChannel};
    use crate::viewer::test_support;
    use async_trait::async_trait;
    use serenity::all::UserId;
    use std::sync::Arc;

    /// Records the pause flag every time a prompt is shown
    struct WatchingConsole {
        inner: ScriptedConsole,
        state: Arc<ViewerState>,
        paused_at_prompt: Vec<(String, bool)>,
    }

    #[async_trait]
    impl LineSource for WatchingConsole {
        async fn read_line(&mut self, prompt: &str) -> Result<String, ConsoleError> {
            self.paused_at_prompt
                .push((prompt.to_string(), self.state.is_paused()));
            self.inner.read_line(prompt).await
        }
    }

    fn viewer_state() -> Arc<ViewerState> {
        let state = Arc::new(ViewerState::new());
        state.set_bot_id(UserId::new(1));
        state.select(test_support::selected(100, "general"));
        state
    }

    #[test]
    fn test_mode_from_choice() {
        assert_eq!(Mode::from_choice("1"), Some(Mode::Read));
        assert_eq!(Mode::from_choice(" 4 "), Some(Mode::Past));
        assert_eq!(Mode::from_choice("5"), None);
        assert_eq!(Mode::from_choice("read"), None);
    }

    #[tokio::test]
    async fn test_prompt_mode_retries_then_gives_up() {
        let mut console = ScriptedConsole::new(&["9", "x", "2"]);
        assert_eq!(prompt_mode(&mut console).await.unwrap(), Mode::Chat);

        let mut console = ScriptedConsole::new(&["0", "0", "0", "0", "0", "1"]);
        assert!(matches!(
            prompt_mode(&mut console).await,
            Err(ConsoleError::TooManyAttempts(5))
        ));
        assert_eq!(console.prompts.len(), 5);
    }

    #[tokio::test]
    async fn test_chat_loop_sends_and_exits() {
        let channel = FakeChannel::new(Vec::new());
        let mut console = ScriptedConsole::new(&["", "hello", "", "  ", "", "EXIT"]);
        let outcome = run_input_loop(&mut console, &channel, None).await.unwrap();
        assert_eq!(outcome, InputOutcome::Exit);
        assert_eq!(*channel.sent.lock(), vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn test_both_loop_pauses_only_while_composing() {
        let state = viewer_state();
        let mut channel = FakeChannel::new(Vec::new());
        channel.pause_watch = Some(state.clone());
        let mut console = WatchingConsole {
            inner: ScriptedConsole::new(&["", "first", "", "c"]),
            state: state.clone(),
            paused_at_prompt: Vec::new(),
        };

        let outcome = run_input_loop(&mut console, &channel, Some(&state)).await.unwrap();
        assert_eq!(outcome, InputOutcome::ChangeMode);
        assert_eq!(*channel.paused_at_send.lock(), vec![true]);
        let observed: Vec<bool> = console.paused_at_prompt.iter().map(|(_, p)| *p).collect();
        assert_eq!(observed, vec![false, true, false, true]);
        assert!(!state.is_paused());
    }

    #[tokio::test]
    async fn test_both_loop_resumes_after_failed_send() {
        let state = viewer_state();
        let mut channel = FakeChannel::new(Vec::new());
        channel.fail_sends = true;
        let mut console = ScriptedConsole::new(&["", "lost"]);

        let result = run_input_loop(&mut console, &channel, Some(&state)).await;
        assert!(matches!(result, Err(ConsoleError::Closed)));
        assert!(!state.is_paused());
        assert!(channel.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_backlog_skips_bot_messages() {
        let state = viewer_state();
        let channel = FakeChannel::new(vec![line(1, 2, "a"), line(2, 1, "mine"), line(3, 3, "b")]);
        let lines = backlog(&channel, &state).await.unwrap();
        let contents: Vec<&str> = lines.iter().map(|l| l.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_past_falls_back_to_last_twenty() {
        let history: Vec<ChatLine> = (1..=30).map(|i| line(i, 2, &format!("m{}", i))).collect();
        let channel = FakeChannel::new(history);

        match past_messages(&channel, Utc::now()).await.unwrap() {
            PastMessages::Fallback(lines) => {
                assert_eq!(lines.len(), 20);
                assert_eq!(lines.first().unwrap().content, "m11");
                assert_eq!(lines.last().unwrap().content, "m30");
            }
            other => panic!("expected fallback, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_past_returns_recent_window() {
        let now = Utc::now();
        let old = snowflake_at(now - Duration::minutes(30)).get();
        let fresh = snowflake_at(now - Duration::minutes(2)).get();
        let channel = FakeChannel::new(vec![line(old, 2, "old"), line(fresh, 3, "fresh")]);

        match past_messages(&channel, now).await.unwrap() {
            PastMessages::Recent(lines) => {
                assert_eq!(lines.len(), 1);
                assert_eq!(lines[0].content, "fresh");
            }
            other => panic!("expected recent, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_past_without_permission_fetches_nothing() {
        let mut channel = FakeChannel::new(vec![line(1, 2, "hidden")]);
        channel.readable = false;
        assert_eq!(
            past_messages(&channel, Utc::now()).await.unwrap(),
            PastMessages::NoPermission
        );
        assert!(!channel.since_called.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn test_snowflake_at_epoch_offsets() {
        let at = DateTime::from_timestamp_millis(DISCORD_EPOCH_MS + 1000).unwrap();
        assert_eq!(snowflake_at(at).get(), 1000 << 22);
        let before = DateTime::from_timestamp_millis(0).unwrap();
        assert_eq!(snowflake_at(before).get(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_change_mode_does_not_nest() {
        let state = viewer_state();
        let channel = FakeChannel::new(Vec::new());
        let mut console = ScriptedConsole::new(&["2", "", "c", "2", "", "c", "1"]);

        let flow = dispatch(&mut console, &channel, &state).await.unwrap();
        assert_eq!(flow, Flow::Detached);
        assert_eq!(state.mode(), Some(Mode::Read));
    }

    #[tokio::test]
    async fn test_dispatch_exit_and_past() {
        let state = viewer_state();
        let channel = FakeChannel::new(vec![line(1, 2, "hi")]);

        let mut console = ScriptedConsole::new(&["3", "", "bye", "", "exit"]);
        assert_eq!(dispatch(&mut console, &channel, &state).await.unwrap(), Flow::Exit);
        assert_eq!(*channel.sent.lock(), vec!["bye".to_string()]);
        assert_eq!(state.mode(), None);

        let mut console = ScriptedConsole::new(&["4"]);
        assert_eq!(dispatch(&mut console, &channel, &state).await.unwrap(), Flow::Reselect);
    }
}
