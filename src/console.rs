//! Console input for the interactive viewer
//!
//! Reads prompted lines from stdin without blocking the gateway runtime.

use async_trait::async_trait;
use std::fmt::Display;
use std::io::Write;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Console input closed")]
    Closed,
    #[error("Not a number: {0:?}")]
    NotANumber(String),
    #[error("Choice {choice} is out of range (1-{len})")]
    OutOfRange { choice: usize, len: usize },
    #[error("Nothing to choose from: {0}")]
    Empty(&'static str),
    #[error("No valid choice after {0} attempts")]
    TooManyAttempts(usize),
}

/// Source of prompted input lines
#[async_trait]
pub trait LineSource: Send {
    /// Print `prompt` and return the next line without its newline
    async fn read_line(&mut self, prompt: &str) -> Result<String, ConsoleError>;
}

/// Line source reading the process's stdin
pub struct StdinConsole {
    lines: Lines<BufReader<Stdin>>,
}

impl StdinConsole {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for StdinConsole {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LineSource for StdinConsole {
    async fn read_line(&mut self, prompt: &str) -> Result<String, ConsoleError> {
        {
            let mut stdout = std::io::stdout().lock();
            write!(stdout, "{}", prompt)?;
            stdout.flush()?;
        }
        self.lines.next_line().await?.ok_or(ConsoleError::Closed)
    }
}

/// Map a 1-based console choice onto a collection of `len` items
pub fn select_index(input: &str, len: usize) -> Result<usize, ConsoleError> {
    let trimmed = input.trim();
    let choice: usize = trimmed
        .parse()
        .map_err(|_| ConsoleError::NotANumber(trimmed.to_string()))?;
    if choice == 0 || choice > len {
        return Err(ConsoleError::OutOfRange { choice, len });
    }
    Ok(choice - 1)
}

/// Render `"{n}. {name} (ID: {id})"` lines, numbered from 1
pub fn numbered_lines<N, I>(items: impl IntoIterator<Item = (N, I)>) -> Vec<String>
where
    N: Display,
    I: Display,
{
    items
        .into_iter()
        .enumerate()
        .map(|(i, (name, id))| format!("{}. {} (ID: {})", i + 1, name, id))
        .collect()
}
