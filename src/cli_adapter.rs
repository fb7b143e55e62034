use anyhow::{bail, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;

/// One line typed into the agent chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    Message(String),
    Clear,
    Show,
    Status,
    Help,
    Quit,
}

pub fn parse_input(line: &str) -> Result<ChatInput> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        bail!("empty input");
    }

    let Some(command) = trimmed.strip_prefix('/') else {
        return Ok(ChatInput::Message(trimmed.to_string()));
    };

    // A leading slash followed by a space sends the rest literally.
    if let Some(rest) = command.strip_prefix(' ') {
        let rest = rest.trim();
        if rest.is_empty() {
            bail!("empty input");
        }
        return Ok(ChatInput::Message(rest.to_string()));
    }

    match command {
        "clear" => Ok(ChatInput::Clear),
        "show" | "history" => Ok(ChatInput::Show),
        "status" => Ok(ChatInput::Status),
        "help" | "?" => Ok(ChatInput::Help),
        "quit" | "exit" | "q" => Ok(ChatInput::Quit),
        "" => bail!("empty command"),
        other => bail!("unknown command: /{other}"),
    }
}

pub const CHAT_HELP: &str = "\
commands:
  /show     print the transcript
  /status   connection status
  /clear    clear the transcript
  /quit     leave the chat
anything else is sent to the agent";

/// Forwards stdin lines into a channel so they can be raced against socket
/// events. The channel closes at end of input.
pub fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
        while let Some(line) = lines.next().await {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "stdin read failed");
                    break;
                }
            }
        }
    });
    rx
}

/// Reads a single trimmed line from stdin after printing `label`.
pub async fn prompt_line(label: &str) -> Result<String> {
    use std::io::Write;
    print!("{label}: ");
    std::io::stdout().flush()?;
    // std's stdin buffer is process-wide, so successive prompts never lose
    // piped lines.
    let line = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map(|_| line)
    })
    .await??;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
