use crate::types::{Message, Sender, TranscriptMessage};

pub const EMPTY_TRANSCRIPT: &str = "Start a conversation with the AI...";
pub const TYPING_LINE: &str = "AI is thinking...";
pub const STREAMING_CURSOR: &str = " ▋";

pub fn sender_label(sender: Sender) -> &'static str {
    match sender {
        Sender::User => "You",
        Sender::Agent => "AI",
        Sender::System => "System",
    }
}

pub fn render_message(message: &Message) -> String {
    let mut line = format!("{}: {}", sender_label(message.sender), message.content);
    if message.streaming {
        line.push_str(STREAMING_CURSOR);
    }
    line
}

pub fn render_transcript(messages: &[Message], typing: bool) -> Vec<String> {
    let mut out = Vec::with_capacity(messages.len() + 1);
    if messages.is_empty() {
        out.push(EMPTY_TRANSCRIPT.to_string());
    }
    out.extend(messages.iter().map(render_message));
    if typing {
        out.push(TYPING_LINE.to_string());
    }
    out
}

pub fn status_line(connected: bool, message_count: usize) -> String {
    let mut line = if connected {
        "Status: ● Connected".to_string()
    } else {
        "Status: ● Disconnected".to_string()
    };
    if message_count > 0 {
        line.push_str(&format!("  Messages: {message_count}"));
    }
    line
}

/// Document chat entries, `role: text` per line.
pub fn render_history(history: &[TranscriptMessage]) -> Vec<String> {
    history
        .iter()
        .map(|msg| format!("{}: {}", msg.role.as_str(), msg.text))
        .collect()
}
