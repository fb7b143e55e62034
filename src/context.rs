use crate::types::{ChatHistory, Role, TranscriptMessage};

/// Expands stored chat records into alternating user/assistant entries.
pub fn flatten_history(history: &ChatHistory) -> Vec<TranscriptMessage> {
    history
        .messages
        .iter()
        .flat_map(|record| {
            [
                TranscriptMessage {
                    role: Role::User,
                    text: record.user_message.clone(),
                },
                TranscriptMessage {
                    role: Role::Assistant,
                    text: record.ai_response.clone(),
                },
            ]
        })
        .collect()
}
