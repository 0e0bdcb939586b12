//! Builds the message list sent to the completion API.

use crate::llm::ChatMessage;
use crate::store::Turn;

/// System instruction, then stored history in order, then the new message.
pub fn build_messages(system_prompt: &str, history: &[Turn], user_message: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(system_prompt));
    messages.extend(history.iter().map(|turn| ChatMessage {
        role: turn.role.into(),
        content: turn.content.clone(),
    }));
    messages.push(ChatMessage::user(user_message));
    messages
}
