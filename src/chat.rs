use serde::{Deserialize, Serialize};

use crate::utc_time::UtcDateTime;


#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

// How the view should render the text. Only assistant messages are formatted; everything
// else is shown literally.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatHint {
    Plain,
    Rich,
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatMessageId(u64);

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: ChatMessageId,
    pub role: ChatRole,
    pub text: String,
    pub move_notation: Option<String>,
    pub time: UtcDateTime,
    pub format: FormatHint,
}

// Append-only message log. Ids grow strictly and are never reused, even across `clear`.
#[derive(Clone, Debug, Default)]
pub struct ChatLog {
    messages: Vec<ChatMessage>,
    next_id: u64,
}

impl ChatMessageId {
    pub fn to_raw(self) -> u64 { self.0 }
    pub fn from_raw(raw: u64) -> Self { ChatMessageId(raw) }
}

impl ChatRole {
    pub fn format_hint(self) -> FormatHint {
        match self {
            ChatRole::Assistant => FormatHint::Rich,
            ChatRole::User | ChatRole::System => FormatHint::Plain,
        }
    }
}

impl ChatLog {
    pub fn new() -> Self { Self::default() }

    pub fn append(
        &mut self, role: ChatRole, text: String, move_notation: Option<String>, time: UtcDateTime,
    ) -> ChatMessageId {
        let id = ChatMessageId(self.next_id);
        self.next_id += 1;
        self.messages.push(ChatMessage {
            id,
            role,
            text,
            move_notation,
            time,
            format: role.format_hint(),
        });
        id
    }

    pub fn messages(&self) -> &[ChatMessage] { &self.messages }
    pub fn last(&self) -> Option<&ChatMessage> { self.messages.last() }
    pub fn len(&self) -> usize { self.messages.len() }
    pub fn is_empty(&self) -> bool { self.messages.is_empty() }

    // Messages added after `id`, for incremental rendering.
    pub fn messages_after(&self, id: Option<ChatMessageId>) -> &[ChatMessage] {
        let start = match id {
            None => 0,
            Some(id) => self.messages.partition_point(|m| m.id <= id),
        };
        &self.messages[start..]
    }

    // Starts a new conversation. Ids keep counting.
    pub fn clear(&mut self) { self.messages.clear(); }
}
