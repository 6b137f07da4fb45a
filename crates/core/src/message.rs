//! Message and Transcript domain types.
//!
//! These are the core value objects that flow through the copilot:
//! operator types a question → AgentLoop appends it → the model streams an
//! answer into an assistant message → tool results land as system messages.
//!
//! Messages are addressed by a stable [`MessageId`] assigned at creation, so
//! a streaming update can never land on the wrong entry when another part of
//! the console removes or inserts messages mid-turn.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default greeting shown in a fresh (or cleared) conversation.
pub const DEFAULT_GREETING: &str =
    "Hi! I'm the FleetPilot copilot. Ask me about your devices, firmware campaigns, or dashboards.";

/// Stable identifier for a message in a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The console operator
    User,
    /// The copilot
    Assistant,
    /// Tool execution records and other orchestrator notes
    System,
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Stable message ID
    pub id: MessageId,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }
}

/// The ordered, append-only sequence of messages in one conversation.
///
/// The only destructive operations are [`Transcript::remove`] (used by UI
/// layers that retract a message) and [`Transcript::clear`], which resets the
/// conversation to a single greeting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    greeting: String,
    messages: Vec<Message>,
    updated_at: DateTime<Utc>,
}

impl Transcript {
    /// Create a transcript seeded with the given greeting.
    pub fn new(greeting: impl Into<String>) -> Self {
        let greeting = greeting.into();
        Self {
            messages: vec![Message::assistant(&greeting)],
            greeting,
            updated_at: Utc::now(),
        }
    }

    /// Append a message, returning its ID.
    pub fn push(&mut self, message: Message) -> MessageId {
        let id = message.id;
        self.updated_at = Utc::now();
        self.messages.push(message);
        id
    }

    /// Append a streamed fragment to the message with `id`.
    ///
    /// Returns `false` if the message no longer exists.
    pub fn append_to(&mut self, id: MessageId, fragment: &str) -> bool {
        match self.get_mut(id) {
            Some(msg) => {
                msg.content.push_str(fragment);
                self.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Empty the content of the message with `id`, keeping its position.
    pub fn reset_content(&mut self, id: MessageId) -> bool {
        match self.get_mut(id) {
            Some(msg) => {
                msg.content.clear();
                self.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Remove a message by ID.
    pub fn remove(&mut self, id: MessageId) -> Option<Message> {
        let pos = self.messages.iter().position(|m| m.id == id)?;
        self.updated_at = Utc::now();
        Some(self.messages.remove(pos))
    }

    /// Reset the conversation to the single greeting message.
    pub fn clear(&mut self) {
        self.messages = vec![Message::assistant(&self.greeting)];
        self.updated_at = Utc::now();
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    fn get_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The most recent message with the given role.
    pub fn last_by_role(&self, role: Role) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == role)
    }

    /// Number of messages with the given role.
    pub fn count_role(&self, role: Role) -> usize {
        self.messages.iter().filter(|m| m.role == role).count()
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new(DEFAULT_GREETING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("How many devices are offline?");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "How many devices are offline?");
    }

    #[test]
    fn new_transcript_holds_greeting() {
        let transcript = Transcript::new("hello operator");
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.messages()[0].role, Role::Assistant);
        assert_eq!(transcript.messages()[0].content, "hello operator");
    }

    #[test]
    fn append_by_id_survives_removal_of_earlier_messages() {
        let mut transcript = Transcript::default();
        let note = transcript.push(Message::system("tool output"));
        let reply = transcript.push(Message::assistant(""));

        transcript.remove(note);
        assert!(transcript.append_to(reply, "Hel"));
        assert!(transcript.append_to(reply, "lo"));
        assert_eq!(transcript.get(reply).unwrap().content, "Hello");
    }

    #[test]
    fn append_to_missing_message_is_rejected() {
        let mut transcript = Transcript::default();
        let id = transcript.push(Message::assistant(""));
        transcript.remove(id);
        assert!(!transcript.append_to(id, "lost"));
    }

    #[test]
    fn reset_content_keeps_position() {
        let mut transcript = Transcript::default();
        let reply = transcript.push(Message::assistant("{\"tool\":\"x\"}"));
        transcript.push(Message::system("after"));
        assert!(transcript.reset_content(reply));
        assert_eq!(transcript.messages()[1].id, reply);
        assert!(transcript.messages()[1].content.is_empty());
    }

    #[test]
    fn clear_resets_to_greeting() {
        let mut transcript = Transcript::new("hi");
        transcript.push(Message::user("a"));
        transcript.push(Message::assistant("b"));
        transcript.clear();
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.messages()[0].content, "hi");
    }

    #[test]
    fn role_queries() {
        let mut transcript = Transcript::default();
        transcript.push(Message::user("first"));
        transcript.push(Message::user("second"));
        assert_eq!(transcript.count_role(Role::User), 2);
        assert_eq!(transcript.last_by_role(Role::User).unwrap().content, "second");
    }

    #[test]
    fn message_serialization_uses_lowercase_roles() {
        let msg = Message::system("Tool result");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""role":"system""#));
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, msg.id);
    }
}
