//! Message and conversation history domain types.
//!
//! A conversation is a system preamble plus an ordered list of role-tagged
//! messages. Insertion order is the turn order sent to the model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ConversationError;

/// Unique identifier for a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender in a conversation.
///
/// Serialized with the service's wire names; the assistant is `CHATBOT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// System instructions
    #[serde(rename = "SYSTEM", alias = "system")]
    System,
    /// The end user
    #[serde(rename = "USER", alias = "user")]
    User,
    /// The model
    #[serde(rename = "CHATBOT", alias = "assistant", alias = "chatbot")]
    Assistant,
    /// Tool output
    #[serde(rename = "TOOL", alias = "tool")]
    Tool,
}

impl Role {
    /// The name the remote service uses for this role.
    pub fn wire_name(self) -> &'static str {
        match self {
            Role::System => "SYSTEM",
            Role::User => "USER",
            Role::Assistant => "CHATBOT",
            Role::Tool => "TOOL",
        }
    }
}

impl FromStr for Role {
    type Err = ConversationError;

    /// Accepts the wire names and the lowercase role names, nothing else.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SYSTEM" | "system" => Ok(Role::System),
            "USER" | "user" => Ok(Role::User),
            "CHATBOT" | "chatbot" | "assistant" => Ok(Role::Assistant),
            "TOOL" | "tool" => Ok(Role::Tool),
            other => Err(ConversationError::UnknownRole(other.to_string())),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// A single message in a conversation. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    role: Role,
    #[serde(rename = "msg")]
    text: String,
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }

    /// Build a message from an untyped role string, rejecting unknown roles.
    pub fn parse(role: &str, text: impl Into<String>) -> Result<Self, ConversationError> {
        Ok(Self::new(role.parse()?, text))
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    pub fn tool(text: impl Into<String>) -> Self {
        Self::new(Role::Tool, text)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// An optional system preamble plus the ordered message list of one conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationHistory {
    /// Empty string means "no preamble".
    #[serde(default)]
    preamble: String,

    #[serde(default)]
    messages: Vec<Message>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The wire shape of a history: `chat_history` only when there are messages,
/// `preamble` only when requested and non-empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SerializedHistory {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_history: Option<Vec<Message>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preamble: Option<String>,
}

impl ConversationHistory {
    pub fn new(preamble: Option<String>, messages: Vec<Message>) -> Self {
        let now = Utc::now();
        Self {
            preamble: preamble.unwrap_or_default(),
            messages,
            created_at: now,
            updated_at: now,
        }
    }

    /// The preamble, if one is set.
    pub fn preamble(&self) -> Option<&str> {
        (!self.preamble.is_empty()).then_some(self.preamble.as_str())
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

    pub fn push(&mut self, message: Message) {
        self.updated_at = Utc::now();
        self.messages.push(message);
    }

    /// Wholesale replacement. The preamble only changes when `update_preamble`
    /// is set, so a stale `preamble` value is harmless otherwise.
    pub fn replace(&mut self, messages: Vec<Message>, preamble: Option<String>, update_preamble: bool) {
        self.updated_at = Utc::now();
        self.messages = messages;
        if update_preamble {
            self.preamble = preamble.unwrap_or_default();
        }
    }

    pub fn set_preamble(&mut self, preamble: Option<String>) {
        self.updated_at = Utc::now();
        self.preamble = preamble.unwrap_or_default();
    }

    /// All messages, optionally led by a synthetic system message carrying the
    /// preamble. The synthetic message is never stored.
    pub fn all_messages(&self, include_preamble: bool) -> Vec<Message> {
        let mut out = Vec::with_capacity(self.messages.len() + 1);
        if include_preamble {
            if let Some(preamble) = self.preamble() {
                out.push(Message::system(preamble));
            }
        }
        out.extend(self.messages.iter().cloned());
        out
    }

    pub fn serialized(&self, include_preamble: bool) -> SerializedHistory {
        SerializedHistory {
            chat_history: (!self.messages.is_empty()).then(|| self.messages.clone()),
            preamble: if include_preamble {
                self.preamble().map(str::to_string)
            } else {
                None
            },
        }
    }
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new(None, Vec::new())
    }
}
