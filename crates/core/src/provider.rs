//! Provider trait. The abstraction over the hosted chat service.
//!
//! A `ChatProvider` takes a fully described chat request and returns the
//! service's reply. The length limiter and the conversation context only
//! ever talk to this trait, so tests swap in scripted providers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::generation::{Document, GenerationConfig};
use crate::message::{ConversationHistory, ConversationId};

/// Which conversation context accompanies a request.
#[derive(Debug, Clone, Default)]
pub enum HistoryRef {
    /// No prior turns.
    #[default]
    None,
    /// Let the service recall the conversation by id. Only the id is sent.
    /// The service-side memory behind this is unverified.
    Remote(ConversationId),
    /// Send the materialized message list.
    Local(ConversationHistory),
}

/// What to do with the system preamble for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PreamblePolicy {
    /// Use the conversation's stored preamble, if any.
    #[default]
    Inherit,
    /// Send this preamble instead. Conversation state is not touched.
    Override(String),
    /// Never send a preamble.
    Strip,
}

impl PreamblePolicy {
    /// Maps the loose "string or bool" form: `None` and `""` strip.
    pub fn from_option(preamble: Option<&str>) -> Self {
        match preamble {
            Some(p) if !p.is_empty() => PreamblePolicy::Override(p.to_string()),
            _ => PreamblePolicy::Strip,
        }
    }
}

/// Everything needed to assemble one chat payload.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub message: String,
    pub history: HistoryRef,
    pub preamble: PreamblePolicy,
    pub documents: Vec<Document>,
    /// `None` falls back to `GenerationConfig::default()`.
    pub config: Option<GenerationConfig>,
    /// Explicit model; validated against the capability registry.
    pub model: Option<String>,
    /// Ask for search queries instead of prose. Requires documents.
    pub search_queries_only: bool,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_history(mut self, history: HistoryRef) -> Self {
        self.history = history;
        self
    }

    pub fn with_preamble(mut self, preamble: PreamblePolicy) -> Self {
        self.preamble = preamble;
        self
    }

    pub fn with_documents(mut self, documents: Vec<Document>) -> Self {
        self.documents = documents;
        self
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn search_queries_only(mut self) -> Self {
        self.search_queries_only = true;
        self
    }

    /// The same request carrying a different user message.
    pub fn with_message(&self, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..self.clone()
        }
    }
}

/// Billed token counts reported by the service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BilledUnits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplyMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billed_units: Option<BilledUnits>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_id: Option<String>,
}

/// A decoded chat reply. Fields without a typed slot are kept in `extra`, so
/// re-serializing yields the body the service sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    /// Prose reply. Absent for search-queries-only replies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_queries: Option<Vec<SearchQuery>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ReplyMeta>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ChatReply {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }
}

/// The core provider trait.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// A human-readable name for this provider.
    fn name(&self) -> &str;

    /// Send one chat request and return the decoded reply.
    async fn chat(&self, request: ChatRequest) -> std::result::Result<ChatReply, ProviderError>;
}
