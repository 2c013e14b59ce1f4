//! Request builder: typed payload records for each endpoint.
//!
//! Building is pure. Nothing here touches the network or the conversation
//! store, and every optional field is omitted from the JSON unless set.

use colloquy_core::error::ProviderError;
use colloquy_core::generation::{Document, GenerationConfig};
use colloquy_core::message::Message;
use colloquy_core::provider::{BilledUnits, ChatRequest, HistoryRef, PreamblePolicy};
use serde::{Deserialize, Serialize};

/// JSON body of a chat call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatPayload {
    pub message: String,

    /// The explicit model request before resolution, the resolved model after.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_history: Option<Vec<Message>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub preamble: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents: Option<Vec<Document>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_queries_only: Option<bool>,

    #[serde(flatten)]
    pub generation: GenerationConfig,
}

/// Assemble the chat payload for `request`.
///
/// `default_config` stands in when the request carries no generation config.
/// Fails with `InvalidRequest` before any network traffic when search-queries
/// mode is asked for without documents.
pub fn build_chat_payload(
    request: &ChatRequest,
    default_config: &GenerationConfig,
) -> Result<ChatPayload, ProviderError> {
    if request.search_queries_only && request.documents.is_empty() {
        return Err(ProviderError::InvalidRequest(
            "search_queries_only requires at least one document".into(),
        ));
    }

    let (conversation_id, chat_history, stored_preamble) = match &request.history {
        HistoryRef::None => (None, None, None),
        HistoryRef::Remote(id) => (Some(id.to_string()), None, None),
        HistoryRef::Local(history) => {
            let serialized = history.serialized(true);
            (None, serialized.chat_history, serialized.preamble)
        }
    };

    let preamble = match &request.preamble {
        PreamblePolicy::Inherit => stored_preamble,
        PreamblePolicy::Override(p) if !p.is_empty() => Some(p.clone()),
        PreamblePolicy::Override(_) | PreamblePolicy::Strip => None,
    };

    Ok(ChatPayload {
        message: request.message.clone(),
        model: request.model.clone(),
        conversation_id,
        chat_history,
        preamble,
        documents: (!request.documents.is_empty()).then(|| request.documents.clone()),
        search_queries_only: request.search_queries_only.then_some(true),
        generation: request.config.clone().unwrap_or_else(|| default_config.clone()),
    })
}

/// JSON body of a rerank call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RerankPayload {
    pub query: String,
    pub documents: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_n: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankResult {
    /// Position of the document in the request.
    pub index: usize,
    pub relevance_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billed_units: Option<BilledUnits>,
}

/// Rerank results, most relevant first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub results: Vec<RerankResult>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<RerankMeta>,
}
