//! Chat orchestration.
//!
//! `ChatContext` is the explicit context object every exchange goes through:
//! it owns the conversation store and the provider, so nothing here lives in
//! process-wide state. One exchange reads the history, builds the request,
//! calls the provider (through the length limiter when a budget is set) and
//! appends the turn.

use colloquy_core::error::Result;
use colloquy_core::generation::{Document, GenerationConfig};
use colloquy_core::message::{ConversationId, Message};
use colloquy_core::provider::{ChatProvider, ChatReply, ChatRequest, HistoryRef, PreamblePolicy};
use colloquy_core::store::ConversationStore;
use std::sync::Arc;
use tracing::debug;

use crate::limiter::LengthLimiter;

/// Per-reply knobs.
#[derive(Debug, Clone)]
pub struct ReplyOptions {
    pub preamble: PreamblePolicy,
    pub documents: Vec<Document>,
    pub config: Option<GenerationConfig>,
    pub model: Option<String>,
    pub search_queries_only: bool,
    /// Append the user and assistant turns to the conversation.
    pub update_history: bool,
    /// Send only the conversation id and let the service recall the turns.
    /// Experimental: the service-side memory is not guaranteed. An inherited
    /// preamble is sent as an override, since the service never sees the
    /// stored history.
    pub remote_history: bool,
}

impl Default for ReplyOptions {
    fn default() -> Self {
        Self {
            preamble: PreamblePolicy::Inherit,
            documents: Vec::new(),
            config: None,
            model: None,
            search_queries_only: false,
            update_history: true,
            remote_history: false,
        }
    }
}

pub struct ChatContext {
    store: ConversationStore,
    provider: Arc<dyn ChatProvider>,
    limiter: Option<LengthLimiter>,
}

impl ChatContext {
    pub fn new(provider: Arc<dyn ChatProvider>) -> Self {
        Self {
            store: ConversationStore::new(),
            provider,
            limiter: None,
        }
    }

    /// Route every reply through `limiter`. An unbounded limiter is ignored.
    pub fn with_limiter(mut self, limiter: LengthLimiter) -> Self {
        self.limiter = (!limiter.is_unbounded()).then_some(limiter);
        self
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn provider(&self) -> &dyn ChatProvider {
        self.provider.as_ref()
    }

    pub async fn create_conversation(&self, preamble: Option<String>) -> ConversationId {
        self.store.create_conversation(preamble).await
    }

    /// Reply to `message` within conversation `id`.
    ///
    /// The conversation stays locked from reading its history to appending the
    /// turn, so concurrent replies on one id run one after another. An unknown
    /// id fails before any network call. The store is only touched after a
    /// successful call, and only when the reply carries prose text.
    pub async fn reply(
        &self,
        id: &ConversationId,
        message: &str,
        options: ReplyOptions,
    ) -> Result<ChatReply> {
        let mut history = self.store.lock(id).await?;

        // The service only sees an id on the remote path, so the stored
        // preamble has to travel as an explicit override.
        let (history_ref, preamble) = if options.remote_history {
            let preamble = match (options.preamble, history.preamble()) {
                (PreamblePolicy::Inherit, Some(stored)) => PreamblePolicy::Override(stored.to_string()),
                (policy, _) => policy,
            };
            (HistoryRef::Remote(id.clone()), preamble)
        } else {
            (HistoryRef::Local((*history).clone()), options.preamble)
        };

        let mut request = ChatRequest::new(message)
            .with_history(history_ref)
            .with_preamble(preamble)
            .with_documents(options.documents);
        request.config = options.config;
        request.model = options.model;
        request.search_queries_only = options.search_queries_only;

        debug!(conversation = %id, provider = self.provider.name(), "Sending turn");
        let reply = match &self.limiter {
            Some(limiter) => limiter.limit(self.provider.as_ref(), request).await?,
            None => self.provider.chat(request).await?,
        };

        if options.update_history {
            if let Some(text) = &reply.text {
                history.push(Message::user(message));
                history.push(Message::assistant(text.as_str()));
            }
        }

        Ok(reply)
    }
}
