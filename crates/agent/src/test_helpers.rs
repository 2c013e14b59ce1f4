//! Shared test helpers for agent tests.

use async_trait::async_trait;
use colloquy_core::error::ProviderError;
use colloquy_core::provider::{ChatProvider, ChatReply, ChatRequest, HistoryRef};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// A mock provider that plays back scripted replies.
///
/// Each call returns the next reply in the queue; the last one repeats.
/// Every request is recorded.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<ChatReply, ProviderError>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<ChatReply>) -> Self {
        Self::with_results(replies.into_iter().map(Ok).collect())
    }

    pub fn with_results(replies: Vec<Result<ChatReply, ProviderError>>) -> Self {
        assert!(!replies.is_empty(), "ScriptedProvider needs at least one reply");
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Plain text replies.
    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| ChatReply::from_text(*t)).collect())
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatReply, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let mut replies = self.replies.lock().unwrap();
        if replies.len() > 1 {
            replies.pop_front().unwrap()
        } else {
            replies.front().cloned().unwrap()
        }
    }
}

/// A mock model that answers the first message with `initial` and every
/// shortening request with the first half of the text it was asked to shorten.
pub struct HalvingProvider {
    initial: String,
    calls: Mutex<usize>,
}

impl HalvingProvider {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            initial: initial.into(),
            calls: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl ChatProvider for HalvingProvider {
    fn name(&self) -> &str {
        "halving_mock"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatReply, ProviderError> {
        let mut calls = self.calls.lock().unwrap();
        *calls += 1;

        let text = match request.message.split_once("The text to shorten:\n") {
            Some((_, target)) => target.chars().take(target.chars().count() / 2).collect(),
            None => self.initial.clone(),
        };
        Ok(ChatReply::from_text(text))
    }
}

/// A mock model that answers "<message> saw <n>", where `n` is the number of
/// local history messages it was sent. Selected messages can be made slow.
#[derive(Default)]
pub struct EchoProvider {
    delays: HashMap<String, Duration>,
}

impl EchoProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, message: &str, millis: u64) -> Self {
        self.delays.insert(message.to_string(), Duration::from_millis(millis));
        self
    }
}

#[async_trait]
impl ChatProvider for EchoProvider {
    fn name(&self) -> &str {
        "echo_mock"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatReply, ProviderError> {
        if let Some(delay) = self.delays.get(&request.message) {
            tokio::time::sleep(*delay).await;
        }
        let seen = match &request.history {
            HistoryRef::Local(history) => history.len(),
            _ => 0,
        };
        Ok(ChatReply::from_text(format!("{} saw {}", request.message, seen)))
    }
}
