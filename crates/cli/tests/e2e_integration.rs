//! End-to-end integration tests for the Colloquy chat client.
//!
//! These tests exercise the full pipeline from a user message to the stored
//! conversation: capability discovery, request building, the retry executor,
//! the length limiter and the conversation store, over a scripted transport.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use colloquy_agent::{ChatContext, LengthLimiter, ReplyOptions};
use colloquy_core::error::{Error, ProviderError};
use colloquy_core::generation::Document;
use colloquy_core::message::Message;
use colloquy_core::provider::PreamblePolicy;
use colloquy_providers::{CohereClient, Endpoint, HttpReply, RetryPolicy, Transport};
use serde_json::{Value, json};

// ── Scripted Transport ───────────────────────────────────────────────────

/// Answers each path from its own queue; the last reply repeats.
#[derive(Default)]
struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<Result<HttpReply, ProviderError>>>>,
    posted: Mutex<Vec<(String, Value)>>,
}

impl ScriptedTransport {
    fn service() -> Self {
        Self::default()
            .on("check-api-key", ok(json!({"valid": true})))
            .on(
                "models",
                ok(json!({"models": [
                    {"name": "c4ai-aya-23", "endpoints": ["chat"]},
                    {"name": "command-r", "endpoints": ["chat"]},
                    {"name": "rerank-multilingual-v3.0", "endpoints": ["rerank"]}
                ]})),
            )
    }

    fn on(self, path: &str, reply: Result<HttpReply, ProviderError>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    fn chat_bodies(&self) -> Vec<Value> {
        self.posted
            .lock()
            .unwrap()
            .iter()
            .filter(|(path, _)| path == "chat")
            .map(|(_, body)| body.clone())
            .collect()
    }

    fn answer(&self, path: &str) -> Result<HttpReply, ProviderError> {
        let key = path.split('?').next().unwrap_or(path);
        let mut scripts = self.scripts.lock().unwrap();
        let queue = scripts
            .get_mut(key)
            .unwrap_or_else(|| panic!("no script for {key}"));
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap()
        }
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, path: &str) -> Result<HttpReply, ProviderError> {
        self.answer(path)
    }

    async fn post(&self, path: &str, body: &Value) -> Result<HttpReply, ProviderError> {
        self.posted
            .lock()
            .unwrap()
            .push((path.to_string(), body.clone()));
        self.answer(path)
    }
}

fn ok(body: Value) -> Result<HttpReply, ProviderError> {
    Ok(HttpReply::ok_json(&body))
}

fn text(text: &str) -> Result<HttpReply, ProviderError> {
    ok(json!({"text": text, "generation_id": "gen", "meta": {"billed_units": {"input_tokens": 10.0, "output_tokens": 5.0}}}))
}

fn wanted() -> Vec<(Endpoint, String)> {
    vec![
        (Endpoint::Chat, "c4ai-aya-23".into()),
        (Endpoint::Rerank, "rerank-multilingual-v3.0".into()),
    ]
}

async fn context(transport: Arc<ScriptedTransport>) -> ChatContext {
    let client = CohereClient::connect(transport, &wanted()).await.unwrap();
    ChatContext::new(Arc::new(client))
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn two_turns_carry_history_and_preamble() {
    let transport = Arc::new(
        ScriptedTransport::service()
            .on("chat", text("Hello! How can I help?"))
            .on("chat", text("Beavers use their tails to steer.")),
    );
    let ctx = context(transport.clone()).await;
    let id = ctx.create_conversation(Some("You are concise.".into())).await;

    ctx.reply(&id, "Hi", ReplyOptions::default()).await.unwrap();
    let reply = ctx
        .reply(&id, "What are beaver tails for?", ReplyOptions::default())
        .await
        .unwrap();
    assert_eq!(reply.text.as_deref(), Some("Beavers use their tails to steer."));

    let bodies = transport.chat_bodies();
    assert_eq!(bodies.len(), 2);
    assert!(bodies[0].get("chat_history").is_none());
    assert_eq!(bodies[1]["preamble"], "You are concise.");
    assert_eq!(bodies[1]["model"], "c4ai-aya-23");
    assert_eq!(
        bodies[1]["chat_history"],
        json!([
            {"role": "USER", "msg": "Hi"},
            {"role": "CHATBOT", "msg": "Hello! How can I help?"}
        ])
    );

    let stored = ctx.store().get_messages(&id, true).await.unwrap();
    assert_eq!(stored.len(), 5);
    assert_eq!(stored[0], Message::system("You are concise."));
}

#[tokio::test(start_paused = true)]
async fn rate_limits_are_retried_then_reply_is_shortened() {
    let long = "word ".repeat(40);
    let transport = Arc::new(
        ScriptedTransport::service()
            .on("chat", Ok(HttpReply::new(429, "too many requests")))
            .on("chat", Ok(HttpReply::new(429, "too many requests")))
            .on("chat", text(long.trim()))
            .on("chat", text("word word word word word")),
    );
    let ctx = context(transport.clone())
        .await
        .with_limiter(LengthLimiter::new(0, 10));
    let id = ctx.create_conversation(None).await;

    let reply = ctx.reply(&id, "Talk a lot", ReplyOptions::default()).await.unwrap();
    assert_eq!(reply.text.as_deref(), Some("word word word word word"));
    assert_eq!(reply.generation_id.as_deref(), Some("gen"));

    let bodies = transport.chat_bodies();
    assert_eq!(bodies.len(), 4);
    assert_eq!(bodies[2]["message"], "Talk a lot");
    let shorten = bodies[3]["message"].as_str().unwrap();
    assert!(shorten.starts_with("Shorten this text by"));

    let stored = ctx.store().get_messages(&id, false).await.unwrap();
    assert_eq!(
        stored,
        vec![
            Message::user("Talk a lot"),
            Message::assistant("word word word word word")
        ]
    );
}

#[tokio::test]
async fn server_error_is_fatal_and_not_recorded() {
    let transport = Arc::new(
        ScriptedTransport::service().on("chat", Ok(HttpReply::new(500, "internal error"))),
    );
    let ctx = context(transport.clone()).await;
    let id = ctx.create_conversation(None).await;

    let err = ctx.reply(&id, "Hi", ReplyOptions::default()).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Provider(ProviderError::ApiError { status_code: 500, .. })
    ));
    assert_eq!(transport.chat_bodies().len(), 1);
    assert!(ctx.store().get_messages(&id, false).await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_surface_unavailable() {
    let transport = Arc::new(
        ScriptedTransport::service()
            .on("chat", Err(ProviderError::Network("connection reset".into()))),
    );
    let client = CohereClient::connect(transport.clone(), &wanted())
        .await
        .unwrap()
        .with_retry_policy(RetryPolicy {
            max_attempts: 3,
            ..RetryPolicy::default()
        });
    let ctx = ChatContext::new(Arc::new(client));
    let id = ctx.create_conversation(None).await;

    let err = ctx.reply(&id, "Hi", ReplyOptions::default()).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Provider(ProviderError::Unavailable { attempts: 3, .. })
    ));
    assert_eq!(transport.chat_bodies().len(), 3);
}

#[tokio::test]
async fn stripped_preamble_and_fallback_model() {
    let transport = Arc::new(ScriptedTransport::service().on("chat", text("ok")));
    let ctx = context(transport.clone()).await;
    let id = ctx.create_conversation(Some("Secret instructions.".into())).await;

    let options = ReplyOptions {
        preamble: PreamblePolicy::Strip,
        model: Some("not-a-real-model".into()),
        ..ReplyOptions::default()
    };
    ctx.reply(&id, "Hi", options).await.unwrap();

    let body = &transport.chat_bodies()[0];
    assert!(body.get("preamble").is_none());
    assert_eq!(body["model"], "c4ai-aya-23");
}

#[tokio::test]
async fn search_queries_only_without_documents_never_hits_the_network() {
    let transport = Arc::new(ScriptedTransport::service().on("chat", text("unused")));
    let ctx = context(transport.clone()).await;
    let id = ctx.create_conversation(None).await;

    let options = ReplyOptions {
        search_queries_only: true,
        ..ReplyOptions::default()
    };
    let err = ctx.reply(&id, "Find it", options).await.unwrap_err();
    assert!(matches!(err, Error::Provider(ProviderError::InvalidRequest(_))));
    assert!(transport.chat_bodies().is_empty());

    let options = ReplyOptions {
        search_queries_only: true,
        documents: vec![Document::new("Beavers have flat tails.").with_title("Beavers")],
        ..ReplyOptions::default()
    };
    ctx.reply(&id, "Find it", options).await.unwrap();
    let body = &transport.chat_bodies()[0];
    assert_eq!(body["documents"][0]["title"], "Beavers");
}

#[tokio::test]
async fn serialized_history_omits_unrequested_preamble() {
    let transport = Arc::new(ScriptedTransport::service());
    let ctx = context(transport).await;
    let id = ctx.create_conversation(Some("You are concise.".into())).await;
    ctx.store().append_message(&id, Message::user("Hi")).await.unwrap();

    let serialized = ctx.store().get_serialized_history(&id, false).await.unwrap();
    assert_eq!(
        serde_json::to_value(&serialized).unwrap(),
        json!({"chat_history": [{"role": "USER", "msg": "Hi"}]})
    );
}

#[tokio::test]
async fn rejected_key_stops_startup() {
    let transport = Arc::new(
        ScriptedTransport::default().on("check-api-key", ok(json!({"valid": false}))),
    );
    let err = match CohereClient::connect(transport, &wanted()).await {
        Err(e) => e,
        Ok(_) => panic!("client started with a rejected key"),
    };
    assert!(matches!(err, ProviderError::Authentication(_)));
}

#[tokio::test]
async fn rerank_goes_through_the_same_client() {
    let transport = Arc::new(ScriptedTransport::service().on(
        "rerank",
        ok(json!({"results": [{"index": 0, "relevance_score": 0.8}]})),
    ));
    let client = CohereClient::connect(transport, &wanted()).await.unwrap();

    let reply = client
        .rerank("tails", &["beavers".to_string()], None, Some("command-r"))
        .await
        .unwrap();
    assert_eq!(reply.results.len(), 1);
}
