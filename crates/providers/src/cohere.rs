//! Cohere chat client.
//!
//! Ties the pieces together: every call resolves its model against the
//! capability registry, builds a typed payload, and goes out through the
//! retry policy over a `Transport`.

use async_trait::async_trait;
use colloquy_config::AppConfig;
use colloquy_core::error::ProviderError;
use colloquy_core::generation::GenerationConfig;
use colloquy_core::provider::{ChatProvider, ChatReply, ChatRequest};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::capability::{CapabilityRegistry, Endpoint};
use crate::request::{RerankPayload, RerankReply, build_chat_payload};
use crate::retry::{CallOutcome, RetryPolicy};
use crate::transport::{HttpTransport, Transport};

pub struct CohereClient {
    transport: Arc<dyn Transport>,
    registry: CapabilityRegistry,
    retry: RetryPolicy,
    generation: GenerationConfig,
}

impl CohereClient {
    /// Discover capabilities over `transport` and build a client for the
    /// `wanted` endpoints. Fails fatally when the key check fails.
    pub async fn connect(
        transport: Arc<dyn Transport>,
        wanted: &[(Endpoint, String)],
    ) -> Result<Self, ProviderError> {
        let registry = CapabilityRegistry::discover(transport.as_ref(), wanted).await?;
        Ok(Self {
            transport,
            registry,
            retry: RetryPolicy::default(),
            generation: GenerationConfig::default(),
        })
    }

    /// Build a client from the application config.
    pub async fn from_config(config: &AppConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                ProviderError::Authentication(
                    "No API key configured. Set COLLOQUY_API_KEY or api_key in config.toml".into(),
                )
            })?;

        let transport = HttpTransport::new(
            &config.api_url,
            api_key,
            Duration::from_secs(config.request_timeout_secs),
        )?;

        let wanted = config
            .endpoints
            .pairs()
            .into_iter()
            .map(|(name, model)| Ok((name.parse::<Endpoint>()?, model.to_string())))
            .collect::<Result<Vec<_>, ProviderError>>()?;

        info!(api_url = %config.api_url, "Connecting to chat service");
        Ok(Self::connect(Arc::new(transport), &wanted)
            .await?
            .with_retry_policy(RetryPolicy::from_config(&config.retry))
            .with_default_generation(config.generation.clone()))
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Generation config used when a chat request carries none.
    pub fn with_default_generation(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// POST `body` to `endpoint` with a resolved model, through the retry policy.
    ///
    /// Used directly for endpoints without a typed wrapper (embed, classify).
    pub async fn call_endpoint(
        &self,
        endpoint: Endpoint,
        mut body: Value,
        model: Option<&str>,
    ) -> Result<Value, ProviderError> {
        let model = self.registry.resolve_model(endpoint, model)?;
        match body.as_object_mut() {
            Some(fields) => {
                fields.insert("model".into(), Value::String(model.clone()));
            }
            None => {
                return Err(ProviderError::InvalidRequest(format!(
                    "{endpoint} body must be a JSON object"
                )));
            }
        }

        debug!(endpoint = %endpoint, model = %model, "Dispatching request");
        let transport = &self.transport;
        let body = &body;
        self.retry
            .run(endpoint.as_str(), || async move {
                CallOutcome::classify(transport.post(endpoint.as_str(), body).await)
            })
            .await
    }

    /// Order `documents` by relevance to `query`.
    pub async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: Option<usize>,
        model: Option<&str>,
    ) -> Result<RerankReply, ProviderError> {
        let payload = RerankPayload {
            query: query.to_string(),
            documents: documents.to_vec(),
            top_n,
            model: None,
        };
        let body = serde_json::to_value(&payload)
            .map_err(|e| ProviderError::InvalidRequest(e.to_string()))?;

        let value = self.call_endpoint(Endpoint::Rerank, body, model).await?;
        serde_json::from_value(value).map_err(|e| ProviderError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl ChatProvider for CohereClient {
    fn name(&self) -> &str {
        "cohere"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatReply, ProviderError> {
        let payload = build_chat_payload(&request, &self.generation)?;
        let requested = payload.model.clone();
        let body = serde_json::to_value(&payload)
            .map_err(|e| ProviderError::InvalidRequest(e.to_string()))?;

        let value = self
            .call_endpoint(Endpoint::Chat, body, requested.as_deref())
            .await?;
        let reply: ChatReply = serde_json::from_value(value)
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        if let Some(billed) = reply.meta.as_ref().and_then(|m| m.billed_units.as_ref()) {
            debug!(
                input_tokens = ?billed.input_tokens,
                output_tokens = ?billed.output_tokens,
                "Chat usage"
            );
        }
        Ok(reply)
    }
}
