//! Capability registry. Which endpoints and models the service offers.
//!
//! Built once at startup: the credential is verified, the model list is
//! fetched, and every endpoint the application wants is checked against it.
//! Missing endpoints and unavailable default models are warnings, not errors.
//! The registry is read-only afterwards.

use colloquy_core::error::ProviderError;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;
use tracing::{info, warn};

use crate::transport::{HttpReply, Transport};

/// Upper bound on model-list pages followed during discovery.
const MAX_MODEL_PAGES: usize = 20;

/// The service endpoints this client knows how to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Endpoint {
    Chat,
    Embed,
    Classify,
    Rerank,
}

impl Endpoint {
    pub const ALL: [Endpoint; 4] = [
        Endpoint::Chat,
        Endpoint::Embed,
        Endpoint::Classify,
        Endpoint::Rerank,
    ];

    /// Endpoint name, also its URL path.
    pub fn as_str(self) -> &'static str {
        match self {
            Endpoint::Chat => "chat",
            Endpoint::Embed => "embed",
            Endpoint::Classify => "classify",
            Endpoint::Rerank => "rerank",
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Endpoint {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Endpoint::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| ProviderError::EndpointUnavailable(s.to_string()))
    }
}

/// One entry of the service's model list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub endpoints: Vec<String>,
}

#[derive(Deserialize)]
struct KeyCheck {
    valid: bool,
}

#[derive(Deserialize)]
struct ModelPage {
    #[serde(default)]
    models: Vec<ModelInfo>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CapabilityRegistry {
    /// Every endpoint the service reported, with its usable models.
    available: HashMap<String, BTreeSet<String>>,
    /// Wanted endpoints that exist on the service. `None` marks a default
    /// model the service does not offer for that endpoint.
    defaults: HashMap<Endpoint, Option<String>>,
}

impl CapabilityRegistry {
    /// Verify the credential, fetch the model list and resolve `wanted`
    /// (`(endpoint, configured default model)` pairs).
    ///
    /// Any failure here is fatal and is not retried.
    pub async fn discover(
        transport: &dyn Transport,
        wanted: &[(Endpoint, String)],
    ) -> Result<Self, ProviderError> {
        verify_key(transport).await?;
        let models = fetch_models(transport).await?;
        Ok(Self::from_models(&models, wanted))
    }

    /// Resolve `wanted` against an already-fetched model list.
    pub fn from_models(models: &[ModelInfo], wanted: &[(Endpoint, String)]) -> Self {
        let mut available: HashMap<String, BTreeSet<String>> = HashMap::new();
        for model in models {
            for endpoint in &model.endpoints {
                available
                    .entry(endpoint.clone())
                    .or_default()
                    .insert(model.name.clone());
            }
        }

        let mut defaults = HashMap::new();
        for (endpoint, model) in wanted {
            let Some(models) = available.get(endpoint.as_str()) else {
                warn!(
                    endpoint = %endpoint,
                    available = ?sorted_keys(&available),
                    "Requested endpoint is not offered by the service; dropping it"
                );
                continue;
            };

            if models.contains(model) {
                defaults.insert(*endpoint, Some(model.clone()));
            } else {
                warn!(
                    endpoint = %endpoint,
                    model = %model,
                    available = ?models,
                    "Configured default model is unavailable; calls must name a model explicitly"
                );
                defaults.insert(*endpoint, None);
            }
        }

        info!(
            endpoints = defaults.len(),
            service_endpoints = available.len(),
            "Capability registry ready"
        );

        Self {
            available,
            defaults,
        }
    }

    /// Whether `endpoint` survived discovery.
    pub fn is_available(&self, endpoint: Endpoint) -> bool {
        self.defaults.contains_key(&endpoint)
    }

    /// Usable endpoints, in declaration order.
    pub fn endpoints(&self) -> Vec<Endpoint> {
        Endpoint::ALL
            .into_iter()
            .filter(|e| self.defaults.contains_key(e))
            .collect()
    }

    /// The resolved default model, `None` if unresolved or the endpoint was dropped.
    pub fn default_model(&self, endpoint: Endpoint) -> Option<&str> {
        self.defaults.get(&endpoint).and_then(|m| m.as_deref())
    }

    /// Models the service offers for `endpoint`.
    pub fn available_models(&self, endpoint: Endpoint) -> Option<&BTreeSet<String>> {
        self.available.get(endpoint.as_str())
    }

    /// Pick the model for one call.
    ///
    /// A requested model the endpoint offers wins. An unavailable request falls
    /// back to the configured default with a warning. With no usable default
    /// the call cannot proceed.
    pub fn resolve_model(
        &self,
        endpoint: Endpoint,
        requested: Option<&str>,
    ) -> Result<String, ProviderError> {
        let default = self
            .defaults
            .get(&endpoint)
            .ok_or_else(|| ProviderError::EndpointUnavailable(endpoint.to_string()))?;

        if let Some(model) = requested {
            let offered = self
                .available_models(endpoint)
                .is_some_and(|models| models.contains(model));
            if offered {
                return Ok(model.to_string());
            }
            warn!(
                endpoint = %endpoint,
                requested = %model,
                fallback = ?default,
                "Requested model is unavailable; using the endpoint default"
            );
        }

        default.clone().ok_or_else(|| ProviderError::ModelUnresolved {
            endpoint: endpoint.to_string(),
        })
    }
}

fn sorted_keys(map: &HashMap<String, BTreeSet<String>>) -> Vec<&str> {
    let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
    keys.sort_unstable();
    keys
}

async fn verify_key(transport: &dyn Transport) -> Result<(), ProviderError> {
    let reply = transport
        .post("check-api-key", &json!({}))
        .await
        .map_err(|e| ProviderError::Authentication(format!("Could not reach the service: {e}")))?;

    if reply.status != 200 {
        return Err(ProviderError::Authentication(format!(
            "Key check returned HTTP {}: {}",
            reply.status, reply.body
        )));
    }

    let check: KeyCheck = decode(&reply)?;
    if !check.valid {
        return Err(ProviderError::Authentication(
            "The service rejected the API key".into(),
        ));
    }
    Ok(())
}

async fn fetch_models(transport: &dyn Transport) -> Result<Vec<ModelInfo>, ProviderError> {
    let mut models = Vec::new();
    let mut page_token: Option<String> = None;

    for _ in 0..MAX_MODEL_PAGES {
        let path = match &page_token {
            Some(token) => format!("models?page_size=1000&page_token={token}"),
            None => "models?page_size=1000".to_string(),
        };
        let reply = transport.get(&path).await.map_err(|e| {
            ProviderError::Authentication(format!("Could not reach the service: {e}"))
        })?;
        if reply.status != 200 {
            return Err(ProviderError::ApiError {
                status_code: reply.status,
                message: reply.body,
            });
        }

        let page: ModelPage = decode(&reply)?;
        models.extend(page.models);
        match page.next_page_token.filter(|t| !t.is_empty()) {
            Some(token) => page_token = Some(token),
            None => return Ok(models),
        }
    }

    warn!(pages = MAX_MODEL_PAGES, "Model list truncated");
    Ok(models)
}

fn decode<T: DeserializeOwned>(reply: &HttpReply) -> Result<T, ProviderError> {
    serde_json::from_str(&reply.body).map_err(|e| ProviderError::MalformedResponse(e.to_string()))
}
