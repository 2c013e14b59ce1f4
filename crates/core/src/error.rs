//! Error types for the Colloquy domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

use crate::message::ConversationId;

/// The top-level error type for all Colloquy operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Conversation errors ---
    #[error("Conversation error: {0}")]
    Conversation(#[from] ConversationError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Missing or rejected credential, or the service could not be reached
    /// while verifying it. Never retried.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rejected locally before any network call.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Rate limited by provider (HTTP 429)")]
    RateLimited,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Retryable failures persisted past the attempt ceiling.
    #[error("Service unavailable after {attempts} attempts: {reason}")]
    Unavailable { attempts: u32, reason: String },

    /// Any non-200, non-429 response.
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Endpoint not available on this service: {0}")]
    EndpointUnavailable(String),

    #[error("No usable model for the {endpoint} endpoint; pass an explicit model")]
    ModelUnresolved { endpoint: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl ProviderError {
    /// Whether the resilient call path should try again after this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited | ProviderError::Network(_) | ProviderError::Timeout(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversationError {
    #[error("Unknown conversation: {0}")]
    NotFound(ConversationId),

    #[error("Unknown message role: {0:?}")]
    UnknownRole(String),
}
