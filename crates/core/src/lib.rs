//! # Colloquy Core
//!
//! Domain types, traits, and error definitions for the Colloquy chat client.
//! This crate has **no transport dependencies**. It defines the domain model
//! that the provider and agent crates implement against.
//!
//! ## Design Philosophy
//!
//! The remote service is reached only through the `ChatProvider` trait defined
//! here. This enables:
//! - Driving the conversation layer and the length limiter from tests
//! - Keeping wire concerns inside the providers crate
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod generation;
pub mod message;
pub mod provider;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use error::{ConversationError, Error, ProviderError, Result};
pub use generation::{CitationQuality, Document, GenerationConfig, PromptTruncation};
pub use message::{ConversationHistory, ConversationId, Message, Role, SerializedHistory};
pub use provider::{ChatProvider, ChatReply, ChatRequest, HistoryRef, PreamblePolicy};
pub use store::{ConversationGuard, ConversationStore};
