//! Service client for Colloquy.
//!
//! `CohereClient` implements the `colloquy_core::ChatProvider` trait on top of
//! a `Transport`, a startup-built `CapabilityRegistry` and a `RetryPolicy`.

pub mod capability;
pub mod cohere;
pub mod request;
pub mod retry;
pub mod transport;

#[cfg(test)]
mod test_helpers;

pub use capability::{CapabilityRegistry, Endpoint, ModelInfo};
pub use cohere::CohereClient;
pub use request::{ChatPayload, RerankReply, RerankResult, build_chat_payload};
pub use retry::{CallOutcome, RetryPolicy};
pub use transport::{HttpReply, HttpTransport, Transport};
