//! The chat loop of Colloquy.
//!
//! One exchange runs strictly in order:
//!
//! 1. **Read** the conversation history from the store
//! 2. **Build** the chat request (preamble policy, documents, generation config)
//! 3. **Call** the provider, through the length limiter when a budget is set
//! 4. **Append** the user and assistant turns to the store
//!
//! No step starts before the previous one has finished.

pub mod limiter;
pub mod session;

#[cfg(test)]
mod test_helpers;

pub use limiter::{LengthLimiter, count_words};
pub use session::{ChatContext, ReplyOptions};
