//! Chat channel transport used by setup sessions
//!
//! Sessions publish and edit their status message through this trait, and
//! invitation/confirmation sub-flows wait on it for matching replies.

pub mod memory;

use crate::error::Result;
use crate::types::{InboundMessage, MessageId, UserId};
use async_trait::async_trait;
use std::time::Duration;

pub use memory::{InMemoryTransport, OutboundEvent};

/// Predicate for awaited replies: one author, one of a few content tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageFilter {
    pub author: UserId,
    /// Accepted contents, compared case-insensitively after trimming
    pub tokens: Vec<String>,
}

impl MessageFilter {
    pub fn new<I, S>(author: impl Into<UserId>, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            author: author.into(),
            tokens: tokens
                .into_iter()
                .map(|token| token.as_ref().to_lowercase())
                .collect(),
        }
    }

    pub fn matches(&self, message: &InboundMessage) -> bool {
        if message.author.id != self.author {
            return false;
        }
        let content = message.content.trim().to_lowercase();
        self.tokens.iter().any(|token| *token == content)
    }
}

/// Trait for talking to the channel a session lives in
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Post a new message
    async fn publish(&self, text: &str) -> Result<MessageId>;

    /// Replace the text of a previously posted message
    async fn edit(&self, message: MessageId, text: &str) -> Result<()>;

    /// Delete a previously posted message
    async fn delete(&self, message: MessageId) -> Result<()>;

    /// Wait for the next message accepted by `filter`
    ///
    /// Fails with `SetupError::Timeout` when nothing matches in time.
    async fn await_matching_message(
        &self,
        filter: MessageFilter,
        timeout: Duration,
    ) -> Result<InboundMessage>;
}
