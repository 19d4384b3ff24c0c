use std::time::Duration;

use async_trait::async_trait;

use crate::{
    assembler::RelayUnit,
    domain::{ChatId, ChatMessage, EndpointInfo, MessageId},
    Result,
};

/// Outcome of a single delivery attempt.
///
/// Provider backpressure is data, not an error: the engine decides whether to
/// wait-and-retry (`RateLimited`) or skip the unit (`Failed`), so control flow
/// stays explicit instead of relying on exception propagation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    /// The provider asked us to back off for the given duration.
    RateLimited(Duration),
    /// The unit itself could not be sent (bad media reference, access lost).
    Failed(String),
}

/// Port to the chat provider.
///
/// Telegram is the first implementation; everything the engine needs is a
/// history read, an endpoint lookup, and a unit send. `Err` from any method
/// means the provider itself is unreachable and aborts the current cycle.
#[async_trait]
pub trait TransportPort: Send + Sync {
    /// The oldest `limit` messages of an endpoint, ascending by id.
    async fn fetch_oldest(&self, endpoint: ChatId, limit: usize) -> Result<Vec<ChatMessage>>;

    /// Up to `limit` messages with id strictly greater than `min_id`.
    /// No ordering guarantee; the engine sorts.
    async fn fetch_since(
        &self,
        endpoint: ChatId,
        min_id: MessageId,
        limit: usize,
    ) -> Result<Vec<ChatMessage>>;

    async fn resolve_endpoint(&self, endpoint: ChatId) -> Result<EndpointInfo>;

    /// Deliver one relay unit to `target`.
    async fn send(&self, target: ChatId, unit: &RelayUnit) -> Result<SendOutcome>;
}
