//! The forwarding engine: decides which source messages are new, replays
//! them to the target exactly once, and absorbs provider backpressure.
//!
//! The cursor only advances after a unit was delivered or deliberately
//! skipped, so a crash at any point redelivers at most the in-flight unit.

use std::{sync::Arc, time::Duration};

use tokio::time::sleep;

use crate::{
    assembler::{self, RelayUnit},
    domain::{ChatId, MessageId},
    ports::{SendOutcome, TransportPort},
    store::{CursorStore, Rule},
    Result,
};

/// Marker prepended to relayed comment-thread messages.
pub const COMMENT_PREFIX: &str = "💬 Comment: ";

#[derive(Clone, Copy, Debug)]
pub struct EngineConfig {
    /// Oldest-first cap for the one-time bootstrap of a fresh endpoint.
    pub bootstrap_limit: usize,
    /// Per-poll cap for endpoints with an established cursor.
    pub incremental_limit: usize,
    /// Per-poll cap for linked discussion chats.
    pub discussion_limit: usize,
    /// Pause between delivered units, to stay under provider throughput limits.
    pub per_unit_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bootstrap_limit: 200,
            incremental_limit: 50,
            discussion_limit: 10,
            per_unit_delay: Duration::from_secs(1),
        }
    }
}

pub struct ForwardingEngine {
    transport: Arc<dyn TransportPort>,
    cursors: Arc<CursorStore>,
    cfg: EngineConfig,
}

impl ForwardingEngine {
    pub fn new(
        transport: Arc<dyn TransportPort>,
        cursors: Arc<CursorStore>,
        cfg: EngineConfig,
    ) -> Self {
        Self {
            transport,
            cursors,
            cfg,
        }
    }

    /// Relay new messages from the rule's source to its target. Returns the
    /// number of relay units delivered (skips and failures not counted).
    pub async fn relay(&self, rule: &Rule) -> Result<usize> {
        self.relay_endpoint(
            rule.source_chat_id,
            rule.target_chat_id,
            None,
            self.cfg.incremental_limit,
        )
        .await
    }

    /// Relay the comment thread of a broadcast channel, if it has one.
    ///
    /// The discussion chat keeps its own cursor (keyed by its own id), so the
    /// comment path never collides with main-channel relaying. Megagroups and
    /// channels without a linked chat are a no-op.
    pub async fn relay_discussion(&self, rule: &Rule) -> Result<usize> {
        let info = self.transport.resolve_endpoint(rule.source_chat_id).await?;
        if !info.is_channel {
            return Ok(0);
        }
        let Some(discussion) = info.linked_discussion else {
            return Ok(0);
        };

        self.relay_endpoint(
            discussion,
            rule.target_chat_id,
            Some(COMMENT_PREFIX),
            self.cfg.discussion_limit,
        )
        .await
    }

    async fn relay_endpoint(
        &self,
        source: ChatId,
        target: ChatId,
        prefix: Option<&str>,
        incremental_limit: usize,
    ) -> Result<usize> {
        let cursor = self.cursors.get(source).await;

        // A fresh endpoint is cloned from its oldest messages: backlog
        // completeness beats recency on first run.
        let messages = if cursor == MessageId::ZERO {
            tracing::info!(endpoint = source.0, "bootstrap fetch");
            self.transport
                .fetch_oldest(source, self.cfg.bootstrap_limit)
                .await?
        } else {
            self.transport
                .fetch_since(source, cursor, incremental_limit)
                .await?
        };

        if messages.is_empty() {
            return Ok(0);
        }

        let mut delivered = 0usize;
        for unit in assembler::group(messages) {
            let max_id = unit.max_id();

            if unit.is_skippable() {
                self.cursors.advance(source, max_id).await?;
                continue;
            }

            let outgoing = match prefix {
                Some(p) => unit.prefixed(p),
                None => unit,
            };

            loop {
                match self.transport.send(target, &outgoing).await? {
                    SendOutcome::Delivered => {
                        self.cursors.advance(source, max_id).await?;
                        delivered += 1;
                        sleep(self.cfg.per_unit_delay).await;
                        break;
                    }
                    SendOutcome::RateLimited(wait) => {
                        tracing::warn!(
                            secs = wait.as_secs(),
                            endpoint = source.0,
                            "rate limited, suspending delivery"
                        );
                        sleep(wait).await;
                        // Retry the same unit; nothing was delivered yet.
                    }
                    SendOutcome::Failed(reason) => {
                        // A poisoned unit must not block the rest of the
                        // batch; skip it and move on.
                        tracing::warn!(
                            ids = ?outgoing.ids(),
                            endpoint = source.0,
                            %reason,
                            "unit not sendable, skipping"
                        );
                        self.cursors.advance(source, max_id).await?;
                        break;
                    }
                }
            }
        }

        Ok(delivered)
    }
}
