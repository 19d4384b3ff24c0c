//! The poll loop: every fixed interval, run the forwarding engine for every
//! rule (main path, then comment path) and log throughput.
//!
//! Failure isolation is per rule: one rule's error is logged and the cycle
//! moves on. A whole-cycle failure backs off longer before the next attempt;
//! the loop itself only ends on cancellation.

use std::{sync::Arc, time::Duration};

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::{engine::ForwardingEngine, store::RuleStore, Result};

#[derive(Clone, Copy, Debug)]
pub struct SchedulerConfig {
    pub poll_interval: Duration,
    pub error_backoff: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(20),
            error_backoff: Duration::from_secs(30),
        }
    }
}

pub struct RelayScheduler {
    rules: Arc<RuleStore>,
    engine: Arc<ForwardingEngine>,
    cfg: SchedulerConfig,
}

impl RelayScheduler {
    pub fn new(rules: Arc<RuleStore>, engine: Arc<ForwardingEngine>, cfg: SchedulerConfig) -> Self {
        Self { rules, engine, cfg }
    }

    /// Run until the token is cancelled. The only suspension points are the
    /// engine's network calls and the inter-cycle sleep, so cancellation is
    /// prompt and side-effect free.
    pub async fn run(&self, cancel: CancellationToken) {
        loop {
            let backoff = match self.run_cycle().await {
                Ok(total) => {
                    if total > 0 {
                        tracing::info!(total, "cycle forwarded units");
                    }
                    self.cfg.poll_interval
                }
                Err(e) => {
                    tracing::error!("poll cycle failed: {e}");
                    self.cfg.error_backoff
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("scheduler stopped");
                    return;
                }
                _ = sleep(backoff) => {}
            }
        }
    }

    /// One pass over all rules. Returns the number of units delivered.
    pub async fn run_cycle(&self) -> Result<usize> {
        let rules = self.rules.snapshot().await;

        let mut total = 0usize;
        for (name, rule) in rules {
            let main = match self.engine.relay(&rule).await {
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!(rule = %name, "relay failed: {e}");
                    0
                }
            };
            let comments = match self.engine.relay_discussion(&rule).await {
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!(rule = %name, "comment relay failed: {e}");
                    0
                }
            };

            if main + comments > 0 {
                tracing::info!(rule = %name, count = main + comments, "rule forwarded units");
            }
            total += main + comments;
        }

        Ok(total)
    }
}
