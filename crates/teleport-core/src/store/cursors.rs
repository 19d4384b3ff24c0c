use std::{collections::HashMap, path::PathBuf};

use tokio::sync::Mutex;

use crate::{
    domain::{ChatId, MessageId},
    Result,
};

use super::{load_json, save_json};

/// Durable endpoint → highest-relayed-message-id watermarks.
///
/// A cursor of 0 means "never relayed". Cursors only ever move forward, and
/// only after the unit covering the id was delivered or deliberately skipped;
/// on restart they are the single source of truth for where to resume.
pub struct CursorStore {
    path: PathBuf,
    inner: Mutex<HashMap<i64, i32>>,
}

impl CursorStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let cursors: HashMap<i64, i32> = load_json(&path)?;
        Ok(Self {
            path,
            inner: Mutex::new(cursors),
        })
    }

    pub async fn get(&self, endpoint: ChatId) -> MessageId {
        MessageId(
            self.inner
                .lock()
                .await
                .get(&endpoint.0)
                .copied()
                .unwrap_or(0),
        )
    }

    /// Create the cursor at 0 if the endpoint has never been seen. Called at
    /// rule creation and at startup so every rule source has a cursor before
    /// its first poll.
    pub async fn ensure(&self, endpoint: ChatId) -> Result<()> {
        let mut cursors = self.inner.lock().await;
        if cursors.contains_key(&endpoint.0) {
            return Ok(());
        }
        cursors.insert(endpoint.0, 0);
        save_json(&self.path, &*cursors)
    }

    /// Advance the cursor to `max(current, id)` and persist. Lower ids are a
    /// no-op, which keeps the watermark monotonic regardless of caller order.
    pub async fn advance(&self, endpoint: ChatId, id: MessageId) -> Result<()> {
        let mut cursors = self.inner.lock().await;
        let current = cursors.entry(endpoint.0).or_insert(0);
        if id.0 <= *current {
            return Ok(());
        }
        *current = id.0;
        save_json(&self.path, &*cursors)
    }
}
