use std::{collections::BTreeMap, path::PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{
    domain::{ChatId, UserId},
    Error, Result,
};

use super::{load_json, save_json};

/// A persistent forwarding rule. Immutable once created, except for deletion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub source_chat_id: ChatId,
    pub target_chat_id: ChatId,
    /// "YYYY-MM-DD HH:MM:SS", local time of the creating process.
    pub created_at: String,
    pub created_by: UserId,
}

/// Durable rule-name → rule mapping, persisted as one JSON object so files
/// written by earlier deployments load unchanged.
pub struct RuleStore {
    path: PathBuf,
    inner: Mutex<BTreeMap<String, Rule>>,
}

impl RuleStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let rules: BTreeMap<String, Rule> = load_json(&path)?;
        tracing::info!(count = rules.len(), path = %path.display(), "loaded rules");
        Ok(Self {
            path,
            inner: Mutex::new(rules),
        })
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.inner.lock().await.contains_key(name)
    }

    /// Insert or overwrite a rule and persist.
    pub async fn put(&self, name: &str, rule: Rule) -> Result<()> {
        let mut rules = self.inner.lock().await;
        rules.insert(name.to_string(), rule);
        save_json(&self.path, &*rules)
    }

    pub async fn remove(&self, name: &str) -> Result<()> {
        let mut rules = self.inner.lock().await;
        if rules.remove(name).is_none() {
            return Err(Error::RuleNotFound(name.to_string()));
        }
        save_json(&self.path, &*rules)
    }

    /// All rules, in name order. The scheduler iterates this snapshot so a
    /// concurrent rule edit never invalidates an in-flight cycle.
    pub async fn snapshot(&self) -> Vec<(String, Rule)> {
        self.inner
            .lock()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}
