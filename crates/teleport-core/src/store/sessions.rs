use std::{collections::HashMap, path::PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{
    domain::{ChatId, UserId},
    Result,
};

use super::{load_json, save_json};

/// Phase of the guided add-rule flow. Serialized as the bare integer so
/// session documents from earlier deployments load unchanged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Phase {
    #[default]
    Idle,
    AwaitingSource,
    AwaitingTarget,
}

impl From<Phase> for u8 {
    fn from(p: Phase) -> u8 {
        match p {
            Phase::Idle => 0,
            Phase::AwaitingSource => 1,
            Phase::AwaitingTarget => 2,
        }
    }
}

impl TryFrom<u8> for Phase {
    type Error = String;

    fn try_from(v: u8) -> std::result::Result<Self, String> {
        match v {
            0 => Ok(Phase::Idle),
            1 => Ok(Phase::AwaitingSource),
            2 => Ok(Phase::AwaitingTarget),
            other => Err(format!("invalid session phase {other}")),
        }
    }
}

/// Per-operator interaction state, persisted so a half-finished add-rule flow
/// survives a restart.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorSession {
    pub state: Phase,
    pub temp_rule_name: String,
    pub source_chat_id: Option<ChatId>,
    pub target_chat_id: Option<ChatId>,
}

/// Durable operator-id → session mapping. Keys are the operator ids as
/// strings, per the on-disk document layout.
pub struct SessionStore {
    path: PathBuf,
    inner: Mutex<HashMap<String, OperatorSession>>,
}

impl SessionStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let sessions: HashMap<String, OperatorSession> = load_json(&path)?;
        Ok(Self {
            path,
            inner: Mutex::new(sessions),
        })
    }

    pub async fn get(&self, operator: UserId) -> Option<OperatorSession> {
        self.inner.lock().await.get(&operator.0.to_string()).cloned()
    }

    pub async fn put(&self, operator: UserId, session: OperatorSession) -> Result<()> {
        let mut sessions = self.inner.lock().await;
        sessions.insert(operator.0.to_string(), session);
        save_json(&self.path, &*sessions)
    }

    /// Reset the operator back to an idle session.
    pub async fn clear(&self, operator: UserId) -> Result<()> {
        self.put(operator, OperatorSession::default()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_path(tag: &str) -> PathBuf {
        PathBuf::from(format!(
            "/tmp/teleport-sessions-{tag}-{}.json",
            std::process::id()
        ))
    }

    #[tokio::test]
    async fn phase_serializes_as_integer() {
        let path = tmp_path("phase");
        let _ = std::fs::remove_file(&path);
        let store = SessionStore::open(&path).unwrap();

        store
            .put(
                UserId(99),
                OperatorSession {
                    state: Phase::AwaitingTarget,
                    temp_rule_name: "news".to_string(),
                    source_chat_id: Some(ChatId(-100)),
                    target_chat_id: None,
                },
            )
            .await
            .unwrap();

        let doc: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["99"]["state"], 2);
        assert_eq!(doc["99"]["temp_rule_name"], "news");
        assert_eq!(doc["99"]["source_chat_id"], -100);
        assert_eq!(doc["99"]["target_chat_id"], serde_json::Value::Null);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn survives_restart_mid_flow() {
        let path = tmp_path("restart");
        let _ = std::fs::remove_file(&path);

        {
            let store = SessionStore::open(&path).unwrap();
            store
                .put(
                    UserId(7),
                    OperatorSession {
                        state: Phase::AwaitingSource,
                        temp_rule_name: "memes".to_string(),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }

        let store = SessionStore::open(&path).unwrap();
        let session = store.get(UserId(7)).await.unwrap();
        assert_eq!(session.state, Phase::AwaitingSource);
        assert_eq!(session.temp_rule_name, "memes");

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn clear_resets_to_idle() {
        let path = tmp_path("clear");
        let _ = std::fs::remove_file(&path);
        let store = SessionStore::open(&path).unwrap();

        store
            .put(
                UserId(7),
                OperatorSession {
                    state: Phase::AwaitingTarget,
                    temp_rule_name: "x".to_string(),
                    source_chat_id: Some(ChatId(-1)),
                    target_chat_id: None,
                },
            )
            .await
            .unwrap();
        store.clear(UserId(7)).await.unwrap();

        assert_eq!(store.get(UserId(7)).await, Some(OperatorSession::default()));

        let _ = std::fs::remove_file(&path);
    }
}
