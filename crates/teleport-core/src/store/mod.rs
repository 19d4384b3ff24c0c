//! Durable stores for rules, cursors, and operator sessions.
//!
//! Each store is a mutex-held map with JSON load-on-open and save-on-change.
//! Saves go through a temp file + rename so a crash mid-write never leaves a
//! truncated document, and they happen while the lock is held so persisted
//! state can not race the in-memory mutation it follows.

mod cursors;
mod rules;
mod sessions;

pub use cursors::CursorStore;
pub use rules::{Rule, RuleStore};
pub use sessions::{OperatorSession, Phase, SessionStore};

use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};

use crate::Result;

fn load_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let text = serde_json::to_string_pretty(value)?;
    std::fs::write(&tmp, text)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
