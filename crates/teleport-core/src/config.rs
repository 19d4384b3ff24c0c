use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    engine::EngineConfig, errors::Error, scheduler::SchedulerConfig, Result,
};

/// Typed configuration for the relay bot, loaded from the environment (with
/// `.env` support). Defaults match the constants the deployment has always
/// run with.
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub bot_token: String,
    /// Allow-list of operator ids; anyone else is silently ignored.
    pub allowed_operators: Vec<i64>,

    // Persistence
    pub data_dir: PathBuf,
    pub rules_file: PathBuf,
    pub cursors_file: PathBuf,
    pub sessions_file: PathBuf,

    // Polling
    pub poll_interval: Duration,
    pub error_backoff: Duration,

    // Engine limits
    pub bootstrap_limit: usize,
    pub incremental_limit: usize,
    pub discussion_limit: usize,
    pub per_unit_delay: Duration,

    /// Per-endpoint cap on buffered source messages in the adapter.
    pub ingest_capacity: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let bot_token = env_str("TELEPORT_BOT_TOKEN").unwrap_or_default();
        if bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEPORT_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let allowed_operators = parse_csv_i64(env_str("TELEPORT_ALLOWED_OPERATORS"));
        if allowed_operators.is_empty() {
            return Err(Error::Config(
                "TELEPORT_ALLOWED_OPERATORS environment variable is required".to_string(),
            ));
        }

        let data_dir = env_path("TELEPORT_DATA_DIR").unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&data_dir)?;
        let rules_file = data_dir.join("rules.json");
        let cursors_file = data_dir.join("cursors.json");
        let sessions_file = data_dir.join("user_state.json");

        let poll_interval = Duration::from_secs(env_u64("TELEPORT_POLL_INTERVAL_SECS").unwrap_or(20));
        let error_backoff = Duration::from_secs(env_u64("TELEPORT_ERROR_BACKOFF_SECS").unwrap_or(30));

        let bootstrap_limit = env_usize("TELEPORT_BOOTSTRAP_LIMIT").unwrap_or(200);
        let incremental_limit = env_usize("TELEPORT_INCREMENTAL_LIMIT").unwrap_or(50);
        let discussion_limit = env_usize("TELEPORT_DISCUSSION_LIMIT").unwrap_or(10);
        let per_unit_delay =
            Duration::from_millis(env_u64("TELEPORT_PER_UNIT_DELAY_MS").unwrap_or(1000));

        let ingest_capacity = env_usize("TELEPORT_INGEST_CAPACITY").unwrap_or(1024);

        Ok(Self {
            bot_token,
            allowed_operators,
            data_dir,
            rules_file,
            cursors_file,
            sessions_file,
            poll_interval,
            error_backoff,
            bootstrap_limit,
            incremental_limit,
            discussion_limit,
            per_unit_delay,
            ingest_capacity,
        })
    }

    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            bootstrap_limit: self.bootstrap_limit,
            incremental_limit: self.incremental_limit,
            discussion_limit: self.discussion_limit,
            per_unit_delay: self.per_unit_delay,
        }
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            poll_interval: self.poll_interval,
            error_backoff: self.error_backoff,
        }
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_operator_list_parsing() {
        assert_eq!(
            parse_csv_i64(Some("1, 2,3,,junk".to_string())),
            vec![1, 2, 3]
        );
        assert!(parse_csv_i64(None).is_empty());
        assert!(parse_csv_i64(Some("  ".to_string())).is_empty());
    }
}
