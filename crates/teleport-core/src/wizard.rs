//! The guided add-rule flow and the rest of the rule lifecycle.
//!
//! Operators create a rule in two steps: forward a message from the source
//! chat, then one from the target chat. The per-operator phase lives in the
//! session store so a half-finished flow survives a restart.

use std::sync::Arc;

use chrono::Local;

use crate::{
    domain::{ChatId, UserId},
    store::{CursorStore, OperatorSession, Phase, Rule, RuleStore, SessionStore},
    Error, Result,
};

const PROMPT_SOURCE: &str =
    "Forward a message from the source group/channel so I can capture its id.";
const PROMPT_TARGET: &str =
    "Forward a message from the target group/channel so I can capture its id.";
const RETRY_SOURCE: &str =
    "Could not read a group/channel id from that message. Forward a message from the source group/channel.";
const RETRY_TARGET: &str =
    "Could not read a group/channel id from that message. Forward a message from the target group/channel.";

const HELP: &str = "Commands:\n\
    /add <name> - add a forwarding rule\n\
    /list - list all forwarding rules\n\
    /delete <name> - delete a forwarding rule\n\
    /help - show this help";

pub struct RuleWizard {
    rules: Arc<RuleStore>,
    cursors: Arc<CursorStore>,
    sessions: Arc<SessionStore>,
}

impl RuleWizard {
    pub fn new(
        rules: Arc<RuleStore>,
        cursors: Arc<CursorStore>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            rules,
            cursors,
            sessions,
        }
    }

    /// `/add <name>`: start (or restart) the flow for this operator.
    ///
    /// Only a *completed* rule blocks the name; an in-progress flow under the
    /// same name is simply replaced by the new session.
    pub async fn begin_add(&self, operator: UserId, name: &str) -> Result<String> {
        if self.rules.contains(name).await {
            return Err(Error::DuplicateRule(name.to_string()));
        }

        self.sessions
            .put(
                operator,
                OperatorSession {
                    state: Phase::AwaitingSource,
                    temp_rule_name: name.to_string(),
                    source_chat_id: None,
                    target_chat_id: None,
                },
            )
            .await?;

        Ok(PROMPT_SOURCE.to_string())
    }

    /// A non-command message from an operator: advance the flow with the
    /// endpoint id extracted from the forwarded message, if any.
    ///
    /// Returns `Ok(None)` when the operator has no active flow.
    pub async fn handle_forward(
        &self,
        operator: UserId,
        forwarded: Option<ChatId>,
    ) -> Result<Option<String>> {
        let Some(session) = self.sessions.get(operator).await else {
            return Ok(None);
        };

        match session.state {
            Phase::Idle => Ok(None),
            Phase::AwaitingSource => {
                let Some(source) = forwarded else {
                    return Ok(Some(RETRY_SOURCE.to_string()));
                };

                let mut session = session;
                session.source_chat_id = Some(source);
                session.state = Phase::AwaitingTarget;
                self.sessions.put(operator, session).await?;

                Ok(Some(PROMPT_TARGET.to_string()))
            }
            Phase::AwaitingTarget => {
                let Some(target) = forwarded else {
                    return Ok(Some(RETRY_TARGET.to_string()));
                };

                let Some(source) = session.source_chat_id else {
                    // Session document was hand-edited or truncated; restart.
                    self.sessions.clear(operator).await?;
                    return Ok(Some(
                        "Session state was incomplete, start again with /add.".to_string(),
                    ));
                };

                let name = session.temp_rule_name.clone();
                let rule = Rule {
                    source_chat_id: source,
                    target_chat_id: target,
                    created_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
                    created_by: operator,
                };

                self.rules.put(&name, rule).await?;
                self.cursors.ensure(source).await?;
                self.sessions.clear(operator).await?;

                tracing::info!(rule = %name, source = source.0, target = target.0, "rule created");
                Ok(Some(format!(
                    "Rule '{name}' added, forwarding starts on the next poll."
                )))
            }
        }
    }

    pub async fn list(&self) -> String {
        let rules = self.rules.snapshot().await;
        if rules.is_empty() {
            return "No forwarding rules configured.".to_string();
        }

        let mut out = String::from("Forwarding rules:\n");
        for (name, rule) in rules {
            out.push_str(&format!(
                "\n{name}\n  source: {}\n  target: {}\n  created: {} by {}\n",
                rule.source_chat_id.0, rule.target_chat_id.0, rule.created_at, rule.created_by.0
            ));
        }
        out
    }

    /// Delete a rule. Cursors stay: they are endpoint-scoped and may be
    /// shared with (or reused by) another rule.
    pub async fn delete(&self, name: &str) -> Result<String> {
        self.rules.remove(name).await?;
        tracing::info!(rule = %name, "rule deleted");
        Ok(format!("Rule '{name}' deleted."))
    }

    pub fn help() -> &'static str {
        HELP
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MessageId;
    use std::path::PathBuf;

    fn stores(tag: &str) -> (Arc<RuleStore>, Arc<CursorStore>, Arc<SessionStore>) {
        let base = format!("/tmp/teleport-wizard-{tag}-{}", std::process::id());
        for suffix in ["rules", "cursors", "sessions"] {
            let _ = std::fs::remove_file(format!("{base}-{suffix}.json"));
        }
        (
            Arc::new(RuleStore::open(PathBuf::from(format!("{base}-rules.json"))).unwrap()),
            Arc::new(CursorStore::open(PathBuf::from(format!("{base}-cursors.json"))).unwrap()),
            Arc::new(SessionStore::open(PathBuf::from(format!("{base}-sessions.json"))).unwrap()),
        )
    }

    fn wizard(tag: &str) -> (RuleWizard, Arc<RuleStore>, Arc<CursorStore>) {
        let (rules, cursors, sessions) = stores(tag);
        (
            RuleWizard::new(rules.clone(), cursors.clone(), sessions),
            rules,
            cursors,
        )
    }

    const OP: UserId = UserId(42);

    #[tokio::test]
    async fn full_flow_creates_rule_and_cursor() {
        let (wizard, rules, cursors) = wizard("full-flow");

        wizard.begin_add(OP, "news").await.unwrap();
        wizard
            .handle_forward(OP, Some(ChatId(-100)))
            .await
            .unwrap()
            .expect("target prompt");
        let done = wizard
            .handle_forward(OP, Some(ChatId(-200)))
            .await
            .unwrap()
            .expect("confirmation");
        assert!(done.contains("news"));

        let snapshot = rules.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        let (name, rule) = &snapshot[0];
        assert_eq!(name, "news");
        assert_eq!(rule.source_chat_id, ChatId(-100));
        assert_eq!(rule.target_chat_id, ChatId(-200));
        assert_eq!(rule.created_by, OP);

        // Source cursor exists before the first poll.
        assert_eq!(cursors.get(ChatId(-100)).await, MessageId::ZERO);

        // Operator is back to idle: further messages are ignored.
        assert_eq!(wizard.handle_forward(OP, Some(ChatId(-1))).await.unwrap(), None);
    }

    #[tokio::test]
    async fn duplicate_name_rejected_only_for_completed_rules() {
        let (wizard, _rules, _cursors) = wizard("duplicate");

        // In-progress flow under the same name may be restarted.
        wizard.begin_add(OP, "news").await.unwrap();
        wizard.begin_add(OP, "news").await.unwrap();

        wizard.handle_forward(OP, Some(ChatId(-100))).await.unwrap();
        wizard.handle_forward(OP, Some(ChatId(-200))).await.unwrap();

        match wizard.begin_add(OP, "news").await {
            Err(Error::DuplicateRule(name)) => assert_eq!(name, "news"),
            other => panic!("expected DuplicateRule, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn parse_failure_keeps_phase_and_reprompts() {
        let (wizard, rules, _cursors) = wizard("reprompt");

        wizard.begin_add(OP, "news").await.unwrap();

        let retry = wizard.handle_forward(OP, None).await.unwrap().unwrap();
        assert!(retry.contains("source"));

        // Still awaiting the source: a valid forward advances the flow.
        let prompt = wizard
            .handle_forward(OP, Some(ChatId(-100)))
            .await
            .unwrap()
            .unwrap();
        assert!(prompt.contains("target"));

        let retry = wizard.handle_forward(OP, None).await.unwrap().unwrap();
        assert!(retry.contains("target"));
        assert!(rules.is_empty().await);
    }

    #[tokio::test]
    async fn delete_reports_unknown_and_keeps_cursors() {
        let (wizard, _rules, cursors) = wizard("delete");

        match wizard.delete("ghost").await {
            Err(Error::RuleNotFound(name)) => assert_eq!(name, "ghost"),
            other => panic!("expected RuleNotFound, got {other:?}"),
        }

        wizard.begin_add(OP, "news").await.unwrap();
        wizard.handle_forward(OP, Some(ChatId(-100))).await.unwrap();
        wizard.handle_forward(OP, Some(ChatId(-200))).await.unwrap();
        wizard.delete("news").await.unwrap();

        // The endpoint cursor survives rule deletion.
        assert_eq!(cursors.get(ChatId(-100)).await, MessageId::ZERO);
        assert_eq!(wizard.list().await, "No forwarding rules configured.");
    }

    #[tokio::test]
    async fn list_renders_all_fields() {
        let (wizard, _rules, _cursors) = wizard("list");

        wizard.begin_add(OP, "news").await.unwrap();
        wizard.handle_forward(OP, Some(ChatId(-100))).await.unwrap();
        wizard.handle_forward(OP, Some(ChatId(-200))).await.unwrap();

        let listing = wizard.list().await;
        assert!(listing.contains("news"));
        assert!(listing.contains("-100"));
        assert!(listing.contains("-200"));
        assert!(listing.contains("42"));
    }
}
