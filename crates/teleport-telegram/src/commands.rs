//! Operator commands (`/add`, `/list`, `/delete`, `/help`).

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use teleport_core::{
    domain::{ChatId, UserId},
    wizard::RuleWizard,
    Error,
};

use crate::router::AppState;

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

/// The endpoint id a forwarded message came from, when that endpoint is a
/// group or channel (negative id). Forwards from private users carry no
/// usable endpoint.
pub fn forwarded_endpoint(msg: &Message) -> Option<ChatId> {
    let chat = msg.forward_from_chat()?;
    if chat.id.0 >= 0 {
        return None;
    }
    Some(ChatId(chat.id.0))
}

pub async fn handle_command(
    bot: Bot,
    msg: Message,
    operator: UserId,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let (cmd, args) = parse_command(msg.text().unwrap_or(""));

    let reply = match cmd.as_str() {
        "add" => add_rule(&state.wizard, operator, &args).await,
        "list" => state.wizard.list().await,
        "delete" => delete_rule(&state.wizard, &args).await,
        "help" | "start" => RuleWizard::help().to_string(),
        _ => format!("Unknown command /{cmd}. Try /help."),
    };

    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

async fn add_rule(wizard: &RuleWizard, operator: UserId, args: &str) -> String {
    let name = args.split_whitespace().next().unwrap_or("");
    if name.is_empty() {
        return "Usage: /add <name>".to_string();
    }

    match wizard.begin_add(operator, name).await {
        Ok(prompt) => prompt,
        Err(Error::DuplicateRule(name)) => {
            format!("Rule '{name}' already exists, delete it first.")
        }
        Err(e) => {
            tracing::error!(error = %e, "add command failed");
            "Internal error, try again.".to_string()
        }
    }
}

async fn delete_rule(wizard: &RuleWizard, args: &str) -> String {
    let name = args.split_whitespace().next().unwrap_or("");
    if name.is_empty() {
        return "Usage: /delete <name>".to_string();
    }

    match wizard.delete(name).await {
        Ok(reply) => reply,
        Err(Error::RuleNotFound(name)) => format!("No rule named '{name}'."),
        Err(e) => {
            tracing::error!(error = %e, "delete command failed");
            "Internal error, try again.".to_string()
        }
    }
}
