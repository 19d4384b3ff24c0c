//! Update routing: channel posts and group messages feed the ingest log,
//! private messages from allow-listed operators drive the command surface.

use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use teleport_core::{config::Config, domain::UserId, wizard::RuleWizard};

use crate::{commands, ingest::MessageLog};

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub wizard: Arc<RuleWizard>,
    pub log: Arc<MessageLog>,
}

pub async fn run(bot: Bot, state: Arc<AppState>) -> anyhow::Result<()> {
    if let Ok(me) = bot.get_me().await {
        tracing::info!(bot = %me.username(), "teleport started");
    }

    let handler = dptree::entry()
        .branch(Update::filter_channel_post().endpoint(handle_channel_post))
        .branch(Update::filter_message().endpoint(handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_channel_post(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    state.log.observe(&msg).await;
    Ok(())
}

async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    // Group and supergroup traffic is source material, never commands.
    if !msg.chat.is_private() {
        state.log.observe(&msg).await;
        return Ok(());
    }

    // Strangers get silence, not an error.
    let Some(operator) = msg
        .from()
        .map(|u| u.id.0 as i64)
        .filter(|id| state.cfg.allowed_operators.contains(id))
    else {
        return Ok(());
    };
    let operator = UserId(operator);

    if msg.text().map(|t| t.starts_with('/')).unwrap_or(false) {
        return commands::handle_command(bot, msg, operator, state).await;
    }

    // Anything else from an operator feeds the add-rule flow, if one is open.
    let forwarded = commands::forwarded_endpoint(&msg);
    match state.wizard.handle_forward(operator, forwarded).await {
        Ok(Some(reply)) => {
            bot.send_message(msg.chat.id, reply).await?;
        }
        Ok(None) => {}
        Err(e) => {
            tracing::error!(error = %e, operator = operator.0, "wizard step failed");
            bot.send_message(msg.chat.id, "Internal error, try again.")
                .await?;
        }
    }

    Ok(())
}
