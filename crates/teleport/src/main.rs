use std::sync::Arc;

use teloxide::Bot;
use tokio_util::sync::CancellationToken;

use teleport_core::{
    config::Config,
    engine::ForwardingEngine,
    scheduler::RelayScheduler,
    store::{CursorStore, RuleStore, SessionStore},
    wizard::RuleWizard,
};
use teleport_telegram::{
    ingest::MessageLog,
    router::{self, AppState},
    BotTransport,
};

#[tokio::main]
async fn main() -> Result<(), teleport_core::Error> {
    teleport_core::logging::init("teleport")?;

    let cfg = Arc::new(Config::load()?);

    let rules = Arc::new(RuleStore::open(cfg.rules_file.clone())?);
    let cursors = Arc::new(CursorStore::open(cfg.cursors_file.clone())?);
    let sessions = Arc::new(SessionStore::open(cfg.sessions_file.clone())?);

    // Every configured source has a cursor before the first poll.
    for (_, rule) in rules.snapshot().await {
        cursors.ensure(rule.source_chat_id).await?;
    }

    let bot = Bot::new(cfg.bot_token.clone());
    let log = Arc::new(MessageLog::new(cfg.ingest_capacity));
    let transport = Arc::new(BotTransport::new(bot.clone(), log.clone()));

    let engine = Arc::new(ForwardingEngine::new(
        transport,
        cursors.clone(),
        cfg.engine(),
    ));
    let wizard = Arc::new(RuleWizard::new(rules.clone(), cursors, sessions));
    let scheduler = RelayScheduler::new(rules, engine, cfg.scheduler());

    let shutdown = CancellationToken::new();
    let poller = {
        let token = shutdown.clone();
        tokio::spawn(async move { scheduler.run(token).await })
    };

    let state = Arc::new(AppState { cfg, wizard, log });
    let result = router::run(bot, state)
        .await
        .map_err(|e| teleport_core::Error::External(format!("telegram bot failed: {e}")));

    shutdown.cancel();
    let _ = poller.await;

    result
}
