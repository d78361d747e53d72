use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use jimbot_core::{
    commands::CommandRouter,
    config::FileConfigProvider,
    decider::RandomDecider,
    dispatcher::{DispatcherParts, MessageDispatcher},
    history::FileHistoryRecorder,
    memdate::{FileMarkerStore, MemDateTracker},
    ports::ConfigProvider,
    responder::PhraseResponder,
    utils::SystemClock,
};
use jimbot_providers::{CryptoComparePrices, GoogleSearch};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    jimbot_core::logging::init("jimbot")?;

    let provider = Arc::new(FileConfigProvider::from_env());
    // A malformed config is fatal at startup; later re-reads only skip messages.
    let cfg = provider
        .get()
        .with_context(|| format!("loading {}", provider.path().display()))?;

    info!(
        "authorized users: {} ({}), {} ({})",
        cfg.primary.name, cfg.primary.id.0, cfg.secondary.name, cfg.secondary.id.0
    );
    let history = Arc::new(FileHistoryRecorder::new(cfg.history_file.clone()));
    info!("history file: {}", history.path().display());

    let router = CommandRouter::new(
        Arc::new(CryptoComparePrices::new()?),
        Arc::new(GoogleSearch::new(
            cfg.search_api_key.clone(),
            cfg.search_engine_id.clone(),
        )?),
    );

    let dispatcher = Arc::new(MessageDispatcher::new(DispatcherParts {
        config: provider,
        history,
        tracker: MemDateTracker::new(Arc::new(FileMarkerStore::new(cfg.marker_file.clone()))),
        router,
        decider: Arc::new(RandomDecider::new(cfg.reply_probability)),
        responder: Arc::new(PhraseResponder),
        clock: Arc::new(SystemClock),
    }));

    jimbot_telegram::router::run_polling(cfg.telegram_bot_token.clone(), dispatcher)
        .await
        .context("telegram bot failed")?;

    Ok(())
}
