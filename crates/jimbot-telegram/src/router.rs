use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tracing::{info, warn};

use jimbot_core::{dispatcher::MessageDispatcher, messaging::port::MessagingPort};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<MessageDispatcher>,
    pub messenger: Arc<dyn MessagingPort>,
}

/// Long-poll Telegram and dispatch every message until the process is stopped.
pub async fn run_polling(token: String, dispatcher: Arc<MessageDispatcher>) -> anyhow::Result<()> {
    let bot = Bot::new(token);

    match bot.get_me().await {
        Ok(me) => info!("jimbot started: @{}", me.username()),
        Err(e) => warn!("get_me failed (continuing): {e}"),
    }

    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let state = Arc::new(AppState {
        dispatcher,
        messenger,
    });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}
