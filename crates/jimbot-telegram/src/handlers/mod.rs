//! Telegram update handlers.
//!
//! Each message is converted into an immutable `InboundMessage` and handed to
//! its own task, so a slow lookup for one message never delays another.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{Message, MessageEntityKind},
};
use tracing::{info, warn};

use jimbot_core::{
    commands::parse_command,
    domain::{ChatId, MessageId, UserId},
    messaging::{
        port::MessagingPort,
        types::{CommandInvocation, InboundMessage},
    },
};

use crate::router::AppState;

/// Build the transport-agnostic view of a Telegram message.
///
/// Returns `None` only for updates without a sender. Messages with neither
/// text nor caption (stickers, voice notes) carry an empty `text`.
pub fn to_inbound(msg: &Message) -> Option<InboundMessage> {
    let user = msg.from()?;
    let text = msg
        .text()
        .or_else(|| msg.caption())
        .unwrap_or_default()
        .to_string();

    let command = if starts_with_bot_command(msg) {
        let (name, args) = parse_command(&text);
        Some(CommandInvocation { name, args })
    } else {
        None
    };

    Some(InboundMessage {
        sender: UserId(user.id.0 as i64),
        chat_id: ChatId(msg.chat.id.0),
        is_private: msg.chat.is_private(),
        command,
        text,
        message_id: MessageId(msg.id.0),
    })
}

/// Telegram marks commands with a `bot_command` entity; only one at the very
/// start of a text message counts. Captions are never commands.
fn starts_with_bot_command(msg: &Message) -> bool {
    msg.text().is_some()
        && msg.entities().is_some_and(|entities| {
            entities
                .iter()
                .any(|e| e.offset == 0 && matches!(e.kind, MessageEntityKind::BotCommand))
        })
}

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(inbound) = to_inbound(&msg) else {
        return Ok(());
    };

    info!(
        "[**] got {} from user {}",
        if inbound.is_command() { "command" } else { "message" },
        inbound.sender.0
    );

    tokio::spawn(async move {
        let Some(reply) = state.dispatcher.dispatch(&inbound).await else {
            return;
        };
        if let Err(e) = state.messenger.deliver(&reply).await {
            warn!("failed to deliver reply to chat {}: {e}", reply.chat_id.0);
        }
    });

    Ok(())
}
