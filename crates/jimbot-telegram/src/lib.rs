//! Telegram adapter (teloxide).
//!
//! This crate implements the `jimbot-core` MessagingPort over the Telegram Bot
//! API and converts incoming updates into `InboundMessage`s.

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{InputFile, ParseMode},
};

use tokio::time::sleep;

pub mod handlers;
pub mod router;

use jimbot_core::{
    domain::{ChatId, MessageId},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{ChatAction, OutboundReply, TextFormat},
    },
    Result,
};

// Command replies are written for legacy Markdown (single backtick blocks).
#[allow(deprecated)]
fn legacy_markdown() -> ParseMode {
    ParseMode::Markdown
}

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }

    async fn send_chat_action(&self, chat_id: ChatId, action: ChatAction) -> Result<()> {
        let tg_action = match action {
            ChatAction::Typing => teloxide::types::ChatAction::Typing,
            ChatAction::UploadPhoto => teloxide::types::ChatAction::UploadPhoto,
        };
        self.with_retry(|| self.bot.send_chat_action(Self::tg_chat(chat_id), tg_action))
            .await?;
        Ok(())
    }

    async fn send_text(&self, reply: &OutboundReply) -> Result<()> {
        self.with_retry(|| {
            let mut req = self
                .bot
                .send_message(Self::tg_chat(reply.chat_id), reply.text.clone());
            if reply.format == TextFormat::Markdown {
                req = req.parse_mode(legacy_markdown());
            }
            if let Some(id) = reply.reply_to {
                req = req.reply_to_message_id(Self::tg_msg_id(id));
            }
            req
        })
        .await?;
        Ok(())
    }

    async fn send_photo(&self, reply: &OutboundReply) -> Result<()> {
        let Some(attachment) = &reply.attachment else {
            return self.send_text(reply).await;
        };

        self.with_retry(|| {
            let mut req = self
                .bot
                .send_photo(
                    Self::tg_chat(reply.chat_id),
                    InputFile::file(attachment.path.clone()),
                )
                .caption(attachment.caption.clone());
            if let Some(id) = reply.reply_to {
                req = req.reply_to_message_id(Self::tg_msg_id(id));
            }
            req
        })
        .await?;
        Ok(())
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    async fn deliver(&self, reply: &OutboundReply) -> Result<()> {
        // The indicator is cosmetic; a failure here must not drop the reply.
        if let Err(e) = self.send_chat_action(reply.chat_id, reply.action).await {
            tracing::debug!("chat action failed: {e}");
        }

        if reply.attachment.is_some() {
            self.send_photo(reply).await
        } else {
            self.send_text(reply).await
        }
    }
}
