use std::path::PathBuf;

use crate::domain::{ChatId, MessageId, UserId};

/// A named command with its raw argument string (`/google rust traits`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandInvocation {
    pub name: String,
    pub args: String,
}

/// One inbound message, built once by the transport adapter and passed by
/// reference through the pipeline.
#[derive(Clone, Debug)]
pub struct InboundMessage {
    pub sender: UserId,
    pub chat_id: ChatId,
    pub is_private: bool,
    pub command: Option<CommandInvocation>,
    pub text: String,
    pub message_id: MessageId,
}

impl InboundMessage {
    pub fn is_command(&self) -> bool {
        self.command.is_some()
    }
}

/// Rendering mode of an outbound text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextFormat {
    Markdown,
    Plain,
}

/// Outgoing "chat action" shown before the reply is delivered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatAction {
    Typing,
    UploadPhoto,
}

/// A local image sent with a caption.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    pub path: PathBuf,
    pub caption: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundReply {
    pub chat_id: ChatId,
    pub text: String,
    pub reply_to: Option<MessageId>,
    pub format: TextFormat,
    pub attachment: Option<Attachment>,
    pub action: ChatAction,
}

impl OutboundReply {
    /// Plain text reply with a typing indicator and no quoting.
    pub fn text(chat_id: ChatId, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            reply_to: None,
            format: TextFormat::Plain,
            attachment: None,
            action: ChatAction::Typing,
        }
    }

    pub fn photo(chat_id: ChatId, path: PathBuf, caption: impl Into<String>) -> Self {
        let caption = caption.into();
        Self {
            chat_id,
            text: caption.clone(),
            reply_to: None,
            format: TextFormat::Plain,
            attachment: Some(Attachment { path, caption }),
            action: ChatAction::UploadPhoto,
        }
    }

    pub fn replying_to(mut self, message_id: MessageId) -> Self {
        self.reply_to = Some(message_id);
        self
    }

    pub fn with_format(mut self, format: TextFormat) -> Self {
        self.format = format;
        self
    }

    pub fn is_formatted(&self) -> bool {
        self.format == TextFormat::Markdown
    }
}
