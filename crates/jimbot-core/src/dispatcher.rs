//! Message intake pipeline.
//!
//! `MessageDispatcher::dispatch` turns one inbound message into zero or one
//! outbound reply: authorization, then either command routing or the
//! free-text path (history, special-date check, response decision).

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    commands::{uses_markdown, CommandRouter},
    decider::ResponseDecider,
    memdate::MemDateTracker,
    messaging::types::{InboundMessage, OutboundReply, TextFormat},
    ports::{Clock, ConfigProvider, HistoryRecorder, ResponseEngine},
    utils::{truncate_text, HUH},
};

pub fn refusal_text() -> String {
    format!("{HUH} I'm sorry, but I won't talk to you")
}

const LOG_TEXT_MAX: usize = 80;

pub struct MessageDispatcher {
    config: Arc<dyn ConfigProvider>,
    history: Arc<dyn HistoryRecorder>,
    tracker: MemDateTracker,
    router: CommandRouter,
    decider: Arc<dyn ResponseDecider>,
    responder: Arc<dyn ResponseEngine>,
    clock: Arc<dyn Clock>,
}

/// Collaborators of a `MessageDispatcher`.
pub struct DispatcherParts {
    pub config: Arc<dyn ConfigProvider>,
    pub history: Arc<dyn HistoryRecorder>,
    pub tracker: MemDateTracker,
    pub router: CommandRouter,
    pub decider: Arc<dyn ResponseDecider>,
    pub responder: Arc<dyn ResponseEngine>,
    pub clock: Arc<dyn Clock>,
}

impl MessageDispatcher {
    pub fn new(parts: DispatcherParts) -> Self {
        let DispatcherParts {
            config,
            history,
            tracker,
            router,
            decider,
            responder,
            clock,
        } = parts;
        Self {
            config,
            history,
            tracker,
            router,
            decider,
            responder,
            clock,
        }
    }

    pub async fn dispatch(&self, msg: &InboundMessage) -> Option<OutboundReply> {
        let cfg = match self.config.get() {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("config unavailable, skipping message from {}: {e}", msg.sender.0);
                return None;
            }
        };

        let pair = cfg.authorized_pair();
        let Some(role) = pair.role_of(msg.sender) else {
            info!(
                "[!] refusing user {} (authorized: {}, {})",
                msg.sender.0, pair.primary.0, pair.secondary.0
            );
            return Some(OutboundReply::text(msg.chat_id, refusal_text()));
        };

        if let Some(cmd) = &msg.command {
            let name = cmd.name.to_lowercase();
            let text = self.router.route(&name, &cmd.args, msg.sender, &cfg).await;
            let format = if uses_markdown(&name) {
                TextFormat::Markdown
            } else {
                TextFormat::Plain
            };
            return Some(
                OutboundReply::text(msg.chat_id, text)
                    .with_format(format)
                    .replying_to(msg.message_id),
            );
        }

        // Stickers, photos and voice notes arrive without text: nothing to
        // record, but they still count for the celebration and a reply.
        if msg.text.trim().is_empty() {
            debug!("[*] non-text message from {}, not recorded", msg.sender.0);
        } else {
            match self.history.append(&format!("[*] {}", msg.text)).await {
                Ok(()) => debug!("[+] message recorded"),
                Err(e) => warn!("[-] failed to record message: {e}"),
            }
        }

        let today = self.clock.today();
        if self.tracker.check(msg.sender, today, &cfg).await {
            info!("[MEMDATE] sending celebration to chat {}", msg.chat_id.0);
            return Some(
                OutboundReply::photo(
                    msg.chat_id,
                    cfg.celebration_image.clone(),
                    cfg.celebration_text.clone(),
                )
                .replying_to(msg.message_id),
            );
        }

        if !self.decider.should_respond(msg) {
            debug!(
                "[***] ignoring message: {:?}",
                truncate_text(&msg.text, LOG_TEXT_MAX)
            );
            return None;
        }

        debug!("[***] making response");
        let text = self.responder.respond(msg, role, &cfg).await;
        let mut reply = OutboundReply::text(msg.chat_id, text);
        // Quote in group chats only; private chats stay uncluttered.
        if !msg.is_private {
            reply = reply.replying_to(msg.message_id);
        }
        Some(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{test_config, Config};
    use crate::decider::FixedDecider;
    use crate::domain::{ChatId, MessageId, Role, UserId};
    use crate::errors::Error;
    use crate::memdate::{FileMarkerStore, InMemoryMarkerStore};
    use crate::messaging::types::{ChatAction, CommandInvocation};
    use crate::ports::{MarkerStore, PriceProvider, PriceQuote, SearchProvider};
    use crate::utils::FixedClock;
    use crate::Result;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    struct StaticConfig(Option<Config>);

    impl ConfigProvider for StaticConfig {
        fn get(&self) -> Result<Config> {
            self.0
                .clone()
                .ok_or_else(|| Error::Config("config.txt missing".to_string()))
        }
    }

    #[derive(Default)]
    struct FakeHistory {
        fail: bool,
        lines: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl HistoryRecorder for FakeHistory {
        async fn append(&self, text: &str) -> Result<()> {
            if self.fail {
                return Err(Error::Io(std::io::Error::other("disk full")));
            }
            self.lines.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    struct FakePrices;

    #[async_trait]
    impl PriceProvider for FakePrices {
        async fn quote(&self, _symbol: &str, _fiat: &str) -> Result<PriceQuote> {
            Ok(PriceQuote {
                display_name: "Bitcoin".to_string(),
                price_in_fiat: "50000".to_string(),
                price_in_primary: "1".to_string(),
            })
        }
    }

    struct FakeSearch;

    #[async_trait]
    impl SearchProvider for FakeSearch {
        async fn search(&self, query: &str) -> Result<String> {
            Ok(format!("https://example.com/?q={query}"))
        }
    }

    #[derive(Default)]
    struct CountingResponder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ResponseEngine for CountingResponder {
        async fn respond(&self, msg: &InboundMessage, _role: Role, _config: &Config) -> String {
            self.calls.fetch_add(1, Ordering::SeqCst);
            format!("echo: {}", msg.text)
        }
    }

    struct Harness {
        dispatcher: MessageDispatcher,
        history: Arc<FakeHistory>,
        responder: Arc<CountingResponder>,
    }

    fn ordinary_day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn birthday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 14).unwrap()
    }

    fn harness_with(
        cfg: Option<Config>,
        history: FakeHistory,
        marker: Arc<dyn MarkerStore>,
        respond: bool,
        today: NaiveDate,
    ) -> Harness {
        let history = Arc::new(history);
        let responder = Arc::new(CountingResponder::default());
        let dispatcher = MessageDispatcher::new(DispatcherParts {
            config: Arc::new(StaticConfig(cfg)),
            history: history.clone(),
            tracker: MemDateTracker::new(marker),
            router: CommandRouter::new(Arc::new(FakePrices), Arc::new(FakeSearch)),
            decider: Arc::new(FixedDecider(respond)),
            responder: responder.clone(),
            clock: Arc::new(FixedClock(today)),
        });
        Harness {
            dispatcher,
            history,
            responder,
        }
    }

    fn harness(respond: bool, today: NaiveDate) -> Harness {
        harness_with(
            Some(test_config()),
            FakeHistory::default(),
            Arc::new(InMemoryMarkerStore::default()),
            respond,
            today,
        )
    }

    fn text_msg(sender: UserId, is_private: bool, text: &str) -> InboundMessage {
        InboundMessage {
            sender,
            chat_id: ChatId(-100),
            is_private,
            command: None,
            text: text.to_string(),
            message_id: MessageId(42),
        }
    }

    fn command_msg(sender: UserId, name: &str, args: &str) -> InboundMessage {
        InboundMessage {
            command: Some(CommandInvocation {
                name: name.to_string(),
                args: args.to_string(),
            }),
            text: format!("/{name} {args}"),
            ..text_msg(sender, true, "")
        }
    }

    fn tmp_marker(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0))
            .as_nanos();
        PathBuf::from(format!("/tmp/{prefix}-{}-{ts}", std::process::id()))
    }

    #[tokio::test]
    async fn strangers_get_the_refusal_and_nothing_is_recorded() {
        let h = harness(true, birthday());
        for msg in [
            text_msg(UserId(777), false, "hello"),
            command_msg(UserId(777), "start", ""),
        ] {
            let reply = h.dispatcher.dispatch(&msg).await.unwrap();
            assert_eq!(reply, OutboundReply::text(ChatId(-100), refusal_text()));
        }
        assert!(h.history.lines.lock().unwrap().is_empty());
        assert_eq!(h.responder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn strangers_sending_stickers_get_the_refusal() {
        let h = harness(true, ordinary_day());
        let sticker = text_msg(UserId(5555), true, "");

        let reply = h.dispatcher.dispatch(&sticker).await.unwrap();
        assert_eq!(reply, OutboundReply::text(ChatId(-100), refusal_text()));
        assert!(h.history.lines.lock().unwrap().is_empty());
        assert_eq!(h.responder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn non_text_messages_are_not_recorded_but_still_celebrate() {
        let cfg = test_config();
        let h = harness(true, birthday());
        let sticker = text_msg(cfg.secondary.id, true, "");

        let reply = h.dispatcher.dispatch(&sticker).await.unwrap();
        assert!(reply.attachment.is_some());
        assert!(h.history.lines.lock().unwrap().is_empty());

        let reply = h.dispatcher.dispatch(&sticker).await.unwrap();
        assert_eq!(reply.text, "echo: ");
        assert!(h.history.lines.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn commands_are_routed_and_quoted() {
        let h = harness(false, ordinary_day());
        let cfg = test_config();

        let reply = h
            .dispatcher
            .dispatch(&command_msg(cfg.primary.id, "PRICES", ""))
            .await
            .unwrap();
        assert!(reply.text.contains("Bitcoin -> USD : 50000"));
        assert!(reply.is_formatted());
        assert_eq!(reply.reply_to, Some(MessageId(42)));
        assert!(h.history.lines.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_commands_are_sent_plain() {
        let h = harness(false, ordinary_day());
        let cfg = test_config();

        let reply = h
            .dispatcher
            .dispatch(&command_msg(cfg.secondary.id, "Google", "snake_case"))
            .await
            .unwrap();
        assert_eq!(reply.format, TextFormat::Plain);
        assert!(reply.text.contains("snake_case"));

        let reply = h
            .dispatcher
            .dispatch(&command_msg(cfg.secondary.id, "pic", ""))
            .await
            .unwrap();
        assert_eq!(reply.format, TextFormat::Plain);
    }

    #[tokio::test]
    async fn free_text_is_recorded_once() {
        let h = harness(false, ordinary_day());
        let cfg = test_config();

        let reply = h
            .dispatcher
            .dispatch(&text_msg(cfg.primary.id, true, "good morning"))
            .await;
        assert!(reply.is_none());
        assert_eq!(
            h.history.lines.lock().unwrap().as_slice(),
            ["[*] good morning".to_string()]
        );
        assert_eq!(h.responder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn group_replies_quote_private_replies_do_not() {
        let h = harness(true, ordinary_day());
        let cfg = test_config();

        let group = h
            .dispatcher
            .dispatch(&text_msg(cfg.primary.id, false, "hey"))
            .await
            .unwrap();
        assert_eq!(group.reply_to, Some(MessageId(42)));
        assert_eq!(group.text, "echo: hey");
        assert_eq!(group.format, TextFormat::Plain);

        let private = h
            .dispatcher
            .dispatch(&text_msg(cfg.primary.id, true, "hey"))
            .await
            .unwrap();
        assert_eq!(private.reply_to, None);
    }

    #[tokio::test]
    async fn history_failure_does_not_stop_the_reply() {
        let cfg = test_config();
        let h = harness_with(
            Some(cfg.clone()),
            FakeHistory {
                fail: true,
                ..Default::default()
            },
            Arc::new(InMemoryMarkerStore::default()),
            true,
            ordinary_day(),
        );

        let reply = h
            .dispatcher
            .dispatch(&text_msg(cfg.secondary.id, true, "still there?"))
            .await;
        assert!(reply.is_some());
    }

    #[tokio::test]
    async fn celebration_fires_once_and_skips_the_decider() {
        let h = harness(true, birthday());
        let cfg = test_config();
        let msg = text_msg(cfg.secondary.id, true, "morning!");

        let first = h.dispatcher.dispatch(&msg).await.unwrap();
        let attachment = first.attachment.clone().unwrap();
        assert_eq!(attachment.caption, "Happy day!");
        assert_eq!(attachment.path, PathBuf::from("./img/mem.jpg"));
        assert_eq!(first.action, ChatAction::UploadPhoto);
        assert_eq!(first.reply_to, Some(MessageId(42)));
        assert_eq!(h.responder.calls.load(Ordering::SeqCst), 0);

        let second = h.dispatcher.dispatch(&msg).await.unwrap();
        assert!(second.attachment.is_none());
        assert_eq!(h.responder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.history.lines.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn primary_identity_does_not_trigger_celebration() {
        let h = harness(true, birthday());
        let cfg = test_config();
        let reply = h
            .dispatcher
            .dispatch(&text_msg(cfg.primary.id, true, "hi"))
            .await
            .unwrap();
        assert!(reply.attachment.is_none());
    }

    #[tokio::test]
    async fn unreadable_config_skips_the_message() {
        let h = harness_with(
            None,
            FakeHistory::default(),
            Arc::new(InMemoryMarkerStore::default()),
            true,
            ordinary_day(),
        );
        assert!(h
            .dispatcher
            .dispatch(&text_msg(UserId(1), true, "hi"))
            .await
            .is_none());
        assert!(h.history.lines.lock().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_dispatch_celebrates_exactly_once() {
        let path = tmp_marker("jimbot-dispatch-race");
        let cfg = test_config();

        for _round in 0..10 {
            let _ = std::fs::remove_file(&path);
            let h = Arc::new(harness_with(
                Some(cfg.clone()),
                FakeHistory::default(),
                Arc::new(FileMarkerStore::new(&path)),
                true,
                birthday(),
            ));

            let mut handles = Vec::new();
            for i in 0..8 {
                let h = h.clone();
                let msg = text_msg(cfg.secondary.id, true, &format!("msg {i}"));
                handles.push(tokio::spawn(async move {
                    h.dispatcher.dispatch(&msg).await
                }));
            }

            let mut attachments = 0;
            for handle in handles {
                if let Some(reply) = handle.await.unwrap() {
                    if reply.attachment.is_some() {
                        attachments += 1;
                    }
                }
            }
            assert_eq!(attachments, 1);
        }

        let _ = std::fs::remove_file(&path);
    }
}
