use async_trait::async_trait;
use rand::seq::SliceRandom;

use crate::{
    config::Config, domain::Role, messaging::types::InboundMessage, ports::ResponseEngine,
    utils::KISS,
};

const PHRASES: &[&str] = &[
    "I hear you, {name}.",
    "Tell me more, {name}!",
    "Haha, {name}, you always say that.",
    "Hmm... let me think about it, {name}.",
    "That's so sweet, {name} {kiss}",
    "Really, {name}? No way!",
];

/// Picks a canned phrase and addresses the sender by their configured name.
#[derive(Clone, Copy, Debug, Default)]
pub struct PhraseResponder;

impl PhraseResponder {
    fn render(template: &str, name: &str) -> String {
        template.replace("{name}", name).replace("{kiss}", KISS)
    }
}

#[async_trait]
impl ResponseEngine for PhraseResponder {
    async fn respond(&self, _msg: &InboundMessage, role: Role, config: &Config) -> String {
        let name = match role {
            Role::Primary => &config.primary.name,
            Role::Secondary => &config.secondary.name,
        };
        let template = PHRASES
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or("{name}?");
        Self::render(template, name)
    }
}
