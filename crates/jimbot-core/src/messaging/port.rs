use async_trait::async_trait;

use crate::{messaging::types::OutboundReply, Result};

/// Outbound messaging port.
///
/// The dispatcher only produces `OutboundReply` values; delivering them
/// (chat action first, then text or photo) is the adapter's job.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn deliver(&self, reply: &OutboundReply) -> Result<()>;
}
