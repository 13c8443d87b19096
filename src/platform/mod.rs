pub mod line;

use anyhow::Result;
use async_trait::async_trait;

/// A text message received from the platform, answerable exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    /// Single-use token that addresses the one allowed reply
    pub reply_token: String,
    /// The message text, untouched
    pub text: String,
    /// Platform user ID, when the source exposes one
    pub user_id: Option<String>,
}

/// Sends the single reply bound to a reply token.
#[async_trait]
pub trait ReplySender: Send + Sync {
    async fn reply(&self, reply_token: &str, text: &str) -> Result<()>;
}
