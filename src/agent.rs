use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::Result;
use futures::FutureExt;
use tracing::{error, info, warn};

use crate::llm::Generator;
use crate::platform::{InboundEvent, ReplySender};
use crate::profile::select_profile;
use crate::prompt::compose_prompt;

/// Sent instead of generated text whenever generation fails.
pub const APOLOGY_MESSAGE: &str = "申し訳ありません、エラーが発生しました。";

/// Turns one inbound message into exactly one reply.
/// Platform-agnostic: generation and reply delivery are injected.
pub struct Agent {
    generator: Arc<dyn Generator>,
    replier: Arc<dyn ReplySender>,
}

impl Agent {
    pub fn new(generator: Arc<dyn Generator>, replier: Arc<dyn ReplySender>) -> Self {
        Self { generator, replier }
    }

    /// Handle one event end to end. Never fails: generation problems become
    /// the apology reply, and a failed reply is logged and dropped.
    pub async fn handle_event(&self, event: InboundEvent) {
        let answer = self.answer(&event.text).await;

        if let Err(e) = self.replier.reply(&event.reply_token, &answer).await {
            error!("Reply dispatch failed, reply is lost: {:#}", e);
        }
    }

    /// Produce the reply text for a message, falling back to the apology.
    async fn answer(&self, text: &str) -> String {
        let result = AssertUnwindSafe(self.generate(text)).catch_unwind().await;
        match result {
            Ok(Ok(generated)) => generated,
            Ok(Err(e)) => {
                warn!("Generation failed, sending apology: {:#}", e);
                APOLOGY_MESSAGE.to_string()
            }
            Err(_) => {
                warn!("Generation panicked, sending apology");
                APOLOGY_MESSAGE.to_string()
            }
        }
    }

    async fn generate(&self, text: &str) -> Result<String> {
        let kind = select_profile(text);
        let prompt = compose_prompt(text);
        info!(
            "Generating reply with {} profile ({} chars of input)",
            kind,
            text.chars().count()
        );
        self.generator.generate(&prompt, kind.profile()).await
    }
}
