use anyhow::Context;
use async_trait::async_trait;
use engine::Notifier;
use teloxide::prelude::*;

/// Sends alert texts to the chat id stored on the user.
pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(token: &str) -> Self {
        Self {
            bot: Bot::new(token),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_text(&self, address: &str, text: &str) -> anyhow::Result<()> {
        let chat_id: i64 = address
            .trim()
            .parse()
            .with_context(|| format!("Invalid Telegram chat id {:?}", address))?;
        self.bot
            .send_message(ChatId(chat_id), text)
            .await
            .context("Telegram send failed")?;
        Ok(())
    }
}
