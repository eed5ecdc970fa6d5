use async_trait::async_trait;

/// Outbound text delivery. Addresses are opaque to the engine.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_text(&self, address: &str, text: &str) -> anyhow::Result<()>;
}
