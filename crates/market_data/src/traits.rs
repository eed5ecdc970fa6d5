use async_trait::async_trait;

/// Wire payloads that normalize into one of the shared models.
pub trait RemoteResponse<T> {
    type Error;

    fn to_model(&self) -> Result<T, Self::Error>;
}

/// Historical closing prices, oldest first.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClosesSource: Send + Sync {
    async fn fetch_closes(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<f64>>;
}
