use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Insufficient balance: required {required:.2} USDT, available {available:.2} USDT")]
    InsufficientBalance { required: f64, available: f64 },
    #[error("Insufficient {symbol} holdings: required {required}, available {available}")]
    InsufficientHoldings {
        symbol: String,
        required: f64,
        available: f64,
    },
    #[error("Account {0} not found")]
    AccountNotFound(i64),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl LedgerError {
    pub fn is_insufficient(&self) -> bool {
        matches!(
            self,
            Self::InsufficientBalance { .. } | Self::InsufficientHoldings { .. }
        )
    }
}

pub(crate) fn decode_error<E>(e: E) -> sqlx::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    sqlx::Error::Decode(Box::new(e))
}
