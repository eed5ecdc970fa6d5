use common::models::{OrderStatus, OrderType};
use storage::LedgerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("quantity must be a positive number, got {0}")]
    InvalidQuantity(f64),
    #[error("{order_type} orders require a {field}")]
    MissingPrice {
        order_type: OrderType,
        field: &'static str,
    },
    #[error("{field} must be a positive number, got {value}")]
    InvalidPrice { field: &'static str, value: f64 },
    #[error("symbol {0} is not tracked")]
    UnknownSymbol(String),
    #[error("no live price for {0} yet")]
    NoPrice(String),
    #[error("order value {notional:.2} USDT is below the minimum of {minimum:.2} USDT")]
    BelowMinNotional { notional: f64, minimum: f64 },
    #[error("{0} orders execute immediately and cannot rest")]
    NotRestable(OrderType),
    #[error("order {0} not found")]
    NotFound(i64),
    #[error("order {id} is {status}, only pending orders can be cancelled")]
    NotPending { id: i64, status: OrderStatus },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl OrderError {
    /// Rejections caused by the request itself rather than by the system.
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::Database(_))
            && !matches!(self, Self::Ledger(LedgerError::Database(_)))
    }
}

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("symbol {0} is not tracked")]
    UnknownSymbol(String),
    #[error("target price must be a positive number, got {0}")]
    InvalidTarget(f64),
    #[error("unsupported chart interval {0:?}")]
    InvalidInterval(String),
    #[error("alert {0} not found")]
    NotFound(i64),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
