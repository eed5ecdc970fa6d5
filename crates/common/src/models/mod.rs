use thiserror::Error;

pub mod account;
pub mod alert;
pub mod event;
pub mod order;
pub mod ticker;

pub use account::{AccountBalance, Holding, LedgerAccount, Trade, TradeInsert};
pub use alert::{
    AlertCondition, AlertRequest, AlertState, AlertTriggered, AlertType, BandCondition,
    Indicator, PriceAlert, PriceDirection,
};
pub use event::{Notification, StreamEvent};
pub use order::{
    OrderInsert, OrderKind, OrderRequest, OrderSide, OrderStatus, OrderType, PendingOrder, StopStage,
};
pub use ticker::{PriceSnapshot, change_percent};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {kind}: {value:?}")]
pub struct ParseEnumError {
    pub kind: String,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(kind: &str, value: &str) -> Self {
        Self {
            kind: kind.to_string(),
            value: value.to_string(),
        }
    }
}
