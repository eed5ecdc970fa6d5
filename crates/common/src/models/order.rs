use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::ParseEnumError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl FromStr for OrderSide {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            _ => Err(ParseEnumError::new("order side", s)),
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Limit,
    StopMarket,
    StopLimit,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Market => "market",
            Self::Limit => "limit",
            Self::StopMarket => "stop_market",
            Self::StopLimit => "stop_limit",
        }
    }
}

impl FromStr for OrderType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "market" => Ok(Self::Market),
            "limit" => Ok(Self::Limit),
            "stop_market" => Ok(Self::StopMarket),
            "stop_limit" => Ok(Self::StopLimit),
            _ => Err(ParseEnumError::new("order type", s)),
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(ParseEnumError::new("order status", s)),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a stop-limit order has observed its stop condition yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopStage {
    Unarmed,
    Armed,
}

impl StopStage {
    pub fn from_flag(stop_triggered: bool) -> Self {
        if stop_triggered {
            Self::Armed
        } else {
            Self::Unarmed
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "orderType", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum OrderKind {
    Market,
    Limit {
        limit_price: f64,
    },
    StopMarket {
        stop_price: f64,
    },
    StopLimit {
        stop_price: f64,
        limit_price: f64,
        stage: StopStage,
    },
}

impl OrderKind {
    pub fn order_type(&self) -> OrderType {
        match self {
            Self::Market => OrderType::Market,
            Self::Limit { .. } => OrderType::Limit,
            Self::StopMarket { .. } => OrderType::StopMarket,
            Self::StopLimit { .. } => OrderType::StopLimit,
        }
    }

    pub fn limit_price(&self) -> Option<f64> {
        match *self {
            Self::Limit { limit_price } | Self::StopLimit { limit_price, .. } => Some(limit_price),
            _ => None,
        }
    }

    pub fn stop_price(&self) -> Option<f64> {
        match *self {
            Self::StopMarket { stop_price } | Self::StopLimit { stop_price, .. } => {
                Some(stop_price)
            }
            _ => None,
        }
    }

    pub fn stop_triggered(&self) -> bool {
        matches!(self, Self::StopLimit { stage: StopStage::Armed, .. })
    }

    /// Rebuild the tagged kind from the flat persisted columns.
    pub fn from_parts(
        order_type: OrderType,
        limit_price: Option<f64>,
        stop_price: Option<f64>,
        stop_triggered: bool,
    ) -> Result<Self, ParseEnumError> {
        let missing = |field: &str| ParseEnumError::new(field, order_type.as_str());
        Ok(match order_type {
            OrderType::Market => Self::Market,
            OrderType::Limit => Self::Limit {
                limit_price: limit_price.ok_or_else(|| missing("limit_price"))?,
            },
            OrderType::StopMarket => Self::StopMarket {
                stop_price: stop_price.ok_or_else(|| missing("stop_price"))?,
            },
            OrderType::StopLimit => Self::StopLimit {
                stop_price: stop_price.ok_or_else(|| missing("stop_price"))?,
                limit_price: limit_price.ok_or_else(|| missing("limit_price"))?,
                stage: StopStage::from_flag(stop_triggered),
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOrder {
    pub id: i64,
    pub user_id: i64,
    pub symbol: String,
    pub side: OrderSide,
    pub kind: OrderKind,
    pub quantity: f64,
    /// Live price when the order was submitted.
    pub reference_price: f64,
    /// Cash (buy) or units (sell) set aside at creation.
    pub reserved_amount: f64,
    /// Average cost of the units a sell set aside; zero for buys.
    pub reserved_cost: f64,
    pub status: OrderStatus,
    pub executed_price: Option<f64>,
    pub executed_total: Option<f64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl PendingOrder {
    pub fn order_type(&self) -> OrderType {
        self.kind.order_type()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderInsert {
    pub user_id: i64,
    pub symbol: String,
    pub side: OrderSide,
    pub kind: OrderKind,
    pub quantity: f64,
    pub reference_price: f64,
    pub reserved_amount: f64,
    pub reserved_cost: f64,
    pub status: OrderStatus,
    pub executed_price: Option<f64>,
    pub executed_total: Option<f64>,
}

/// An order as submitted by the API layer, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub user_id: i64,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
    pub order_type: OrderType,
    pub limit_price: Option<f64>,
    pub stop_price: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_columns() {
        let kind = OrderKind::StopLimit {
            stop_price: 100.0,
            limit_price: 95.0,
            stage: StopStage::Armed,
        };
        let rebuilt = OrderKind::from_parts(
            kind.order_type(),
            kind.limit_price(),
            kind.stop_price(),
            kind.stop_triggered(),
        )
        .unwrap();
        assert_eq!(rebuilt, kind);
    }

    #[test]
    fn stop_limit_requires_both_prices() {
        let err = OrderKind::from_parts(OrderType::StopLimit, None, Some(1.0), false);
        assert!(err.is_err());
    }

    #[test]
    fn parses_wire_names() {
        assert_eq!("stop_market".parse::<OrderType>().unwrap(), OrderType::StopMarket);
        assert_eq!("SELL".parse::<OrderSide>().unwrap(), OrderSide::Sell);
        assert!("fok".parse::<OrderType>().is_err());
    }
}
