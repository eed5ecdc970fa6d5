use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::OrderSide;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub quantity: f64,
    pub avg_cost_basis: f64,
}

impl Holding {
    /// Weighted average after buying `quantity` units for `fill_total`.
    pub fn merge_buy(&self, quantity: f64, fill_total: f64) -> Holding {
        let new_qty = self.quantity + quantity;
        if new_qty <= 0.0 {
            return Holding {
                quantity: 0.0,
                avg_cost_basis: 0.0,
            };
        }
        Holding {
            quantity: new_qty,
            avg_cost_basis: (self.avg_cost_basis * self.quantity + fill_total) / new_qty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerAccount {
    pub user_id: i64,
    pub username: String,
    pub cash_balance: f64,
    pub telegram_chat_id: Option<String>,
    pub holdings: BTreeMap<String, Holding>,
}

impl LedgerAccount {
    pub fn holding(&self, symbol: &str) -> Option<&Holding> {
        self.holdings.get(symbol)
    }

    /// Cash plus holdings marked at the supplied prices; unpriced symbols count at cost.
    pub fn equity<F>(&self, price_of: F) -> f64
    where
        F: Fn(&str) -> Option<f64>,
    {
        self.cash_balance
            + self
                .holdings
                .iter()
                .map(|(symbol, h)| h.quantity * price_of(symbol).unwrap_or(h.avg_cost_basis))
                .sum::<f64>()
    }
}

/// Balance snapshot returned by ledger mutations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalance {
    pub cash_balance: f64,
    pub holding: Holding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub id: i64,
    pub order_id: i64,
    pub user_id: i64,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
    pub price: f64,
    pub total: f64,
    pub realized_pnl: Option<f64>,
    pub executed_at: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeInsert {
    pub order_id: i64,
    pub user_id: i64,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
    pub price: f64,
    pub total: f64,
    pub realized_pnl: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_buy_sets_cost_to_fill_price() {
        let empty = Holding {
            quantity: 0.0,
            avg_cost_basis: 0.0,
        };
        let h = empty.merge_buy(10.0, 500.0);
        assert_eq!(h.quantity, 10.0);
        assert_eq!(h.avg_cost_basis, 50.0);
    }

    #[test]
    fn second_buy_is_weighted() {
        let h = Holding {
            quantity: 10.0,
            avg_cost_basis: 50.0,
        }
        .merge_buy(10.0, 700.0);
        assert_eq!(h.quantity, 20.0);
        assert_eq!(h.avg_cost_basis, 60.0);
    }
}
