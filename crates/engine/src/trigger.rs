//! Per-tick decision for a pending order, kept free of I/O.

use common::models::{OrderKind, OrderSide, OrderStatus, PendingOrder, StopStage};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TriggerAction {
    Hold,
    /// Persist the stop-limit arming edge. The order does not fill this tick.
    Arm,
    Execute { price: f64 },
}

/// Buy fills at or under the limit, sell at or over it.
pub fn limit_reached(side: OrderSide, price: f64, limit_price: f64) -> bool {
    match side {
        OrderSide::Buy => price <= limit_price,
        OrderSide::Sell => price >= limit_price,
    }
}

/// Buy stops fire on the way up, sell stops on the way down.
pub fn stop_reached(side: OrderSide, price: f64, stop_price: f64) -> bool {
    match side {
        OrderSide::Buy => price >= stop_price,
        OrderSide::Sell => price <= stop_price,
    }
}

pub fn evaluate(order: &PendingOrder, price: f64) -> TriggerAction {
    if order.status != OrderStatus::Pending || !price.is_finite() || price <= 0.0 {
        return TriggerAction::Hold;
    }

    match order.kind {
        OrderKind::Market => TriggerAction::Hold,
        OrderKind::Limit { limit_price } => {
            if limit_reached(order.side, price, limit_price) {
                TriggerAction::Execute { price: limit_price }
            } else {
                TriggerAction::Hold
            }
        }
        OrderKind::StopMarket { stop_price } => {
            if stop_reached(order.side, price, stop_price) {
                TriggerAction::Execute { price }
            } else {
                TriggerAction::Hold
            }
        }
        OrderKind::StopLimit {
            stop_price,
            stage: StopStage::Unarmed,
            ..
        } => {
            if stop_reached(order.side, price, stop_price) {
                TriggerAction::Arm
            } else {
                TriggerAction::Hold
            }
        }
        OrderKind::StopLimit {
            limit_price,
            stage: StopStage::Armed,
            ..
        } => {
            if limit_reached(order.side, price, limit_price) {
                TriggerAction::Execute { price: limit_price }
            } else {
                TriggerAction::Hold
            }
        }
    }
}
