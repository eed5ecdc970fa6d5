use std::collections::HashSet;
use std::sync::Arc;

use common::config::EngineConfig;
use common::models::{
    LedgerAccount, OrderInsert, OrderKind, OrderRequest, OrderSide, OrderStatus, OrderType,
    PendingOrder, StopStage, Trade, TradeInsert,
};
use market_data::FeedCache;
use storage::repositories::{AccountsRepository, OrdersRepository, TradesRepository};
use storage::{FillReceipt, Ledger, Reservation, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::OrderError;

/// A request that passed validation, priced against the live feed.
#[derive(Debug, Clone, PartialEq)]
struct ValidatedOrder {
    user_id: i64,
    symbol: String,
    side: OrderSide,
    kind: OrderKind,
    quantity: f64,
    reference_price: f64,
}

/// Order submission, cancellation and the execution step shared with the trigger loop.
pub struct OrderService {
    pool: SqlitePool,
    cache: Arc<FeedCache>,
    symbols: HashSet<String>,
    min_notional: f64,
}

impl OrderService {
    pub fn new(
        pool: SqlitePool,
        cache: Arc<FeedCache>,
        symbols: &[String],
        min_notional: f64,
    ) -> Self {
        Self {
            pool,
            cache,
            symbols: symbols.iter().map(|s| s.to_uppercase()).collect(),
            min_notional,
        }
    }

    pub fn from_config(pool: SqlitePool, cache: Arc<FeedCache>, config: &EngineConfig) -> Self {
        Self::new(pool, cache, &config.symbols, config.min_order_notional)
    }

    /// Market orders fill right away at the live price; everything else rests.
    pub async fn submit_order(&self, request: OrderRequest) -> Result<PendingOrder, OrderError> {
        let order = self.validate(&request)?;
        match order.kind {
            OrderKind::Market => self.execute_market(order).await,
            _ => self.insert_pending(order).await,
        }
    }

    pub async fn create_pending_order(
        &self,
        request: OrderRequest,
    ) -> Result<PendingOrder, OrderError> {
        if request.order_type == OrderType::Market {
            return Err(OrderError::NotRestable(OrderType::Market));
        }
        let order = self.validate(&request)?;
        self.insert_pending(order).await
    }

    /// Cancels a pending order of `user_id` and hands its reservation back.
    pub async fn cancel_pending_order(
        &self,
        user_id: i64,
        order_id: i64,
    ) -> Result<PendingOrder, OrderError> {
        let mut tx = self.pool.begin().await?;

        if OrdersRepository::mark_cancelled(&mut tx, order_id, user_id).await? {
            let order = OrdersRepository::find(&mut tx, order_id)
                .await?
                .ok_or(OrderError::NotFound(order_id))?;
            let balance = Ledger::release(&mut tx, Reservation::for_order(&order)).await?;
            tx.commit().await?;

            info!(
                "Order {} cancelled, released {} (cash now {:.2})",
                order.id, order.reserved_amount, balance.cash_balance
            );
            return Ok(order);
        }

        tx.rollback().await?;
        let mut conn = self.pool.acquire().await?;
        match OrdersRepository::find(&mut conn, order_id).await? {
            Some(order) if order.user_id == user_id => Err(OrderError::NotPending {
                id: order_id,
                status: order.status,
            }),
            _ => Err(OrderError::NotFound(order_id)),
        }
    }

    /// Fills a pending order at `price`. `None` when another path closed it first.
    pub async fn execute_pending(
        &self,
        order: &PendingOrder,
        price: f64,
    ) -> Result<Option<FillReceipt>, OrderError> {
        let total = order.quantity * price;
        let mut tx = self.pool.begin().await?;

        if !OrdersRepository::mark_completed(&mut tx, order.id, price, total).await? {
            tx.rollback().await?;
            return Ok(None);
        }

        let receipt = Ledger::apply_fill(&mut tx, Reservation::for_order(order), price).await?;
        Self::record_trade(&mut tx, order.id, order, price, &receipt).await?;
        tx.commit().await?;

        info!(
            "Executed {} {} order {}: {} {} @ {}",
            order.order_type(),
            order.side,
            order.id,
            order.quantity,
            order.symbol,
            price
        );
        Ok(Some(receipt))
    }

    /// Persists the stop-limit arming edge.
    pub async fn arm_stop(&self, order_id: i64) -> Result<bool, OrderError> {
        Ok(OrdersRepository::arm_stop(&self.pool, order_id).await?)
    }

    pub async fn pending_orders(&self) -> Result<Vec<PendingOrder>, OrderError> {
        Ok(OrdersRepository::fetch_pending(&self.pool).await?)
    }

    pub async fn list_orders(
        &self,
        user_id: i64,
        status: Option<OrderStatus>,
    ) -> Result<Vec<PendingOrder>, OrderError> {
        Ok(OrdersRepository::list_for_user(&self.pool, user_id, status).await?)
    }

    pub async fn account(&self, user_id: i64) -> Result<Option<LedgerAccount>, OrderError> {
        Ok(AccountsRepository::account(&self.pool, user_id).await?)
    }

    pub async fn trades(&self, user_id: i64) -> Result<Vec<Trade>, OrderError> {
        Ok(TradesRepository::list_for_user(&self.pool, user_id).await?)
    }

    async fn execute_market(&self, order: ValidatedOrder) -> Result<PendingOrder, OrderError> {
        let price = order.reference_price;
        let mut tx = self.pool.begin().await?;

        let reservation = Ledger::reserve(
            &mut tx,
            order.user_id,
            &order.symbol,
            order.side,
            order.quantity,
            price,
        )
        .await?;
        let reserved_amount = reservation.amount();
        let reserved_cost = reservation.cost_basis();
        let receipt = Ledger::apply_fill(&mut tx, reservation, price).await?;

        let stored = OrdersRepository::insert(
            &mut tx,
            &OrderInsert {
                user_id: order.user_id,
                symbol: order.symbol.clone(),
                side: order.side,
                kind: OrderKind::Market,
                quantity: order.quantity,
                reference_price: price,
                reserved_amount,
                reserved_cost,
                status: OrderStatus::Completed,
                executed_price: Some(price),
                executed_total: Some(receipt.total),
            },
        )
        .await?;
        Self::record_trade(&mut tx, stored.id, &stored, price, &receipt).await?;
        tx.commit().await?;

        info!(
            "Market {} {} {} @ {} for user {}",
            stored.side, stored.quantity, stored.symbol, price, stored.user_id
        );
        Ok(stored)
    }

    async fn insert_pending(&self, order: ValidatedOrder) -> Result<PendingOrder, OrderError> {
        let reserve_price = order.kind.limit_price().unwrap_or(order.reference_price);
        let mut tx = self.pool.begin().await?;

        let reservation = Ledger::reserve(
            &mut tx,
            order.user_id,
            &order.symbol,
            order.side,
            order.quantity,
            reserve_price,
        )
        .await?;

        let stored = OrdersRepository::insert(
            &mut tx,
            &OrderInsert {
                user_id: order.user_id,
                symbol: order.symbol,
                side: order.side,
                kind: order.kind,
                quantity: order.quantity,
                reference_price: order.reference_price,
                reserved_amount: reservation.amount(),
                reserved_cost: reservation.cost_basis(),
                status: OrderStatus::Pending,
                executed_price: None,
                executed_total: None,
            },
        )
        .await?;
        tx.commit().await?;

        debug!(
            "Order {} pending: {} {} {} {}",
            stored.id,
            stored.order_type(),
            stored.side,
            stored.quantity,
            stored.symbol
        );
        Ok(stored)
    }

    async fn record_trade(
        conn: &mut SqliteConnection,
        order_id: i64,
        order: &PendingOrder,
        price: f64,
        receipt: &FillReceipt,
    ) -> Result<i64, OrderError> {
        Ok(TradesRepository::insert(
            conn,
            &TradeInsert {
                order_id,
                user_id: order.user_id,
                symbol: order.symbol.clone(),
                side: order.side,
                quantity: order.quantity,
                price,
                total: receipt.total,
                realized_pnl: receipt.realized_pnl,
            },
        )
        .await?)
    }

    fn validate(&self, request: &OrderRequest) -> Result<ValidatedOrder, OrderError> {
        if !request.quantity.is_finite() || request.quantity <= 0.0 {
            return Err(OrderError::InvalidQuantity(request.quantity));
        }

        let symbol = request.symbol.trim().to_uppercase();
        if !self.symbols.contains(&symbol) {
            return Err(OrderError::UnknownSymbol(symbol));
        }

        let order_type = request.order_type;
        let kind = match order_type {
            OrderType::Market => OrderKind::Market,
            OrderType::Limit => OrderKind::Limit {
                limit_price: require_price(request.limit_price, order_type, "limitPrice")?,
            },
            OrderType::StopMarket => OrderKind::StopMarket {
                stop_price: require_price(request.stop_price, order_type, "stopPrice")?,
            },
            OrderType::StopLimit => OrderKind::StopLimit {
                stop_price: require_price(request.stop_price, order_type, "stopPrice")?,
                limit_price: require_price(request.limit_price, order_type, "limitPrice")?,
                stage: StopStage::Unarmed,
            },
        };

        let reference_price = self
            .cache
            .price(&symbol)
            .ok_or_else(|| OrderError::NoPrice(symbol.clone()))?;

        let notional = request.quantity * reference_price;
        if notional < self.min_notional {
            return Err(OrderError::BelowMinNotional {
                notional,
                minimum: self.min_notional,
            });
        }

        Ok(ValidatedOrder {
            user_id: request.user_id,
            symbol,
            side: request.side,
            kind,
            quantity: request.quantity,
            reference_price,
        })
    }
}

fn require_price(
    value: Option<f64>,
    order_type: OrderType,
    field: &'static str,
) -> Result<f64, OrderError> {
    let value = value.ok_or(OrderError::MissingPrice { order_type, field })?;
    if !value.is_finite() || value <= 0.0 {
        return Err(OrderError::InvalidPrice { field, value });
    }
    Ok(value)
}
