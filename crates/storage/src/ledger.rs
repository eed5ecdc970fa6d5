//! The only legal mutation path for cash balances and holdings.
//!
//! Every function takes the caller's connection so it can be composed into
//! the caller's transaction together with the order status transition that
//! guards it.

use common::models::{AccountBalance, Holding, OrderSide, PendingOrder};
use common::now_millis;
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::LedgerError;

/// Tolerance for holdings comparisons, absorbs float noise on full-position sells.
const QTY_EPSILON: f64 = 1e-9;

/// Cash (buy) or units (sell) set aside for one order.
///
/// Move-only: consumed exactly once by [`Ledger::apply_fill`] or [`Ledger::release`].
#[must_use = "a reservation must be consumed by apply_fill or release"]
#[derive(Debug, PartialEq)]
pub struct Reservation {
    user_id: i64,
    symbol: String,
    side: OrderSide,
    quantity: f64,
    amount: f64,
    /// Average cost of the reserved units (sells), zero for buys.
    cost_basis: f64,
}

impl Reservation {
    /// Rehydrates the reservation persisted with a pending order. Callers must
    /// first win the order's conditional status transition in the same transaction.
    pub fn for_order(order: &PendingOrder) -> Self {
        Self {
            user_id: order.user_id,
            symbol: order.symbol.clone(),
            side: order.side,
            quantity: order.quantity,
            amount: order.reserved_amount,
            cost_basis: order.reserved_cost,
        }
    }

    /// USDT for buys, units for sells.
    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn cost_basis(&self) -> f64 {
        self.cost_basis
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillReceipt {
    pub total: f64,
    /// Unused part of a buy reservation returned to cash.
    pub refund: f64,
    pub realized_pnl: Option<f64>,
    pub balance: AccountBalance,
}

pub struct Ledger;

impl Ledger {
    pub async fn open_account(
        conn: &mut SqliteConnection,
        username: &str,
        initial_cash: f64,
        telegram_chat_id: Option<&str>,
    ) -> Result<i64, LedgerError> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
                INSERT INTO users (username, cash_balance, telegram_chat_id, created_at)
                VALUES (?, ?, ?, ?)
                RETURNING id
            "#,
        )
        .bind(username)
        .bind(initial_cash)
        .bind(telegram_chat_id)
        .bind(now_millis())
        .fetch_one(&mut *conn)
        .await?;
        Ok(id)
    }

    pub async fn reserve(
        conn: &mut SqliteConnection,
        user_id: i64,
        symbol: &str,
        side: OrderSide,
        quantity: f64,
        price: f64,
    ) -> Result<Reservation, LedgerError> {
        let (amount, cost_basis) = match side {
            OrderSide::Buy => {
                let amount = quantity * price;
                Self::debit_cash(conn, user_id, amount).await?;
                (amount, 0.0)
            }
            OrderSide::Sell => {
                let held = Self::holding(conn, user_id, symbol).await?;
                let taken = sqlx::query(
                    r#"
                        UPDATE holdings SET quantity = MAX(quantity - ?1, 0)
                        WHERE user_id = ?2 AND symbol = ?3 AND quantity >= ?1 - ?4
                    "#,
                )
                .bind(quantity)
                .bind(user_id)
                .bind(symbol)
                .bind(QTY_EPSILON)
                .execute(&mut *conn)
                .await?;

                if taken.rows_affected() == 0 {
                    return Err(LedgerError::InsufficientHoldings {
                        symbol: symbol.to_string(),
                        required: quantity,
                        available: held.quantity,
                    });
                }
                (quantity, held.avg_cost_basis)
            }
        };

        debug!(
            "Reserved {} {} for user {} ({} {} @ {})",
            amount,
            if side == OrderSide::Buy { "USDT" } else { symbol },
            user_id,
            side,
            quantity,
            price
        );

        Ok(Reservation {
            user_id,
            symbol: symbol.to_string(),
            side,
            quantity,
            amount,
            cost_basis,
        })
    }

    pub async fn release(
        conn: &mut SqliteConnection,
        reservation: Reservation,
    ) -> Result<AccountBalance, LedgerError> {
        match reservation.side {
            OrderSide::Buy => {
                Self::credit_cash(conn, reservation.user_id, reservation.amount).await?;
            }
            OrderSide::Sell => {
                // Units return at their own cost; buys filled meanwhile only
                // averaged against what was left in the holding.
                let restored = Self::holding(conn, reservation.user_id, &reservation.symbol)
                    .await?
                    .merge_buy(
                        reservation.amount,
                        reservation.amount * reservation.cost_basis,
                    );
                Self::write_holding(conn, reservation.user_id, &reservation.symbol, restored)
                    .await?;
            }
        }

        Self::balance(conn, reservation.user_id, &reservation.symbol).await
    }

    /// Settles a reservation at `fill_price`.
    ///
    /// Buys merge into the holding at the weighted average cost, refunding any
    /// unused reservation or debiting a shortfall. Sells credit the proceeds;
    /// their units already left the holding when reserved.
    pub async fn apply_fill(
        conn: &mut SqliteConnection,
        reservation: Reservation,
        fill_price: f64,
    ) -> Result<FillReceipt, LedgerError> {
        let Reservation {
            user_id,
            symbol,
            side,
            quantity,
            amount,
            cost_basis,
        } = reservation;
        let total = quantity * fill_price;

        let (refund, realized_pnl) = match side {
            OrderSide::Buy => {
                let delta = amount - total;
                if delta > 0.0 {
                    Self::credit_cash(conn, user_id, delta).await?;
                } else if delta < 0.0 {
                    Self::debit_cash(conn, user_id, -delta).await?;
                }

                let merged = Self::holding(conn, user_id, &symbol)
                    .await?
                    .merge_buy(quantity, total);
                Self::write_holding(conn, user_id, &symbol, merged).await?;
                (delta.max(0.0), None)
            }
            OrderSide::Sell => {
                Self::credit_cash(conn, user_id, total).await?;
                (0.0, Some((fill_price - cost_basis) * quantity))
            }
        };

        let balance = Self::balance(conn, user_id, &symbol).await?;
        Ok(FillReceipt {
            total,
            refund,
            realized_pnl,
            balance,
        })
    }

    async fn debit_cash(
        conn: &mut SqliteConnection,
        user_id: i64,
        amount: f64,
    ) -> Result<(), LedgerError> {
        let debited = sqlx::query(
            "UPDATE users SET cash_balance = cash_balance - ?1 WHERE id = ?2 AND cash_balance >= ?1",
        )
        .bind(amount)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

        if debited.rows_affected() == 0 {
            let available = Self::cash(conn, user_id).await?;
            return Err(LedgerError::InsufficientBalance {
                required: amount,
                available,
            });
        }
        Ok(())
    }

    async fn credit_cash(
        conn: &mut SqliteConnection,
        user_id: i64,
        amount: f64,
    ) -> Result<(), LedgerError> {
        let credited = sqlx::query("UPDATE users SET cash_balance = cash_balance + ? WHERE id = ?")
            .bind(amount)
            .bind(user_id)
            .execute(&mut *conn)
            .await?;

        if credited.rows_affected() == 0 {
            return Err(LedgerError::AccountNotFound(user_id));
        }
        Ok(())
    }

    async fn cash(conn: &mut SqliteConnection, user_id: i64) -> Result<f64, LedgerError> {
        sqlx::query_scalar::<_, f64>("SELECT cash_balance FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or(LedgerError::AccountNotFound(user_id))
    }

    async fn holding(
        conn: &mut SqliteConnection,
        user_id: i64,
        symbol: &str,
    ) -> Result<Holding, LedgerError> {
        let row = sqlx::query_as::<_, (f64, f64)>(
            "SELECT quantity, avg_cost FROM holdings WHERE user_id = ? AND symbol = ?",
        )
        .bind(user_id)
        .bind(symbol)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row
            .map(|(quantity, avg_cost_basis)| Holding {
                quantity,
                avg_cost_basis,
            })
            .unwrap_or(Holding {
                quantity: 0.0,
                avg_cost_basis: 0.0,
            }))
    }

    async fn write_holding(
        conn: &mut SqliteConnection,
        user_id: i64,
        symbol: &str,
        holding: Holding,
    ) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
                INSERT INTO holdings (user_id, symbol, quantity, avg_cost)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(user_id, symbol) DO UPDATE
                SET quantity = excluded.quantity, avg_cost = excluded.avg_cost
            "#,
        )
        .bind(user_id)
        .bind(symbol)
        .bind(holding.quantity)
        .bind(holding.avg_cost_basis)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    async fn balance(
        conn: &mut SqliteConnection,
        user_id: i64,
        symbol: &str,
    ) -> Result<AccountBalance, LedgerError> {
        Ok(AccountBalance {
            cash_balance: Self::cash(conn, user_id).await?,
            holding: Self::holding(conn, user_id, symbol).await?,
        })
    }
}
