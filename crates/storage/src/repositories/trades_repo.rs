use common::models::{OrderSide, Trade, TradeInsert};
use common::now_millis;
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::decode_error;

pub struct TradesRepository;

type TradeRow = (i64, i64, i64, String, String, f64, f64, f64, Option<f64>, i64);

impl TradesRepository {
    pub async fn insert(conn: &mut SqliteConnection, trade: &TradeInsert) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
                INSERT INTO trades (
                    order_id, user_id, symbol, side, quantity, price, total, realized_pnl, executed_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                RETURNING id
            "#,
        )
        .bind(trade.order_id)
        .bind(trade.user_id)
        .bind(&trade.symbol)
        .bind(trade.side.as_str())
        .bind(trade.quantity)
        .bind(trade.price)
        .bind(trade.total)
        .bind(trade.realized_pnl)
        .bind(now_millis())
        .fetch_one(&mut *conn)
        .await
    }

    pub async fn list_for_user(pool: &SqlitePool, user_id: i64) -> Result<Vec<Trade>, sqlx::Error> {
        let rows = sqlx::query_as::<_, TradeRow>(
            r#"
                SELECT id, order_id, user_id, symbol, side, quantity, price, total, realized_pnl, executed_at
                FROM trades WHERE user_id = ? ORDER BY id
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        rows.into_iter()
            .map(
                |(id, order_id, user_id, symbol, side, quantity, price, total, realized_pnl, executed_at)| {
                    Ok(Trade {
                        id,
                        order_id,
                        user_id,
                        symbol,
                        side: side.parse::<OrderSide>().map_err(decode_error)?,
                        quantity,
                        price,
                        total,
                        realized_pnl,
                        executed_at,
                    })
                },
            )
            .collect()
    }
}
