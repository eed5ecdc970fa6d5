use common::models::{OrderInsert, OrderKind, OrderSide, OrderStatus, OrderType, PendingOrder};
use common::now_millis;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::error::decode_error;

const ORDER_COLUMNS: &str = r#"
    id, user_id, symbol, side, order_type, quantity, reference_price, limit_price,
    stop_price, stop_triggered, reserved_amount, reserved_cost, status, executed_price,
    executed_total, created_at, updated_at
"#;

pub struct OrdersRepository;

impl OrdersRepository {
    pub async fn insert(
        conn: &mut SqliteConnection,
        order: &OrderInsert,
    ) -> Result<PendingOrder, sqlx::Error> {
        let now = now_millis();
        let sql = format!(
            r#"
                INSERT INTO orders (
                    user_id, symbol, side, order_type, quantity, reference_price, limit_price,
                    stop_price, stop_triggered, reserved_amount, reserved_cost, status,
                    executed_price, executed_total, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                RETURNING {ORDER_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(order.user_id)
            .bind(&order.symbol)
            .bind(order.side.as_str())
            .bind(order.kind.order_type().as_str())
            .bind(order.quantity)
            .bind(order.reference_price)
            .bind(order.kind.limit_price())
            .bind(order.kind.stop_price())
            .bind(order.kind.stop_triggered())
            .bind(order.reserved_amount)
            .bind(order.reserved_cost)
            .bind(order.status.as_str())
            .bind(order.executed_price)
            .bind(order.executed_total)
            .bind(now)
            .bind(now)
            .fetch_one(&mut *conn)
            .await?;

        order_from_row(&row)
    }

    /// Scan query of the trigger loop: only orders still pending.
    pub async fn fetch_pending(pool: &SqlitePool) -> Result<Vec<PendingOrder>, sqlx::Error> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE status = 'pending' AND order_type != 'market' ORDER BY id"
        );
        let rows = sqlx::query(&sql).fetch_all(pool).await?;
        rows.iter().map(order_from_row).collect()
    }

    pub async fn find(
        conn: &mut SqliteConnection,
        order_id: i64,
    ) -> Result<Option<PendingOrder>, sqlx::Error> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(order_id)
            .fetch_optional(&mut *conn)
            .await?;
        row.as_ref().map(order_from_row).transpose()
    }

    pub async fn list_for_user(
        pool: &SqlitePool,
        user_id: i64,
        status: Option<OrderStatus>,
    ) -> Result<Vec<PendingOrder>, sqlx::Error> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = ?1 AND (?2 IS NULL OR status = ?2) ORDER BY id DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(status.map(|s| s.as_str()))
            .fetch_all(pool)
            .await?;
        rows.iter().map(order_from_row).collect()
    }

    /// `pending` to `completed`. Returns false when another path already moved the order.
    pub async fn mark_completed(
        conn: &mut SqliteConnection,
        order_id: i64,
        executed_price: f64,
        executed_total: f64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
                UPDATE orders
                SET status = 'completed', executed_price = ?, executed_total = ?, updated_at = ?
                WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(executed_price)
        .bind(executed_total)
        .bind(now_millis())
        .bind(order_id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// `pending` to `cancelled`, scoped to the owner.
    pub async fn mark_cancelled(
        conn: &mut SqliteConnection,
        order_id: i64,
        user_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
                UPDATE orders SET status = 'cancelled', updated_at = ?
                WHERE id = ? AND user_id = ? AND status = 'pending'
            "#,
        )
        .bind(now_millis())
        .bind(order_id)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Persists the stop-limit arming edge; a no-op for anything already armed or closed.
    pub async fn arm_stop(pool: &SqlitePool, order_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
                UPDATE orders SET stop_triggered = 1, updated_at = ?
                WHERE id = ? AND status = 'pending' AND order_type = 'stop_limit' AND stop_triggered = 0
            "#,
        )
        .bind(now_millis())
        .bind(order_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

fn order_from_row(row: &SqliteRow) -> Result<PendingOrder, sqlx::Error> {
    let side: String = row.try_get("side")?;
    let order_type: String = row.try_get("order_type")?;
    let status: String = row.try_get("status")?;

    let order_type = order_type.parse::<OrderType>().map_err(decode_error)?;
    let kind = OrderKind::from_parts(
        order_type,
        row.try_get("limit_price")?,
        row.try_get("stop_price")?,
        row.try_get("stop_triggered")?,
    )
    .map_err(decode_error)?;

    Ok(PendingOrder {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        symbol: row.try_get("symbol")?,
        side: side.parse::<OrderSide>().map_err(decode_error)?,
        kind,
        quantity: row.try_get("quantity")?,
        reference_price: row.try_get("reference_price")?,
        reserved_amount: row.try_get("reserved_amount")?,
        reserved_cost: row.try_get("reserved_cost")?,
        status: status.parse::<OrderStatus>().map_err(decode_error)?,
        executed_price: row.try_get("executed_price")?,
        executed_total: row.try_get("executed_total")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use crate::ledger::Ledger;
    use common::models::StopStage;

    async fn seeded() -> (SqlitePool, i64) {
        let pool = memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let user = Ledger::open_account(&mut conn, "bob", 1000.0, None)
            .await
            .unwrap();
        drop(conn);
        (pool, user)
    }

    fn stop_limit(user_id: i64) -> OrderInsert {
        OrderInsert {
            user_id,
            symbol: "ETHUSDT".into(),
            side: OrderSide::Sell,
            kind: OrderKind::StopLimit {
                stop_price: 100.0,
                limit_price: 95.0,
                stage: StopStage::Unarmed,
            },
            quantity: 1.0,
            reference_price: 110.0,
            reserved_amount: 1.0,
            reserved_cost: 80.0,
            status: OrderStatus::Pending,
            executed_price: None,
            executed_total: None,
        }
    }

    #[tokio::test]
    async fn insert_round_trips_tagged_kind() {
        let (pool, user) = seeded().await;
        let mut conn = pool.acquire().await.unwrap();
        let order = OrdersRepository::insert(&mut conn, &stop_limit(user))
            .await
            .unwrap();
        drop(conn);

        let pending = OrdersRepository::fetch_pending(&pool).await.unwrap();
        assert_eq!(pending, vec![order]);
    }

    #[tokio::test]
    async fn arming_happens_once() {
        let (pool, user) = seeded().await;
        let mut conn = pool.acquire().await.unwrap();
        let order = OrdersRepository::insert(&mut conn, &stop_limit(user))
            .await
            .unwrap();
        drop(conn);

        assert!(OrdersRepository::arm_stop(&pool, order.id).await.unwrap());
        assert!(!OrdersRepository::arm_stop(&pool, order.id).await.unwrap());

        let pending = OrdersRepository::fetch_pending(&pool).await.unwrap();
        assert_eq!(
            pending[0].kind,
            OrderKind::StopLimit {
                stop_price: 100.0,
                limit_price: 95.0,
                stage: StopStage::Armed,
            }
        );
    }

    #[tokio::test]
    async fn completion_and_cancellation_are_mutually_exclusive() {
        let (pool, user) = seeded().await;
        let mut conn = pool.acquire().await.unwrap();
        let order = OrdersRepository::insert(&mut conn, &stop_limit(user))
            .await
            .unwrap();

        assert!(OrdersRepository::mark_cancelled(&mut conn, order.id, user).await.unwrap());
        assert!(!OrdersRepository::mark_completed(&mut conn, order.id, 95.0, 95.0).await.unwrap());
        assert!(!OrdersRepository::mark_cancelled(&mut conn, order.id, user).await.unwrap());
        drop(conn);

        assert!(OrdersRepository::fetch_pending(&pool).await.unwrap().is_empty());
        let all = OrdersRepository::list_for_user(&pool, user, Some(OrderStatus::Cancelled))
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn cancellation_is_scoped_to_owner() {
        let (pool, user) = seeded().await;
        let mut conn = pool.acquire().await.unwrap();
        let order = OrdersRepository::insert(&mut conn, &stop_limit(user))
            .await
            .unwrap();

        assert!(!OrdersRepository::mark_cancelled(&mut conn, order.id, user + 1).await.unwrap());
        let still = OrdersRepository::find(&mut conn, order.id).await.unwrap().unwrap();
        assert_eq!(still.status, OrderStatus::Pending);
    }
}
