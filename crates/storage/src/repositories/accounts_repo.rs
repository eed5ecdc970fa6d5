use std::collections::BTreeMap;

use common::models::{Holding, LedgerAccount};
use sqlx::SqlitePool;

/// Holdings at or below this are closed positions kept only for cost basis.
const DUST: f64 = 1e-12;

pub struct AccountsRepository;

impl AccountsRepository {
    pub async fn account(
        pool: &SqlitePool,
        user_id: i64,
    ) -> Result<Option<LedgerAccount>, sqlx::Error> {
        let user = sqlx::query_as::<_, (String, f64, Option<String>)>(
            "SELECT username, cash_balance, telegram_chat_id FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        let Some((username, cash_balance, telegram_chat_id)) = user else {
            return Ok(None);
        };

        let rows = sqlx::query_as::<_, (String, f64, f64)>(
            "SELECT symbol, quantity, avg_cost FROM holdings WHERE user_id = ? AND quantity > ? ORDER BY symbol",
        )
        .bind(user_id)
        .bind(DUST)
        .fetch_all(pool)
        .await?;

        let holdings: BTreeMap<String, Holding> = rows
            .into_iter()
            .map(|(symbol, quantity, avg_cost_basis)| {
                (
                    symbol,
                    Holding {
                        quantity,
                        avg_cost_basis,
                    },
                )
            })
            .collect();

        Ok(Some(LedgerAccount {
            user_id,
            username,
            cash_balance,
            telegram_chat_id,
            holdings,
        }))
    }

    pub async fn find_by_username(
        pool: &SqlitePool,
        username: &str,
    ) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(pool)
            .await
    }

    pub async fn telegram_chat_id(
        pool: &SqlitePool,
        user_id: i64,
    ) -> Result<Option<String>, sqlx::Error> {
        let chat = sqlx::query_scalar::<_, Option<String>>(
            "SELECT telegram_chat_id FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
        Ok(chat.flatten().filter(|c| !c.trim().is_empty()))
    }

    pub async fn set_telegram_chat_id(
        pool: &SqlitePool,
        user_id: i64,
        chat_id: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET telegram_chat_id = ? WHERE id = ?")
            .bind(chat_id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use crate::ledger::Ledger;
    use common::models::OrderSide;

    #[tokio::test]
    async fn account_hides_closed_positions() {
        let pool = memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let user = Ledger::open_account(&mut conn, "dave", 100.0, None).await.unwrap();

        let r = Ledger::reserve(&mut conn, user, "ADAUSDT", OrderSide::Buy, 10.0, 1.0)
            .await
            .unwrap();
        Ledger::apply_fill(&mut conn, r, 1.0).await.unwrap();
        let r = Ledger::reserve(&mut conn, user, "XRPUSDT", OrderSide::Buy, 5.0, 2.0)
            .await
            .unwrap();
        Ledger::apply_fill(&mut conn, r, 2.0).await.unwrap();
        let r = Ledger::reserve(&mut conn, user, "XRPUSDT", OrderSide::Sell, 5.0, 2.0)
            .await
            .unwrap();
        Ledger::apply_fill(&mut conn, r, 2.0).await.unwrap();
        drop(conn);

        let account = AccountsRepository::account(&pool, user).await.unwrap().unwrap();
        assert_eq!(account.cash_balance, 90.0);
        assert_eq!(account.holdings.len(), 1);
        assert_eq!(account.holding("ADAUSDT").unwrap().quantity, 10.0);
        assert!(account.holding("XRPUSDT").is_none());
    }

    #[tokio::test]
    async fn chat_id_lookup() {
        let pool = memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let user = Ledger::open_account(&mut conn, "erin", 0.0, None).await.unwrap();
        drop(conn);

        assert_eq!(AccountsRepository::telegram_chat_id(&pool, user).await.unwrap(), None);
        AccountsRepository::set_telegram_chat_id(&pool, user, Some("123"))
            .await
            .unwrap();
        assert_eq!(
            AccountsRepository::telegram_chat_id(&pool, user).await.unwrap(),
            Some("123".to_string())
        );
        assert_eq!(
            AccountsRepository::find_by_username(&pool, "erin").await.unwrap(),
            Some(user)
        );
    }
}
