use common::models::{
    AlertCondition, AlertRequest, AlertState, AlertType, BandCondition, Indicator, PriceAlert,
    PriceDirection,
};
use common::now_millis;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::error::decode_error;

const ALERT_COLUMNS: &str = r#"
    id, user_id, symbol, alert_type, direction, target_price, indicator, indicator_condition,
    chart_interval, is_active, triggered, notify_telegram, triggered_price, triggered_at, created_at
"#;

pub struct AlertsRepository;

impl AlertsRepository {
    pub async fn insert(pool: &SqlitePool, alert: &AlertRequest) -> Result<PriceAlert, sqlx::Error> {
        let (direction, target_price, indicator, indicator_condition, chart_interval) =
            match &alert.condition {
                AlertCondition::Price {
                    direction,
                    target_price,
                } => (Some(direction.as_str()), Some(*target_price), None, None, None),
                AlertCondition::Indicator {
                    indicator,
                    indicator_condition,
                    chart_interval,
                } => (
                    None,
                    None,
                    Some(indicator.as_str()),
                    Some(indicator_condition.as_str()),
                    Some(chart_interval.as_str()),
                ),
            };

        let sql = format!(
            r#"
                INSERT INTO alerts (
                    user_id, symbol, alert_type, direction, target_price, indicator,
                    indicator_condition, chart_interval, is_active, triggered, notify_telegram,
                    created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1, 0, ?, ?)
                RETURNING {ALERT_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(alert.user_id)
            .bind(&alert.symbol)
            .bind(alert.condition.alert_type().as_str())
            .bind(direction)
            .bind(target_price)
            .bind(indicator)
            .bind(indicator_condition)
            .bind(chart_interval)
            .bind(alert.notify_telegram)
            .bind(now_millis())
            .fetch_one(pool)
            .await?;

        alert_from_row(&row)
    }

    /// Scan query of both scanners: active, untriggered alerts of one type.
    pub async fn fetch_active(
        pool: &SqlitePool,
        alert_type: AlertType,
    ) -> Result<Vec<PriceAlert>, sqlx::Error> {
        let sql = format!(
            "SELECT {ALERT_COLUMNS} FROM alerts WHERE is_active = 1 AND triggered = 0 AND alert_type = ? ORDER BY id"
        );
        let rows = sqlx::query(&sql)
            .bind(alert_type.as_str())
            .fetch_all(pool)
            .await?;
        rows.iter().map(alert_from_row).collect()
    }

    pub async fn find(pool: &SqlitePool, alert_id: i64) -> Result<Option<PriceAlert>, sqlx::Error> {
        let sql = format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE id = ?");
        let row = sqlx::query(&sql).bind(alert_id).fetch_optional(pool).await?;
        row.as_ref().map(alert_from_row).transpose()
    }

    pub async fn list_for_user(
        pool: &SqlitePool,
        user_id: i64,
    ) -> Result<Vec<PriceAlert>, sqlx::Error> {
        let sql = format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE user_id = ? ORDER BY id DESC");
        let rows = sqlx::query(&sql).bind(user_id).fetch_all(pool).await?;
        rows.iter().map(alert_from_row).collect()
    }

    /// One-way `active` to `triggered`. Only the first caller gets `true`.
    pub async fn mark_triggered(
        pool: &SqlitePool,
        alert_id: i64,
        price: f64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
                UPDATE alerts
                SET is_active = 0, triggered = 1, triggered_price = ?, triggered_at = ?
                WHERE id = ? AND is_active = 1 AND triggered = 0
            "#,
        )
        .bind(price)
        .bind(now_millis())
        .bind(alert_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn delete(pool: &SqlitePool, alert_id: i64, user_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM alerts WHERE id = ? AND user_id = ?")
            .bind(alert_id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

fn alert_from_row(row: &SqliteRow) -> Result<PriceAlert, sqlx::Error> {
    let alert_type: String = row.try_get("alert_type")?;
    let alert_type = alert_type.parse::<AlertType>().map_err(decode_error)?;

    let condition = match alert_type {
        AlertType::Price => {
            let direction: Option<String> = row.try_get("direction")?;
            let target_price: Option<f64> = row.try_get("target_price")?;
            AlertCondition::Price {
                direction: direction
                    .unwrap_or_default()
                    .parse::<PriceDirection>()
                    .map_err(decode_error)?,
                target_price: target_price.ok_or_else(|| {
                    sqlx::Error::ColumnDecode {
                        index: "target_price".into(),
                        source: "missing target price on price alert".into(),
                    }
                })?,
            }
        }
        AlertType::Indicator => {
            let indicator: Option<String> = row.try_get("indicator")?;
            let condition: Option<String> = row.try_get("indicator_condition")?;
            let interval: Option<String> = row.try_get("chart_interval")?;
            AlertCondition::Indicator {
                indicator: indicator
                    .unwrap_or_default()
                    .parse::<Indicator>()
                    .map_err(decode_error)?,
                indicator_condition: condition
                    .unwrap_or_default()
                    .parse::<BandCondition>()
                    .map_err(decode_error)?,
                chart_interval: interval.unwrap_or_else(|| "1h".to_string()),
            }
        }
    };

    let is_active: bool = row.try_get("is_active")?;
    let triggered: bool = row.try_get("triggered")?;
    let state = if triggered || !is_active {
        AlertState::Triggered
    } else {
        AlertState::Active
    };

    Ok(PriceAlert {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        symbol: row.try_get("symbol")?,
        condition,
        state,
        notify_telegram: row.try_get("notify_telegram")?,
        triggered_price: row.try_get("triggered_price")?,
        triggered_at: row.try_get("triggered_at")?,
        created_at: row.try_get("created_at")?,
    })
}
