use std::collections::HashSet;

use common::models::{AlertCondition, AlertRequest, PriceAlert};
use storage::SqlitePool;
use storage::repositories::AlertsRepository;
use tracing::info;

use crate::error::AlertError;

/// Kline intervals the historical closes endpoint accepts.
pub const CHART_INTERVALS: &[&str] = &[
    "1s", "1m", "3m", "5m", "15m", "30m", "1h", "2h", "4h", "6h", "8h", "12h", "1d", "3d", "1w",
    "1M",
];

pub struct AlertService {
    pool: SqlitePool,
    symbols: HashSet<String>,
}

impl AlertService {
    pub fn new(pool: SqlitePool, symbols: &[String]) -> Self {
        Self {
            pool,
            symbols: symbols.iter().map(|s| s.to_uppercase()).collect(),
        }
    }

    pub async fn create_alert(&self, mut request: AlertRequest) -> Result<PriceAlert, AlertError> {
        request.symbol = request.symbol.trim().to_uppercase();
        if !self.symbols.contains(&request.symbol) {
            return Err(AlertError::UnknownSymbol(request.symbol));
        }

        match &mut request.condition {
            AlertCondition::Price { target_price, .. } => {
                if !target_price.is_finite() || *target_price <= 0.0 {
                    return Err(AlertError::InvalidTarget(*target_price));
                }
            }
            AlertCondition::Indicator { chart_interval, .. } => {
                let trimmed = chart_interval.trim();
                if !CHART_INTERVALS.contains(&trimmed) {
                    return Err(AlertError::InvalidInterval(chart_interval.clone()));
                }
                *chart_interval = trimmed.to_string();
            }
        }

        let alert = AlertsRepository::insert(&self.pool, &request).await?;
        info!(
            "Alert {} created for user {} on {}",
            alert.id, alert.user_id, alert.symbol
        );
        Ok(alert)
    }

    pub async fn delete_alert(&self, user_id: i64, alert_id: i64) -> Result<(), AlertError> {
        if AlertsRepository::delete(&self.pool, alert_id, user_id).await? {
            Ok(())
        } else {
            Err(AlertError::NotFound(alert_id))
        }
    }

    pub async fn list_alerts(&self, user_id: i64) -> Result<Vec<PriceAlert>, AlertError> {
        Ok(AlertsRepository::list_for_user(&self.pool, user_id).await?)
    }
}
