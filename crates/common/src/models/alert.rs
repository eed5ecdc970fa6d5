use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::ParseEnumError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Price,
    Indicator,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Indicator => "indicator",
        }
    }
}

impl FromStr for AlertType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "price" => Ok(Self::Price),
            "indicator" => Ok(Self::Indicator),
            _ => Err(ParseEnumError::new("alert type", s)),
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceDirection {
    Above,
    Below,
}

impl PriceDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Above => "above",
            Self::Below => "below",
        }
    }
}

impl FromStr for PriceDirection {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "above" => Ok(Self::Above),
            "below" => Ok(Self::Below),
            _ => Err(ParseEnumError::new("price direction", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    BollingerBands,
}

impl Indicator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BollingerBands => "bollinger_bands",
        }
    }
}

impl FromStr for Indicator {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bollinger_bands" | "bb" => Ok(Self::BollingerBands),
            _ => Err(ParseEnumError::new("indicator", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandCondition {
    BbUpper,
    BbLower,
}

impl BandCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BbUpper => "bb_upper",
            Self::BbLower => "bb_lower",
        }
    }
}

impl FromStr for BandCondition {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bb_upper" => Ok(Self::BbUpper),
            "bb_lower" => Ok(Self::BbLower),
            _ => Err(ParseEnumError::new("indicator condition", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "alertType", rename_all = "snake_case")]
pub enum AlertCondition {
    #[serde(rename_all = "camelCase")]
    Price {
        direction: PriceDirection,
        target_price: f64,
    },
    #[serde(rename_all = "camelCase")]
    Indicator {
        indicator: Indicator,
        indicator_condition: BandCondition,
        chart_interval: String,
    },
}

impl AlertCondition {
    pub fn alert_type(&self) -> AlertType {
        match self {
            Self::Price { .. } => AlertType::Price,
            Self::Indicator { .. } => AlertType::Indicator,
        }
    }
}

/// `Active` means isActive=true and triggered=false; `Triggered` is the reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertState {
    Active,
    Triggered,
}

impl AlertState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn triggered(&self) -> bool {
        matches!(self, Self::Triggered)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceAlert {
    pub id: i64,
    pub user_id: i64,
    pub symbol: String,
    pub condition: AlertCondition,
    pub state: AlertState,
    pub notify_telegram: bool,
    pub triggered_price: Option<f64>,
    pub triggered_at: Option<i64>,
    pub created_at: i64,
}

impl PriceAlert {
    pub fn alert_type(&self) -> AlertType {
        self.condition.alert_type()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRequest {
    pub user_id: i64,
    pub symbol: String,
    pub condition: AlertCondition,
    pub notify_telegram: bool,
}

/// Payload of the `alert_triggered` stream event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertTriggered {
    pub alert_id: i64,
    pub user_id: i64,
    pub symbol: String,
    pub current_price: f64,
    pub alert_type: AlertType,
    pub message: String,
}
