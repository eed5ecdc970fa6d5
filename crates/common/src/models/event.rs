use serde::Serialize;

use crate::models::{AlertTriggered, PriceSnapshot};

/// Envelopes pushed to downstream subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Status { connected: bool },
    Tickers { data: Vec<PriceSnapshot> },
    AlertTriggered { data: AlertTriggered },
}

impl StreamEvent {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Text to deliver to one address through the notifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub address: String,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_envelope_shape() {
        let value: serde_json::Value =
            serde_json::from_str(&StreamEvent::Status { connected: false }.to_json().unwrap())
                .unwrap();
        assert_eq!(value, json!({"type": "status", "connected": false}));
    }

    #[test]
    fn tickers_envelope_wraps_data() {
        let value: serde_json::Value =
            serde_json::from_str(&StreamEvent::Tickers { data: vec![] }.to_json().unwrap())
                .unwrap();
        assert_eq!(value, json!({"type": "tickers", "data": []}));
    }
}
