pub mod alert_publisher;
pub mod alert_service;
pub mod indicator_alert_service;
pub mod notification_service;
pub mod order_service;
pub mod order_trigger_service;
pub mod price_alert_service;

pub use alert_publisher::AlertPublisher;
pub use alert_service::AlertService;
pub use indicator_alert_service::IndicatorAlertService;
pub use notification_service::NotificationService;
pub use order_service::OrderService;
pub use order_trigger_service::{OrderTriggerService, TickReport};
pub use price_alert_service::PriceAlertService;
