pub mod actors;
pub mod config;
pub mod logger;
pub mod models;

/// Unix millis, the timestamp unit used across models and tables.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
