pub mod alerts;
pub mod error;
pub mod notify;
pub mod services;
pub mod trigger;

pub use error::{AlertError, OrderError};
pub use notify::Notifier;
pub use trigger::{TriggerAction, evaluate};
