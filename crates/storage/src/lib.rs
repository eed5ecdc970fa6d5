pub mod db;
pub mod error;
pub mod ledger;
pub mod repositories;

pub use error::LedgerError;
pub use ledger::{FillReceipt, Ledger, Reservation};
pub use sqlx::{SqliteConnection, SqlitePool};
