pub mod accounts_repo;
pub mod alerts_repo;
pub mod orders_repo;
pub mod trades_repo;

pub use accounts_repo::AccountsRepository;
pub use alerts_repo::AlertsRepository;
pub use orders_repo::OrdersRepository;
pub use trades_repo::TradesRepository;
