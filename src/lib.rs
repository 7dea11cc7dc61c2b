//! Ledger core of a multi-role marketplace: balance mutations, the order
//! lifecycle that drives them, seller withdrawals and the pure calculators
//! behind delivery charges, commissions and payout fees.

pub mod amount;
pub mod calc;
pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod services;

pub use amount::Amount;
pub use config::MarketConfig;
pub use error::{AppError, AppResult};
