//! Pure calculators: no store access, no logging side effects beyond warnings.

pub mod courier;
pub mod delivery;
pub mod summary;
pub mod withdraw_fee;

pub use courier::Courier;
pub use delivery::{calculate_amount_to_pay, settle_delivery_charge, DeliveryQuote, DeliverySettlement};
pub use summary::{calculate_products_summary, OrderLine, ProductsSummary};
pub use withdraw_fee::{calculate_withdrawal, WalletProvider, WithdrawalFee};
