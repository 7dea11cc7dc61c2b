//! Records and the persistence seam.
//!
//! Every read-then-write the core performs goes through a [`Unit`], an open
//! atomic unit of work. Dropping a unit without calling [`Unit::commit`]
//! rolls back everything written through it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppResult;
use crate::Amount;

pub mod memory;
pub mod order;
pub mod postgres;
pub mod tx;
pub mod user;
pub mod utils;
pub mod withdraw;

pub use memory::MemoryStore;
pub use order::{Order, OrderProduct, OrderStatus, OrderWithProducts};
pub use postgres::PgStore;
pub use tx::{Transaction, TransactionReason, TransactionType};
pub use user::{Role, User, Wallet};
pub use withdraw::{WithdrawPayment, WithdrawRequest, WithdrawStatus};

#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> AppResult<Box<dyn Unit>>;
}

#[async_trait]
pub trait Unit: Send {
    async fn find_user(&mut self, user_id: Uuid) -> AppResult<Option<User>>;

    /// Reads the user under an exclusive row lock held until the unit ends.
    async fn lock_user(&mut self, user_id: Uuid) -> AppResult<Option<User>>;

    /// Writes `balance` and bumps `version` only if the stored version still
    /// equals `expected_version`. `lock` can only set `is_locked`, never clear
    /// it. Returns the number of rows written.
    async fn update_balance(
        &mut self,
        user_id: Uuid,
        expected_version: i64,
        balance: Amount,
        lock: bool,
    ) -> AppResult<u64>;

    async fn set_verified(&mut self, user_id: Uuid) -> AppResult<()>;

    /// Holds an exclusive lock on an external payment reference until the
    /// unit ends, so the existence checks below cannot race across tables.
    async fn lock_reference(&mut self, reference: &str) -> AppResult<()>;
    async fn transaction_id_exists(&mut self, transaction_id: &str) -> AppResult<bool>;
    async fn insert_transaction(&mut self, transaction: &Transaction) -> AppResult<()>;
    async fn list_transactions(&mut self, user_id: Uuid) -> AppResult<Vec<Transaction>>;

    async fn insert_order(&mut self, order: &Order, products: &[OrderProduct]) -> AppResult<()>;
    async fn find_order(&mut self, order_id: Uuid) -> AppResult<Option<Order>>;
    async fn lock_order(&mut self, order_id: Uuid) -> AppResult<Option<Order>>;
    async fn order_products(&mut self, order_id: Uuid) -> AppResult<Vec<OrderProduct>>;
    async fn update_order(&mut self, order: &Order) -> AppResult<()>;
    async fn delete_order(&mut self, order_id: Uuid) -> AppResult<()>;
    async fn count_completed_orders(&mut self, seller_id: Uuid) -> AppResult<i64>;
    async fn order_transaction_id_exists(&mut self, transaction_id: &str) -> AppResult<bool>;

    async fn insert_wallet(&mut self, wallet: &Wallet) -> AppResult<()>;
    async fn list_wallets(&mut self, user_id: Uuid) -> AppResult<Vec<Wallet>>;

    async fn insert_withdraw(&mut self, request: &WithdrawRequest) -> AppResult<()>;
    async fn lock_withdraw(&mut self, withdraw_id: Uuid) -> AppResult<Option<WithdrawRequest>>;
    async fn update_withdraw(&mut self, request: &WithdrawRequest) -> AppResult<()>;
    async fn delete_withdraw(&mut self, withdraw_id: Uuid) -> AppResult<()>;
    async fn find_pending_withdraw(&mut self, user_id: Uuid) -> AppResult<Option<WithdrawRequest>>;
    async fn count_withdraws_since(&mut self, user_id: Uuid, since: DateTime<Utc>) -> AppResult<i64>;
    async fn list_withdraws(&mut self, user_id: Uuid) -> AppResult<Vec<WithdrawRequest>>;
    async fn insert_withdraw_payment(&mut self, payment: &WithdrawPayment) -> AppResult<()>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}
