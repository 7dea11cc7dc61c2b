//! In-memory store.
//!
//! A unit takes the store-wide mutex for its whole lifetime and works on a
//! copy of the state; commit swaps the copy in, drop throws it away. Units
//! are therefore fully serialised, which is stricter than row locking.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{
    Order, OrderProduct, OrderStatus, Store, Transaction, Unit, User, Wallet, WithdrawPayment,
    WithdrawRequest, WithdrawStatus,
};
use crate::error::{AppError, AppResult};
use crate::Amount;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    transactions: Vec<Transaction>,
    orders: HashMap<Uuid, Order>,
    order_products: HashMap<Uuid, Vec<OrderProduct>>,
    wallets: Vec<Wallet>,
    withdraws: HashMap<Uuid, WithdrawRequest>,
    withdraw_payments: Vec<WithdrawPayment>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user: User) {
        self.state.lock().await.users.insert(user.id, user);
    }

    pub async fn user(&self, user_id: Uuid) -> Option<User> {
        self.state.lock().await.users.get(&user_id).cloned()
    }

    pub async fn order(&self, order_id: Uuid) -> Option<Order> {
        self.state.lock().await.orders.get(&order_id).cloned()
    }

    pub async fn withdraw(&self, withdraw_id: Uuid) -> Option<WithdrawRequest> {
        self.state.lock().await.withdraws.get(&withdraw_id).cloned()
    }

    pub async fn transactions(&self) -> Vec<Transaction> {
        self.state.lock().await.transactions.clone()
    }

    pub async fn withdraw_payments(&self) -> Vec<WithdrawPayment> {
        self.state.lock().await.withdraw_payments.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn Unit>> {
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryUnit { guard, work }))
    }
}

struct MemoryUnit {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
}

#[async_trait]
impl Unit for MemoryUnit {
    async fn find_user(&mut self, user_id: Uuid) -> AppResult<Option<User>> {
        Ok(self.work.users.get(&user_id).cloned())
    }

    async fn lock_user(&mut self, user_id: Uuid) -> AppResult<Option<User>> {
        Ok(self.work.users.get(&user_id).cloned())
    }

    async fn update_balance(
        &mut self,
        user_id: Uuid,
        expected_version: i64,
        balance: Amount,
        lock: bool,
    ) -> AppResult<u64> {
        match self.work.users.get_mut(&user_id) {
            Some(user) if user.version == expected_version => {
                user.balance = balance;
                user.version += 1;
                user.is_locked |= lock;
                user.updated_at = Utc::now();
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn set_verified(&mut self, user_id: Uuid) -> AppResult<()> {
        if let Some(user) = self.work.users.get_mut(&user_id) {
            user.is_verified = true;
        }
        Ok(())
    }

    // units already run one at a time
    async fn lock_reference(&mut self, _reference: &str) -> AppResult<()> {
        Ok(())
    }

    async fn transaction_id_exists(&mut self, transaction_id: &str) -> AppResult<bool> {
        Ok(self
            .work
            .transactions
            .iter()
            .any(|tx| tx.transaction_id == transaction_id))
    }

    async fn insert_transaction(&mut self, transaction: &Transaction) -> AppResult<()> {
        // mirrors the unique constraint on transactions.transaction_id
        if self.transaction_id_exists(&transaction.transaction_id).await? {
            return Err(AppError::DuplicateTransaction(transaction.transaction_id.clone()));
        }
        self.work.transactions.push(transaction.clone());
        Ok(())
    }

    async fn list_transactions(&mut self, user_id: Uuid) -> AppResult<Vec<Transaction>> {
        let mut rows: Vec<Transaction> = self
            .work
            .transactions
            .iter()
            .filter(|tx| tx.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn insert_order(&mut self, order: &Order, products: &[OrderProduct]) -> AppResult<()> {
        // mirrors the unique constraint on orders.transaction_id
        if let Some(transaction_id) = &order.transaction_id {
            if self.order_transaction_id_exists(transaction_id).await? {
                return Err(AppError::DuplicateTransaction(transaction_id.clone()));
            }
        }
        self.work.orders.insert(order.id, order.clone());
        self.work.order_products.insert(order.id, products.to_vec());
        Ok(())
    }

    async fn find_order(&mut self, order_id: Uuid) -> AppResult<Option<Order>> {
        Ok(self.work.orders.get(&order_id).cloned())
    }

    async fn lock_order(&mut self, order_id: Uuid) -> AppResult<Option<Order>> {
        Ok(self.work.orders.get(&order_id).cloned())
    }

    async fn order_products(&mut self, order_id: Uuid) -> AppResult<Vec<OrderProduct>> {
        Ok(self
            .work
            .order_products
            .get(&order_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn update_order(&mut self, order: &Order) -> AppResult<()> {
        let mut updated = order.clone();
        updated.updated_at = Utc::now();
        self.work.orders.insert(order.id, updated);
        Ok(())
    }

    async fn delete_order(&mut self, order_id: Uuid) -> AppResult<()> {
        self.work.orders.remove(&order_id);
        self.work.order_products.remove(&order_id);
        Ok(())
    }

    async fn count_completed_orders(&mut self, seller_id: Uuid) -> AppResult<i64> {
        Ok(self
            .work
            .orders
            .values()
            .filter(|order| order.seller_id == seller_id && order.order_status == OrderStatus::Completed)
            .count() as i64)
    }

    async fn order_transaction_id_exists(&mut self, transaction_id: &str) -> AppResult<bool> {
        Ok(self
            .work
            .orders
            .values()
            .any(|order| order.transaction_id.as_deref() == Some(transaction_id)))
    }

    async fn insert_wallet(&mut self, wallet: &Wallet) -> AppResult<()> {
        self.work.wallets.push(wallet.clone());
        Ok(())
    }

    async fn list_wallets(&mut self, user_id: Uuid) -> AppResult<Vec<Wallet>> {
        Ok(self
            .work
            .wallets
            .iter()
            .filter(|wallet| wallet.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn insert_withdraw(&mut self, request: &WithdrawRequest) -> AppResult<()> {
        self.work.withdraws.insert(request.id, request.clone());
        Ok(())
    }

    async fn lock_withdraw(&mut self, withdraw_id: Uuid) -> AppResult<Option<WithdrawRequest>> {
        Ok(self.work.withdraws.get(&withdraw_id).cloned())
    }

    async fn update_withdraw(&mut self, request: &WithdrawRequest) -> AppResult<()> {
        self.work.withdraws.insert(request.id, request.clone());
        Ok(())
    }

    async fn delete_withdraw(&mut self, withdraw_id: Uuid) -> AppResult<()> {
        self.work.withdraws.remove(&withdraw_id);
        Ok(())
    }

    async fn find_pending_withdraw(&mut self, user_id: Uuid) -> AppResult<Option<WithdrawRequest>> {
        Ok(self
            .work
            .withdraws
            .values()
            .find(|request| request.user_id == user_id && request.status == WithdrawStatus::Pending)
            .cloned())
    }

    async fn count_withdraws_since(&mut self, user_id: Uuid, since: DateTime<Utc>) -> AppResult<i64> {
        Ok(self
            .work
            .withdraws
            .values()
            .filter(|request| request.user_id == user_id && request.requested_at >= since)
            .count() as i64)
    }

    async fn list_withdraws(&mut self, user_id: Uuid) -> AppResult<Vec<WithdrawRequest>> {
        let mut requests: Vec<WithdrawRequest> = self
            .work
            .withdraws
            .values()
            .filter(|request| request.user_id == user_id)
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(requests)
    }

    async fn insert_withdraw_payment(&mut self, payment: &WithdrawPayment) -> AppResult<()> {
        if self
            .work
            .withdraw_payments
            .iter()
            .any(|existing| existing.transaction_id == payment.transaction_id)
        {
            return Err(AppError::DuplicateTransaction(payment.transaction_id.clone()));
        }
        self.work.withdraw_payments.push(payment.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryUnit { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }
}
