mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use common::{external, Harness};
use marketplace_ledger::db::{
    Order, OrderProduct, Role, Store, Transaction, TransactionReason, TransactionType, Unit, User,
    Wallet, WithdrawPayment, WithdrawRequest,
};
use marketplace_ledger::services::ledger::{self, BalanceChange};
use marketplace_ledger::services::{Actor, LogNotifier, PaymentService};
use marketplace_ledger::{AppError, AppResult, Amount};

#[tokio::test]
async fn concurrent_deposits_lose_no_update() {
    let harness = Harness::new();
    let seller = harness.seller(0).await;
    let store: Arc<dyn Store> = Arc::new(harness.store.clone());
    let payments = Arc::new(PaymentService::new(store, Arc::new(LogNotifier), harness.config.clone()));

    let admin = harness.admin;
    let mut handles = Vec::new();
    for i in 0..25 {
        let payments = payments.clone();
        let user_id = seller.id;
        handles.push(tokio::spawn(async move {
            payments.deposit(admin, user_id, external(&format!("BK-{i}"), 10)).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let user = harness.store.user(seller.id).await.unwrap();
    assert_eq!(user.balance, Amount::from(250));
    assert_eq!(user.version, 25);
    assert_eq!(harness.store.transactions().await.len(), 25);
}

#[tokio::test]
async fn concurrent_credits_and_debits_settle_exactly() {
    let harness = Harness::new();
    let seller = harness.seller(1000).await;
    let store: Arc<dyn Store> = Arc::new(harness.store.clone());

    let mut handles = Vec::new();
    for i in 0..20 {
        let store = store.clone();
        let user_id = seller.id;
        handles.push(tokio::spawn(async move {
            let mut unit = store.begin().await?;
            let receipt = if i % 2 == 0 {
                let change = BalanceChange::new(user_id, Amount::from(10), TransactionReason::Commission);
                ledger::credit(unit.as_mut(), change).await?
            } else {
                let change = BalanceChange::new(user_id, Amount::from(5), TransactionReason::DeliveryCharge);
                ledger::debit(unit.as_mut(), change).await?
            };
            unit.commit().await?;
            Ok::<_, AppError>(receipt)
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let user = harness.store.user(seller.id).await.unwrap();
    assert_eq!(user.balance, Amount::from(1050));
    assert_eq!(user.version, 20);
    let debits = harness
        .store
        .transactions()
        .await
        .into_iter()
        .filter(|tx| tx.transaction_type == TransactionType::Debit)
        .count();
    assert_eq!(debits, 10);
}

#[tokio::test]
async fn replayed_deposit_is_rejected_without_side_effects() {
    let harness = Harness::new();
    let seller = harness.seller(100).await;

    let receipt = harness.payments.deposit(harness.admin, seller.id, external("BK-77", 500)).await.unwrap();
    assert_eq!(receipt.balance, Amount::from(600));
    assert_eq!(receipt.transaction.transaction_type, TransactionType::Credit);
    assert_eq!(receipt.transaction.user_name, seller.name);

    let err = harness.payments.deposit(harness.admin, seller.id, external("BK-77", 500)).await.unwrap_err();
    assert!(matches!(err, AppError::DuplicateTransaction(id) if id == "BK-77"));

    let user = harness.store.user(seller.id).await.unwrap();
    assert_eq!(user.balance, Amount::from(600));
    assert_eq!(user.version, 1);
    assert_eq!(harness.store.transactions().await.len(), 1);
}

#[tokio::test]
async fn replayed_id_is_rejected_across_users() {
    let harness = Harness::new();
    let first = harness.seller(0).await;
    let second = harness.verified_seller(0).await;

    harness.payments.deposit(harness.admin, first.id, external("NG-1", 50)).await.unwrap();
    let err = harness.payments.deposit(harness.admin, second.id, external("NG-1", 50)).await.unwrap_err();
    assert!(matches!(err, AppError::DuplicateTransaction(_)));
    assert_eq!(harness.balance(second.id).await, Amount::ZERO);
}

#[tokio::test]
async fn debit_never_goes_negative() {
    let harness = Harness::new();
    let seller = harness.seller(40).await;

    {
        let mut unit = harness.store.begin().await.unwrap();
        let change = BalanceChange::new(seller.id, Amount::from(60), TransactionReason::DeliveryCharge);
        let err = ledger::debit(unit.as_mut(), change).await.unwrap_err();
        match err {
            AppError::InsufficientFunds { balance, requested, .. } => {
                assert_eq!(balance, Amount::from(40));
                assert_eq!(requested, Amount::from(60));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    let user = harness.store.user(seller.id).await.unwrap();
    assert_eq!(user.balance, Amount::from(40));
    assert_eq!(user.version, 0);
    assert!(harness.store.transactions().await.is_empty());
}

#[tokio::test]
async fn debit_to_exactly_zero_is_allowed() {
    let harness = Harness::new();
    let seller = harness.seller(60).await;

    let mut unit = harness.store.begin().await.unwrap();
    let change = BalanceChange::new(seller.id, Amount::from(60), TransactionReason::DeliveryCharge);
    let receipt = ledger::debit(unit.as_mut(), change).await.unwrap();
    unit.commit().await.unwrap();

    assert_eq!(receipt.balance, Amount::ZERO);
    assert_eq!(receipt.version, 1);
    assert_eq!(harness.balance(seller.id).await, Amount::ZERO);
}

#[tokio::test]
async fn uncommitted_mutation_leaves_no_trace() {
    let harness = Harness::new();
    let seller = harness.seller(10).await;

    {
        let mut unit = harness.store.begin().await.unwrap();
        let change = BalanceChange::new(seller.id, Amount::from(90), TransactionReason::Refund);
        ledger::credit(unit.as_mut(), change).await.unwrap();
    }

    assert_eq!(harness.balance(seller.id).await, Amount::from(10));
    assert!(harness.store.transactions().await.is_empty());
}

#[tokio::test]
async fn invalid_changes_are_rejected() {
    let harness = Harness::new();
    let seller = harness.seller(10).await;
    let mut unit = harness.store.begin().await.unwrap();

    let negative = BalanceChange::new(seller.id, Amount::from(-5), TransactionReason::Refund);
    assert!(matches!(ledger::credit(unit.as_mut(), negative).await, Err(AppError::Validation(_))));

    let unreferenced = BalanceChange::new(seller.id, Amount::from(5), TransactionReason::Deposit);
    assert!(matches!(ledger::credit(unit.as_mut(), unreferenced).await, Err(AppError::Validation(_))));

    let blank = BalanceChange::new(seller.id, Amount::from(5), TransactionReason::Deposit).with_transaction_id("  ");
    assert!(matches!(ledger::credit(unit.as_mut(), blank).await, Err(AppError::Validation(_))));

    let missing = BalanceChange::new(Uuid::new_v4(), Amount::from(5), TransactionReason::Refund);
    assert!(matches!(ledger::credit(unit.as_mut(), missing).await, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn amounts_are_rounded_to_two_places() {
    let harness = Harness::new();
    let seller = harness.seller(0).await;

    let mut payment = external("RK-3", 0);
    payment.amount = Amount::new(100_005, 3);
    let receipt = harness.payments.deposit(harness.admin, seller.id, payment).await.unwrap();

    assert_eq!(receipt.transaction.amount, Amount::new(10_001, 2));
    assert_eq!(receipt.balance, Amount::new(10_001, 2));
}

#[tokio::test]
async fn due_payment_keeps_seller_locked_until_cleared() {
    let harness = Harness::new();
    let seller = harness.seller(-100).await;

    let partial = harness.payments.pay_due(harness.admin, seller.id, external("DUE-1", 40)).await.unwrap();
    assert_eq!(partial.balance, Amount::from(-60));
    assert_eq!(partial.transaction.reason, TransactionReason::DuePayment);
    assert!(harness.store.user(seller.id).await.unwrap().is_locked);

    let cleared = harness.payments.pay_due(harness.admin, seller.id, external("DUE-2", 60)).await.unwrap();
    assert_eq!(cleared.balance, Amount::ZERO);

    let err = harness.payments.pay_due(harness.admin, seller.id, external("DUE-3", 10)).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn notification_failure_does_not_undo_the_deposit() {
    let harness = Harness::with_failing_notifier();
    let seller = harness.seller(0).await;

    let receipt = harness.payments.deposit(harness.admin, seller.id, external("BK-9", 300)).await.unwrap();
    assert_eq!(receipt.balance, Amount::from(300));
    assert_eq!(harness.balance(seller.id).await, Amount::from(300));
}

#[tokio::test]
async fn deposit_notifies_the_user_after_commit() {
    let harness = Harness::new();
    let seller = harness.seller(0).await;

    harness.payments.deposit(harness.admin, seller.id, external("BK-10", 120)).await.unwrap();

    let sent = harness.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, seller.phone_no);
    assert!(sent[0].1.contains("120"));
}

#[tokio::test]
async fn transactions_are_listed_newest_first() {
    let harness = Harness::new();
    let seller = harness.seller(0).await;

    harness.payments.deposit(harness.admin, seller.id, external("A-1", 10)).await.unwrap();
    harness.payments.deposit(harness.admin, seller.id, external("A-2", 20)).await.unwrap();

    let listed = harness.payments.transactions(seller.id).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed[0].created_at >= listed[1].created_at);
    assert_eq!(harness.payments.balance(seller.id).await.unwrap(), Amount::from(30));
}

#[tokio::test]
async fn sellers_cannot_confirm_their_own_payments() {
    let harness = Harness::new();
    let seller = harness.seller(-50).await;
    let self_service = Actor {
        user_id: seller.id,
        role: Role::Seller,
    };

    let err = harness
        .payments
        .deposit(self_service, seller.id, external("BK-SELF", 5000))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = harness
        .payments
        .pay_due(self_service, seller.id, external("BK-SELF", 50))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    assert_eq!(harness.balance(seller.id).await, Amount::from(-50));
    assert!(harness.store.transactions().await.is_empty());
}

#[tokio::test]
async fn sub_cent_deposit_is_rejected_and_keeps_its_reference() {
    let harness = Harness::new();
    let seller = harness.seller(0).await;

    let mut dust = external("BK-DUST", 0);
    dust.amount = Amount::new(4, 3);
    let err = harness.payments.deposit(harness.admin, seller.id, dust).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert!(harness.store.transactions().await.is_empty());

    // the ledger refuses it too when called directly
    {
        let mut unit = harness.store.begin().await.unwrap();
        let change = BalanceChange::new(seller.id, Amount::new(4, 3), TransactionReason::Deposit)
            .with_transaction_id("BK-DUST");
        let err = ledger::credit(unit.as_mut(), change).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    let receipt = harness
        .payments
        .deposit(harness.admin, seller.id, external("BK-DUST", 10))
        .await
        .unwrap();
    assert_eq!(receipt.balance, Amount::from(10));
}

#[tokio::test]
async fn stalled_notifier_does_not_hold_up_a_committed_deposit() {
    let harness = Harness::with_stalled_notifier();
    let seller = harness.seller(0).await;

    let outcome = tokio::time::timeout(
        Duration::from_secs(2),
        harness.payments.deposit(harness.admin, seller.id, external("BK-SLOW", 10)),
    )
    .await
    .expect("deposit should return once the notification limit passes");

    assert_eq!(outcome.unwrap().balance, Amount::from(10));
    assert_eq!(harness.balance(seller.id).await, Amount::from(10));
}

#[tokio::test]
async fn overdraft_debit_stops_at_its_floor_and_locks() {
    let harness = Harness::new();
    let seller = harness.verified_seller(0).await;

    {
        let mut unit = harness.store.begin().await.unwrap();
        let change = BalanceChange::new(seller.id, Amount::from(250), TransactionReason::DeliveryCharge)
            .with_overdraft(Amount::from(200))
            .lock_if_negative();
        let err = ledger::debit(unit.as_mut(), change).await.unwrap_err();
        assert!(matches!(err, AppError::InsufficientFunds { .. }));
    }

    let mut unit = harness.store.begin().await.unwrap();
    let change = BalanceChange::new(seller.id, Amount::from(150), TransactionReason::DeliveryCharge)
        .with_overdraft(Amount::from(200))
        .lock_if_negative();
    let receipt = ledger::debit(unit.as_mut(), change).await.unwrap();
    unit.commit().await.unwrap();

    assert_eq!(receipt.balance, Amount::from(-150));
    let user = harness.store.user(seller.id).await.unwrap();
    assert_eq!(user.balance, Amount::from(-150));
    assert!(user.is_locked);
}

/// Delegates to a real unit but reports every version-gated write as a miss,
/// as if another writer bumped the version first.
struct LostRace {
    inner: Box<dyn Unit>,
}

#[async_trait]
impl Unit for LostRace {
    async fn find_user(&mut self, user_id: Uuid) -> AppResult<Option<User>> {
        self.inner.find_user(user_id).await
    }
    async fn lock_user(&mut self, user_id: Uuid) -> AppResult<Option<User>> {
        self.inner.lock_user(user_id).await
    }
    async fn update_balance(
        &mut self,
        _user_id: Uuid,
        _expected_version: i64,
        _balance: Amount,
        _lock: bool,
    ) -> AppResult<u64> {
        Ok(0)
    }
    async fn set_verified(&mut self, user_id: Uuid) -> AppResult<()> {
        self.inner.set_verified(user_id).await
    }
    async fn lock_reference(&mut self, reference: &str) -> AppResult<()> {
        self.inner.lock_reference(reference).await
    }
    async fn transaction_id_exists(&mut self, transaction_id: &str) -> AppResult<bool> {
        self.inner.transaction_id_exists(transaction_id).await
    }
    async fn insert_transaction(&mut self, transaction: &Transaction) -> AppResult<()> {
        self.inner.insert_transaction(transaction).await
    }
    async fn list_transactions(&mut self, user_id: Uuid) -> AppResult<Vec<Transaction>> {
        self.inner.list_transactions(user_id).await
    }
    async fn insert_order(&mut self, order: &Order, products: &[OrderProduct]) -> AppResult<()> {
        self.inner.insert_order(order, products).await
    }
    async fn find_order(&mut self, order_id: Uuid) -> AppResult<Option<Order>> {
        self.inner.find_order(order_id).await
    }
    async fn lock_order(&mut self, order_id: Uuid) -> AppResult<Option<Order>> {
        self.inner.lock_order(order_id).await
    }
    async fn order_products(&mut self, order_id: Uuid) -> AppResult<Vec<OrderProduct>> {
        self.inner.order_products(order_id).await
    }
    async fn update_order(&mut self, order: &Order) -> AppResult<()> {
        self.inner.update_order(order).await
    }
    async fn delete_order(&mut self, order_id: Uuid) -> AppResult<()> {
        self.inner.delete_order(order_id).await
    }
    async fn count_completed_orders(&mut self, seller_id: Uuid) -> AppResult<i64> {
        self.inner.count_completed_orders(seller_id).await
    }
    async fn order_transaction_id_exists(&mut self, transaction_id: &str) -> AppResult<bool> {
        self.inner.order_transaction_id_exists(transaction_id).await
    }
    async fn insert_wallet(&mut self, wallet: &Wallet) -> AppResult<()> {
        self.inner.insert_wallet(wallet).await
    }
    async fn list_wallets(&mut self, user_id: Uuid) -> AppResult<Vec<Wallet>> {
        self.inner.list_wallets(user_id).await
    }
    async fn insert_withdraw(&mut self, request: &WithdrawRequest) -> AppResult<()> {
        self.inner.insert_withdraw(request).await
    }
    async fn lock_withdraw(&mut self, withdraw_id: Uuid) -> AppResult<Option<WithdrawRequest>> {
        self.inner.lock_withdraw(withdraw_id).await
    }
    async fn update_withdraw(&mut self, request: &WithdrawRequest) -> AppResult<()> {
        self.inner.update_withdraw(request).await
    }
    async fn delete_withdraw(&mut self, withdraw_id: Uuid) -> AppResult<()> {
        self.inner.delete_withdraw(withdraw_id).await
    }
    async fn find_pending_withdraw(&mut self, user_id: Uuid) -> AppResult<Option<WithdrawRequest>> {
        self.inner.find_pending_withdraw(user_id).await
    }
    async fn count_withdraws_since(&mut self, user_id: Uuid, since: DateTime<Utc>) -> AppResult<i64> {
        self.inner.count_withdraws_since(user_id, since).await
    }
    async fn list_withdraws(&mut self, user_id: Uuid) -> AppResult<Vec<WithdrawRequest>> {
        self.inner.list_withdraws(user_id).await
    }
    async fn insert_withdraw_payment(&mut self, payment: &WithdrawPayment) -> AppResult<()> {
        self.inner.insert_withdraw_payment(payment).await
    }
    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.inner.commit().await
    }
}

#[tokio::test]
async fn lost_version_race_surfaces_conflict_and_writes_nothing() {
    let harness = Harness::new();
    let seller = harness.seller(100).await;

    {
        let mut unit = LostRace {
            inner: harness.store.begin().await.unwrap(),
        };
        let change = BalanceChange::new(seller.id, Amount::from(40), TransactionReason::Commission);
        let err = ledger::credit(&mut unit, change).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let change = BalanceChange::new(seller.id, Amount::from(40), TransactionReason::DeliveryCharge);
        let err = ledger::debit(&mut unit, change).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    let user = harness.store.user(seller.id).await.unwrap();
    assert_eq!(user.balance, Amount::from(100));
    assert_eq!(user.version, 0);
    assert!(harness.store.transactions().await.is_empty());
}
