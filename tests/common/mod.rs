#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use marketplace_ledger::calc::OrderLine;
use marketplace_ledger::db::{MemoryStore, Role, Store, User};
use marketplace_ledger::services::{
    Actor, ExternalPayment, NewOrder, Notifier, NotifyError, OrderService, PaymentService, SellerPayment,
    WithdrawService,
};
use marketplace_ledger::{Amount, MarketConfig};

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, phone_no: &str, message: &str) -> Result<String, NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((phone_no.to_string(), message.to_string()));
        Ok("queued".to_string())
    }
}

pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send(&self, _phone_no: &str, _message: &str) -> Result<String, NotifyError> {
        Err(NotifyError::Rejected("gateway down".to_string()))
    }
}

/// Never answers; stands in for a gateway that accepts the connection and hangs.
pub struct StalledNotifier;

#[async_trait]
impl Notifier for StalledNotifier {
    async fn send(&self, _phone_no: &str, _message: &str) -> Result<String, NotifyError> {
        std::future::pending().await
    }
}

pub struct Harness {
    pub store: MemoryStore,
    /// Confirms external payments.
    pub admin: Actor,
    pub notifier: Arc<RecordingNotifier>,
    pub config: Arc<MarketConfig>,
    pub orders: OrderService,
    pub payments: PaymentService,
    pub withdraws: WithdrawService,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(MarketConfig {
            admin_phone_no: Some("01700000000".to_string()),
            ..MarketConfig::default()
        })
    }

    pub fn with_config(config: MarketConfig) -> Self {
        let store = MemoryStore::new();
        let notifier = Arc::new(RecordingNotifier::default());
        Self::assemble(store, notifier.clone(), notifier, config)
    }

    /// Same wiring, but every notification fails.
    pub fn with_failing_notifier() -> Self {
        let recorder = Arc::new(RecordingNotifier::default());
        let config = MarketConfig {
            admin_phone_no: Some("01700000000".to_string()),
            ..MarketConfig::default()
        };
        Self::assemble(MemoryStore::new(), recorder, Arc::new(FailingNotifier), config)
    }

    pub fn with_stalled_notifier() -> Self {
        let config = MarketConfig {
            notification_timeout: std::time::Duration::from_millis(50),
            ..MarketConfig::default()
        };
        Self::assemble(
            MemoryStore::new(),
            Arc::new(RecordingNotifier::default()),
            Arc::new(StalledNotifier),
            config,
        )
    }

    fn assemble(
        store: MemoryStore,
        recorder: Arc<RecordingNotifier>,
        notifier: Arc<dyn Notifier>,
        config: MarketConfig,
    ) -> Self {
        let config = Arc::new(config);
        let shared: Arc<dyn Store> = Arc::new(store.clone());
        Self {
            orders: OrderService::new(shared.clone(), notifier.clone(), config.clone()),
            payments: PaymentService::new(shared.clone(), notifier.clone(), config.clone()),
            withdraws: WithdrawService::new(shared, notifier, config.clone()),
            store,
            admin: Actor {
                user_id: Uuid::new_v4(),
                role: Role::Admin,
            },
            notifier: recorder,
            config,
        }
    }

    pub async fn seller(&self, balance: i64) -> User {
        let user = User::new("Karim Traders", "01811111111", Role::Seller).with_balance(Amount::from(balance));
        self.store.insert_user(user.clone()).await;
        user
    }

    pub async fn verified_seller(&self, balance: i64) -> User {
        let user = User::new("Rahima Shop", "01822222222", Role::Seller)
            .with_balance(Amount::from(balance))
            .verified();
        self.store.insert_user(user.clone()).await;
        user
    }

    pub async fn balance(&self, user_id: Uuid) -> Amount {
        self.store.user(user_id).await.map(|u| u.balance).unwrap_or(Amount::ZERO)
    }
}

pub fn line(base: i64, selling: i64, quantity: i32) -> OrderLine {
    OrderLine {
        product_id: Uuid::new_v4(),
        product_name: "Cotton saree".to_string(),
        base_price: Amount::from(base),
        selling_price: Amount::from(selling),
        quantity,
        selected_options: None,
    }
}

pub fn new_order(lines: Vec<OrderLine>, payment: Option<SellerPayment>) -> NewOrder {
    NewOrder {
        customer_name: "Nadia Islam".to_string(),
        customer_phone_no: "01900000000".to_string(),
        customer_zilla: "Dhaka".to_string(),
        customer_upazilla: "Mirpur".to_string(),
        delivery_address: "House 4, Road 10".to_string(),
        comments: None,
        products: lines,
        payment,
    }
}

pub fn seller_payment(transaction_id: &str, amount: i64) -> SellerPayment {
    SellerPayment {
        transaction_id: transaction_id.to_string(),
        amount: Amount::from(amount),
        payment_phone_no: "01811111111".to_string(),
    }
}

pub fn external(transaction_id: &str, amount: i64) -> ExternalPayment {
    ExternalPayment {
        transaction_id: transaction_id.to_string(),
        amount: Amount::from(amount),
        payment_method: "bkash".to_string(),
        payment_phone_no: Some("01811111111".to_string()),
        remarks: None,
    }
}
