use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ledger::{self, BalanceChange, LedgerReceipt};
use super::notify::{notify_best_effort, Notifier};
use super::{within, Actor};
use crate::config::MarketConfig;
use crate::db::{Store, Transaction, TransactionReason, User};
use crate::error::{AppError, AppResult};
use crate::Amount;

/// A payment confirmed by an outside provider, identified by its reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalPayment {
    pub transaction_id: String,
    pub amount: Amount,
    pub payment_method: String,
    pub payment_phone_no: Option<String>,
    pub remarks: Option<String>,
}

pub struct PaymentService {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    config: Arc<MarketConfig>,
}

impl PaymentService {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>, config: Arc<MarketConfig>) -> Self {
        Self { store, notifier, config }
    }

    /// Credits a payment an admin has matched against the provider's records.
    pub async fn deposit(
        &self,
        confirmed_by: Actor,
        user_id: Uuid,
        payment: ExternalPayment,
    ) -> AppResult<LedgerReceipt> {
        ensure_confirmer(&confirmed_by)?;
        if payment.amount.round2() <= Amount::ZERO {
            return Err(AppError::validation("deposit amount must be positive"));
        }

        let receipt = within(self.config.transaction_timeout, async {
            let mut unit = self.store.begin().await?;
            let receipt = ledger::credit(unit.as_mut(), external_change(user_id, payment, TransactionReason::Deposit)).await?;
            unit.commit().await?;
            Ok::<_, AppError>(receipt)
        })
        .await?;
        tracing::info!(user_id = %user_id, confirmed_by = %confirmed_by.user_id, "deposit confirmed");

        let message = format!(
            "{} has been added to your balance. New balance: {}",
            receipt.transaction.amount, receipt.balance
        );
        notify_best_effort(self.notifier.as_ref(), self.config.notification_timeout, &receipt.transaction.user_phone_no, &message).await;

        Ok(receipt)
    }

    /// Settles a delivery-charge deficit. Only meaningful while the balance
    /// is negative; a payment that leaves it negative keeps the user locked.
    pub async fn pay_due(
        &self,
        confirmed_by: Actor,
        user_id: Uuid,
        payment: ExternalPayment,
    ) -> AppResult<LedgerReceipt> {
        ensure_confirmer(&confirmed_by)?;
        if payment.amount.round2() <= Amount::ZERO {
            return Err(AppError::validation("due payment amount must be positive"));
        }

        let receipt = within(self.config.transaction_timeout, async {
            let mut unit = self.store.begin().await?;

            let user = unit
                .lock_user(user_id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("user {user_id}")))?;
            if !user.balance.is_negative() {
                return Err(AppError::conflict(format!("user {user_id} has no outstanding due")));
            }

            let change = external_change(user_id, payment, TransactionReason::DuePayment).lock_if_negative();
            let receipt = ledger::credit(unit.as_mut(), change).await?;
            unit.commit().await?;
            Ok::<_, AppError>(receipt)
        })
        .await?;
        tracing::info!(user_id = %user_id, confirmed_by = %confirmed_by.user_id, "due payment confirmed");

        let message = if receipt.balance.is_negative() {
            format!("Due payment received. Remaining due: {}", receipt.balance.abs())
        } else {
            format!("Due payment received. Your balance is now {}", receipt.balance)
        };
        notify_best_effort(self.notifier.as_ref(), self.config.notification_timeout, &receipt.transaction.user_phone_no, &message).await;

        Ok(receipt)
    }

    pub async fn user(&self, user_id: Uuid) -> AppResult<User> {
        let mut unit = self.store.begin().await?;
        unit.find_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("user {user_id}")))
    }

    pub async fn balance(&self, user_id: Uuid) -> AppResult<Amount> {
        Ok(self.user(user_id).await?.balance)
    }

    pub async fn transactions(&self, user_id: Uuid) -> AppResult<Vec<Transaction>> {
        let mut unit = self.store.begin().await?;
        unit.list_transactions(user_id).await
    }
}

fn ensure_confirmer(actor: &Actor) -> AppResult<()> {
    if !actor.is_admin() {
        return Err(AppError::forbidden(format!(
            "user {} cannot confirm external payments",
            actor.user_id
        )));
    }
    Ok(())
}

fn external_change(user_id: Uuid, payment: ExternalPayment, reason: TransactionReason) -> BalanceChange {
    let mut change = BalanceChange::new(user_id, payment.amount, reason)
        .with_transaction_id(payment.transaction_id)
        .with_payment(payment.payment_method, payment.payment_phone_no);
    if let Some(remarks) = payment.remarks {
        change = change.with_remarks(remarks);
    }
    change
}
