//! Balance mutations.
//!
//! Every credit or debit runs inside a caller-owned [`Unit`] so it commits or
//! rolls back together with the caller's other writes. The user row is read
//! under an exclusive lock and written back with a version gate; a gate miss
//! surfaces as [`AppError::Conflict`] and the caller is expected to retry the
//! whole unit from scratch.

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::db::{Transaction, TransactionReason, TransactionType, Unit};
use crate::error::{AppError, AppResult};
use crate::Amount;

/// A requested change to one user's balance.
#[derive(Debug, Clone)]
pub struct BalanceChange {
    pub user_id: Uuid,
    pub amount: Amount,
    pub reason: TransactionReason,
    /// External payment reference. Minted locally when absent.
    pub transaction_id: Option<String>,
    pub payment_method: Option<String>,
    pub payment_phone_no: Option<String>,
    pub remarks: Option<String>,
    /// Mark the user locked when the change still leaves the balance negative.
    pub lock_if_negative: bool,
    /// How far below zero a debit may take the balance.
    pub overdraft: Amount,
    /// Order whose own prepayment reference this change settles.
    pub settles_order: Option<Uuid>,
}

impl BalanceChange {
    pub fn new(user_id: Uuid, amount: Amount, reason: TransactionReason) -> Self {
        Self {
            user_id,
            amount,
            reason,
            transaction_id: None,
            payment_method: None,
            payment_phone_no: None,
            remarks: None,
            lock_if_negative: false,
            overdraft: Amount::ZERO,
            settles_order: None,
        }
    }

    pub fn with_transaction_id(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }

    pub fn with_payment(mut self, method: impl Into<String>, phone_no: Option<String>) -> Self {
        self.payment_method = Some(method.into());
        self.payment_phone_no = phone_no;
        self
    }

    pub fn with_remarks(mut self, remarks: impl Into<String>) -> Self {
        self.remarks = Some(remarks.into());
        self
    }

    pub fn lock_if_negative(mut self) -> Self {
        self.lock_if_negative = true;
        self
    }

    pub fn with_overdraft(mut self, limit: Amount) -> Self {
        self.overdraft = limit.abs();
        self
    }

    /// The external id is the prepayment reference already held by `order_id`.
    pub fn settling_order(mut self, order_id: Uuid) -> Self {
        self.settles_order = Some(order_id);
        self
    }
}

/// What a successful mutation left behind.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerReceipt {
    pub transaction: Transaction,
    pub balance: Amount,
    pub version: i64,
}

pub async fn credit(unit: &mut dyn Unit, change: BalanceChange) -> AppResult<LedgerReceipt> {
    mutate_balance(unit, change, TransactionType::Credit).await
}

/// Debits never take a balance below zero unless the change grants an
/// overdraft.
pub async fn debit(unit: &mut dyn Unit, change: BalanceChange) -> AppResult<LedgerReceipt> {
    mutate_balance(unit, change, TransactionType::Debit).await
}

async fn mutate_balance(
    unit: &mut dyn Unit,
    change: BalanceChange,
    direction: TransactionType,
) -> AppResult<LedgerReceipt> {
    let amount = change.amount.round2();
    if amount.is_negative() {
        return Err(AppError::validation(format!(
            "amount must not be negative, got {}",
            change.amount
        )));
    }
    if amount.is_zero() && change.reason.is_externally_confirmed() {
        return Err(AppError::validation(format!(
            "{:?} amount must be at least 0.01, got {}",
            change.reason, change.amount
        )));
    }

    let transaction_id = match change.transaction_id {
        Some(external) => {
            let external = external.trim().to_string();
            if external.is_empty() {
                return Err(AppError::validation("transaction id must not be blank"));
            }
            unit.lock_reference(&external).await?;
            if unit.transaction_id_exists(&external).await?
                || held_by_other_order(unit, &external, change.settles_order).await?
            {
                tracing::warn!(user_id = %change.user_id, transaction_id = %external, "rejected replayed transaction id");
                return Err(AppError::DuplicateTransaction(external));
            }
            external
        }
        None if change.reason.is_externally_confirmed() => {
            return Err(AppError::validation(format!(
                "{:?} requires an external transaction id",
                change.reason
            )));
        }
        None => Uuid::new_v4().to_string(),
    };

    let user = unit
        .lock_user(change.user_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("user {}", change.user_id)))?;

    let new_balance = match direction {
        TransactionType::Credit => user.balance + amount,
        TransactionType::Debit => user.balance - amount,
    }
    .round2();

    if direction == TransactionType::Debit && new_balance < -change.overdraft {
        return Err(AppError::InsufficientFunds {
            user_id: user.id,
            balance: user.balance,
            requested: amount,
        });
    }

    let lock = change.lock_if_negative && new_balance.is_negative();

    let rows = unit
        .update_balance(user.id, user.version, new_balance, lock)
        .await?;
    ensure_applied(rows, user.id)?;

    let transaction = Transaction {
        id: Uuid::new_v4(),
        transaction_id,
        user_id: user.id,
        user_name: user.name.clone(),
        user_phone_no: user.phone_no.clone(),
        amount,
        transaction_type: direction,
        reason: change.reason,
        payment_method: change.payment_method,
        payment_phone_no: change.payment_phone_no,
        remarks: change.remarks,
        created_at: Utc::now(),
    };
    unit.insert_transaction(&transaction).await?;

    tracing::info!(
        user_id = %user.id,
        amount = %amount,
        reason = ?transaction.reason,
        direction = ?direction,
        balance = %new_balance,
        "ledger mutation applied"
    );

    Ok(LedgerReceipt {
        transaction,
        balance: new_balance,
        version: user.version + 1,
    })
}

/// Order prepayment references count as spent, except the one the change
/// itself settles.
async fn held_by_other_order(
    unit: &mut dyn Unit,
    reference: &str,
    settles_order: Option<Uuid>,
) -> AppResult<bool> {
    if let Some(order_id) = settles_order {
        let own = unit.find_order(order_id).await?;
        if own.and_then(|order| order.transaction_id).as_deref() == Some(reference) {
            return Ok(false);
        }
    }
    unit.order_transaction_id_exists(reference).await
}

/// A version-gated write that touched no row lost a race with another writer.
pub fn ensure_applied(rows: u64, user_id: Uuid) -> AppResult<()> {
    if rows == 0 {
        return Err(AppError::conflict(format!(
            "balance of user {user_id} changed concurrently, retry the operation"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_rows_is_a_conflict() {
        assert!(matches!(ensure_applied(0, Uuid::new_v4()), Err(AppError::Conflict(_))));
        assert!(ensure_applied(1, Uuid::new_v4()).is_ok());
    }

    #[test]
    fn builder_sets_metadata() {
        let change = BalanceChange::new(Uuid::new_v4(), Amount::from(10), TransactionReason::Deposit)
            .with_transaction_id("TX1")
            .with_payment("bkash", Some("01711111111".to_string()))
            .with_remarks("top up")
            .lock_if_negative();
        assert_eq!(change.transaction_id.as_deref(), Some("TX1"));
        assert_eq!(change.payment_method.as_deref(), Some("bkash"));
        assert!(change.lock_if_negative);
    }

    #[test]
    fn overdraft_is_stored_as_a_magnitude() {
        let change = BalanceChange::new(Uuid::new_v4(), Amount::from(10), TransactionReason::DeliveryCharge)
            .with_overdraft(Amount::from(-200));
        assert_eq!(change.overdraft, Amount::from(200));
        assert!(change.settles_order.is_none());
    }
}
