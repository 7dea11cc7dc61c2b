use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::Amount;

/// Immutable ledger record. Name and phone are copied from the user at write
/// time so history reads the same after the profile changes.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub transaction_id: String,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_phone_no: String,
    pub amount: Amount,
    pub transaction_type: TransactionType,
    pub reason: TransactionReason,
    pub payment_method: Option<String>,
    pub payment_phone_no: Option<String>,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Credit,
    Debit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_reason", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionReason {
    Deposit,
    Withdrawal,
    DeliveryCharge,
    Commission,
    Refund,
    DuePayment,
}

impl TransactionReason {
    /// Whether the id for this reason comes from an external payment
    /// confirmation rather than being minted locally.
    pub fn is_externally_confirmed(&self) -> bool {
        matches!(
            self,
            TransactionReason::Deposit | TransactionReason::Withdrawal | TransactionReason::DuePayment
        )
    }
}
