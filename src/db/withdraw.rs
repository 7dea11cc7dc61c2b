use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::calc::WalletProvider;
use crate::Amount;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "withdraw_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum WithdrawStatus {
    Pending,
    Completed,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WithdrawRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_phone_no: String,
    /// Gross amount debited from the balance on completion.
    pub amount: Amount,
    /// Net amount sent to the wallet.
    pub actual_amount: Amount,
    pub transaction_fee: Amount,
    pub wallet_name: WalletProvider,
    pub wallet_phone_no: String,
    pub status: WithdrawStatus,
    pub requested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub remarks: Option<String>,
    pub transaction_id: Option<String>,
}

/// Audit row written when an admin pays out a withdraw request.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WithdrawPayment {
    pub id: Uuid,
    pub withdraw_id: Uuid,
    pub user_id: Uuid,
    pub amount: Amount,
    pub actual_amount: Amount,
    pub transaction_fee: Amount,
    pub wallet_name: WalletProvider,
    pub wallet_phone_no: String,
    pub transaction_id: String,
    pub created_at: DateTime<Utc>,
}
