use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::calc::WalletProvider;
use crate::Amount;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Seller,
}

/// Ledger-relevant view of a user row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub phone_no: String,
    pub role: Role,
    pub balance: Amount,
    /// Bumped on every balance write; a write against a stale value fails.
    pub version: i64,
    pub is_locked: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: impl Into<String>, phone_no: impl Into<String>, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            phone_no: phone_no.into(),
            role,
            balance: Amount::ZERO,
            version: 0,
            is_locked: false,
            is_verified: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_balance(mut self, balance: Amount) -> Self {
        self.balance = balance;
        self
    }

    pub fn verified(mut self) -> Self {
        self.is_verified = true;
        self
    }
}

/// A payout wallet registered by a seller.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Wallet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub wallet_name: WalletProvider,
    pub wallet_phone_no: String,
    pub created_at: DateTime<Utc>,
}
