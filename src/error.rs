//! Error taxonomy shared by the ledger core and the HTTP layer.

use thiserror::Error;
use uuid::Uuid;

use crate::Amount;

#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or out-of-range input.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    /// Stale version, violated state guard or policy limit.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("transaction id {0} has already been used")]
    DuplicateTransaction(String),

    #[error("insufficient funds for user {user_id}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        user_id: Uuid,
        balance: Amount,
        requested: Amount,
    },

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("atomic unit exceeded {0} ms")]
    Timeout(u64),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        AppError::Conflict(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        AppError::Forbidden(msg.into())
    }
}

pub type AppResult<T> = Result<T, AppError>;
