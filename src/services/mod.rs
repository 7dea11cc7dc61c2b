//! Ledger-mutating workflows. Each public operation opens one unit, commits
//! it, and only then talks to the notifier.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::Role;
use crate::error::{AppError, AppResult};

pub mod ledger;
pub mod notify;
pub mod order;
pub mod order_fsm;
pub mod payment;
pub mod withdraw;

pub use ledger::{BalanceChange, LedgerReceipt};
pub use notify::{LogNotifier, Notifier, NotifyError, SmsGateway};
pub use order::{NewOrder, OrderCommand, OrderService, OrderUpdate, SellerPayment};
pub use payment::{ExternalPayment, PaymentService};
pub use withdraw::{NewWithdraw, WithdrawService};

/// The authenticated caller of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Bounds a whole unit of work. On expiry the future is dropped, which drops
/// the open unit and rolls it back.
pub(crate) async fn within<T, F>(limit: Duration, fut: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!(limit_ms = limit.as_millis() as u64, "atomic unit timed out");
            Err(AppError::Timeout(limit.as_millis() as u64))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn slow_unit_times_out() {
        let result: AppResult<()> = within(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(AppError::Timeout(10))));
    }

    #[tokio::test]
    async fn fast_unit_passes_through() {
        let result = within(Duration::from_secs(1), async { Ok::<_, AppError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
