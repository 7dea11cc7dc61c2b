//! Seller cash-out requests and the wallets they pay out to.

use std::sync::Arc;

use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ledger::{self, BalanceChange, LedgerReceipt};
use super::notify::{notify_best_effort, Notifier};
use super::within;
use crate::calc::{calculate_withdrawal, WalletProvider};
use crate::config::MarketConfig;
use crate::db::utils::start_of_local_day;
use crate::db::{
    Store, TransactionReason, Unit, Wallet, WithdrawPayment, WithdrawRequest, WithdrawStatus,
};
use crate::error::{AppError, AppResult};
use crate::Amount;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWithdraw {
    pub amount: Amount,
    pub wallet_name: WalletProvider,
    pub wallet_phone_no: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletedWithdraw {
    pub request: WithdrawRequest,
    pub payment: WithdrawPayment,
    pub receipt: LedgerReceipt,
}

pub struct WithdrawService {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    config: Arc<MarketConfig>,
}

impl WithdrawService {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>, config: Arc<MarketConfig>) -> Self {
        Self { store, notifier, config }
    }

    /// Files a pending request. The user row stays locked from the policy
    /// checks until the insert commits, so two concurrent requests from the
    /// same user cannot both pass the pending and daily checks.
    pub async fn create(&self, user_id: Uuid, new_withdraw: NewWithdraw) -> AppResult<WithdrawRequest> {
        let amount = new_withdraw.amount.round2();
        if amount <= Amount::ZERO {
            return Err(AppError::validation("withdraw amount must be positive"));
        }
        if amount > self.config.maximum_withdraw_amount {
            return Err(AppError::validation(format!(
                "withdraw amount {amount} exceeds the maximum of {}",
                self.config.maximum_withdraw_amount
            )));
        }
        let fee = calculate_withdrawal(&self.config.wallet_fees, new_withdraw.wallet_name, amount)?;
        let wallet_phone_no = new_withdraw.wallet_phone_no.trim().to_string();

        let request = within(self.config.transaction_timeout, async {
            let mut unit = self.store.begin().await?;

            let user = unit
                .lock_user(user_id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("user {user_id}")))?;

            let owns_wallet = unit.list_wallets(user_id).await?.iter().any(|wallet| {
                wallet.wallet_name == new_withdraw.wallet_name && wallet.wallet_phone_no == wallet_phone_no
            });
            if !owns_wallet {
                return Err(AppError::forbidden(format!(
                    "{} wallet {wallet_phone_no} is not registered to this user",
                    new_withdraw.wallet_name
                )));
            }

            if amount > user.balance {
                return Err(AppError::InsufficientFunds {
                    user_id,
                    balance: user.balance,
                    requested: amount,
                });
            }

            if let Some(pending) = unit.find_pending_withdraw(user_id).await? {
                return Err(AppError::conflict(format!(
                    "withdraw request {} is still pending",
                    pending.id
                )));
            }

            let today = start_of_local_day(Local::now());
            let filed_today = unit.count_withdraws_since(user_id, today).await?;
            if filed_today >= self.config.max_withdraws_per_day {
                return Err(AppError::conflict(format!(
                    "daily limit of {} withdraw requests reached",
                    self.config.max_withdraws_per_day
                )));
            }

            let request = WithdrawRequest {
                id: Uuid::new_v4(),
                user_id,
                user_name: user.name.clone(),
                user_phone_no: user.phone_no.clone(),
                amount,
                actual_amount: fee.actual_amount,
                transaction_fee: fee.transaction_fee,
                wallet_name: new_withdraw.wallet_name,
                wallet_phone_no: wallet_phone_no.clone(),
                status: WithdrawStatus::Pending,
                requested_at: Utc::now(),
                processed_at: None,
                remarks: None,
                transaction_id: None,
            };
            unit.insert_withdraw(&request).await?;
            unit.commit().await?;
            Ok::<_, AppError>(request)
        })
        .await?;

        tracing::info!(
            withdraw_id = %request.id,
            user_id = %user_id,
            amount = %request.amount,
            fee = %request.transaction_fee,
            "withdraw requested"
        );

        if let Some(admin_phone_no) = &self.config.admin_phone_no {
            let message = format!(
                "Withdraw request of {} from {} via {}",
                request.amount, request.user_name, request.wallet_name
            );
            notify_best_effort(self.notifier.as_ref(), self.config.notification_timeout, admin_phone_no, &message).await;
        }

        Ok(request)
    }

    pub async fn cancel(&self, user_id: Uuid, withdraw_id: Uuid) -> AppResult<()> {
        within(self.config.transaction_timeout, async {
            let mut unit = self.store.begin().await?;
            let request = lock_pending(unit.as_mut(), withdraw_id).await?;
            if request.user_id != user_id {
                return Err(AppError::forbidden("withdraw request belongs to another user"));
            }
            unit.delete_withdraw(withdraw_id).await?;
            unit.commit().await
        })
        .await?;

        tracing::info!(withdraw_id = %withdraw_id, user_id = %user_id, "withdraw cancelled");
        Ok(())
    }

    pub async fn reject(&self, withdraw_id: Uuid, remarks: impl Into<String>) -> AppResult<WithdrawRequest> {
        let remarks = remarks.into();
        let request = within(self.config.transaction_timeout, async {
            let mut unit = self.store.begin().await?;
            let mut request = lock_pending(unit.as_mut(), withdraw_id).await?;
            request.status = WithdrawStatus::Rejected;
            request.processed_at = Some(Utc::now());
            request.remarks = Some(remarks);
            unit.update_withdraw(&request).await?;
            unit.commit().await?;
            Ok::<_, AppError>(request)
        })
        .await?;

        tracing::info!(withdraw_id = %withdraw_id, "withdraw rejected");
        let message = format!(
            "Your withdraw request of {} was rejected: {}",
            request.amount,
            request.remarks.as_deref().unwrap_or_default()
        );
        notify_best_effort(self.notifier.as_ref(), self.config.notification_timeout, &request.user_phone_no, &message).await;

        Ok(request)
    }

    /// Marks the request paid, records the payout and debits the gross amount,
    /// all in one unit. Any failure leaves the request pending.
    pub async fn complete(
        &self,
        withdraw_id: Uuid,
        transaction_id: impl Into<String>,
        remarks: Option<String>,
    ) -> AppResult<CompletedWithdraw> {
        let transaction_id = transaction_id.into().trim().to_string();
        if transaction_id.is_empty() {
            return Err(AppError::validation("payout transaction id is required"));
        }

        let completed = within(self.config.transaction_timeout, async {
            let mut unit = self.store.begin().await?;
            let mut request = lock_pending(unit.as_mut(), withdraw_id).await?;

            let now = Utc::now();
            request.status = WithdrawStatus::Completed;
            request.processed_at = Some(now);
            request.transaction_id = Some(transaction_id.clone());
            if remarks.is_some() {
                request.remarks = remarks;
            }
            unit.update_withdraw(&request).await?;

            let payment = WithdrawPayment {
                id: Uuid::new_v4(),
                withdraw_id: request.id,
                user_id: request.user_id,
                amount: request.amount,
                actual_amount: request.actual_amount,
                transaction_fee: request.transaction_fee,
                wallet_name: request.wallet_name,
                wallet_phone_no: request.wallet_phone_no.clone(),
                transaction_id: transaction_id.clone(),
                created_at: now,
            };
            unit.insert_withdraw_payment(&payment).await?;

            let change = BalanceChange::new(request.user_id, request.amount, TransactionReason::Withdrawal)
                .with_transaction_id(transaction_id.clone())
                .with_payment(request.wallet_name.as_str(), Some(request.wallet_phone_no.clone()))
                .with_remarks(format!(
                    "Withdraw {} paid {} after a fee of {}",
                    request.id, request.actual_amount, request.transaction_fee
                ));
            let receipt = ledger::debit(unit.as_mut(), change).await?;

            unit.commit().await?;
            Ok::<_, AppError>(CompletedWithdraw { request, payment, receipt })
        })
        .await?;

        tracing::info!(
            withdraw_id = %withdraw_id,
            user_id = %completed.request.user_id,
            amount = %completed.request.amount,
            "withdraw completed"
        );

        let message = format!(
            "{} has been sent to your {} wallet {}. Remaining balance: {}",
            completed.request.actual_amount,
            completed.request.wallet_name,
            completed.request.wallet_phone_no,
            completed.receipt.balance
        );
        notify_best_effort(self.notifier.as_ref(), self.config.notification_timeout, &completed.request.user_phone_no, &message).await;

        Ok(completed)
    }

    pub async fn list(&self, user_id: Uuid) -> AppResult<Vec<WithdrawRequest>> {
        let mut unit = self.store.begin().await?;
        unit.list_withdraws(user_id).await
    }

    pub async fn add_wallet(
        &self,
        user_id: Uuid,
        wallet_name: WalletProvider,
        wallet_phone_no: impl Into<String>,
    ) -> AppResult<Wallet> {
        let wallet_phone_no = wallet_phone_no.into().trim().to_string();
        if wallet_phone_no.is_empty() {
            return Err(AppError::validation("wallet phone number is required"));
        }

        within(self.config.transaction_timeout, async {
            let mut unit = self.store.begin().await?;
            unit.lock_user(user_id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("user {user_id}")))?;

            let wallets = unit.list_wallets(user_id).await?;
            if wallets
                .iter()
                .any(|wallet| wallet.wallet_name == wallet_name && wallet.wallet_phone_no == wallet_phone_no)
            {
                return Err(AppError::conflict(format!(
                    "{wallet_name} wallet {wallet_phone_no} is already registered"
                )));
            }
            if wallets.len() >= self.config.maximum_wallets {
                return Err(AppError::conflict(format!(
                    "at most {} wallets can be registered",
                    self.config.maximum_wallets
                )));
            }

            let wallet = Wallet {
                id: Uuid::new_v4(),
                user_id,
                wallet_name,
                wallet_phone_no,
                created_at: Utc::now(),
            };
            unit.insert_wallet(&wallet).await?;
            unit.commit().await?;
            Ok::<_, AppError>(wallet)
        })
        .await
    }

    pub async fn list_wallets(&self, user_id: Uuid) -> AppResult<Vec<Wallet>> {
        let mut unit = self.store.begin().await?;
        unit.list_wallets(user_id).await
    }
}

async fn lock_pending(unit: &mut dyn Unit, withdraw_id: Uuid) -> AppResult<WithdrawRequest> {
    let request = unit
        .lock_withdraw(withdraw_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("withdraw request {withdraw_id}")))?;
    if request.status != WithdrawStatus::Pending {
        return Err(AppError::conflict(format!(
            "withdraw request {withdraw_id} is already {:?}",
            request.status
        )));
    }
    Ok(request)
}
