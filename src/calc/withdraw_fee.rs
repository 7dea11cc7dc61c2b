use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::{LargeAmountFee, WalletFees};
use crate::error::{AppError, AppResult};
use crate::Amount;

/// Mobile wallet providers sellers can cash out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "wallet_provider", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum WalletProvider {
    Bkash,
    Nagad,
    Rocket,
}

impl WalletProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletProvider::Bkash => "bkash",
            WalletProvider::Nagad => "nagad",
            WalletProvider::Rocket => "rocket",
        }
    }
}

impl fmt::Display for WalletProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WalletProvider {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bkash" => Ok(WalletProvider::Bkash),
            "nagad" => Ok(WalletProvider::Nagad),
            "rocket" => Ok(WalletProvider::Rocket),
            other => Err(AppError::validation(format!("unsupported wallet provider: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WithdrawalFee {
    pub actual_amount: Amount,
    pub transaction_fee: Amount,
}

/// Computes the payout fee for a withdrawal of `amount` through `provider`.
pub fn calculate_withdrawal(
    fees: &WalletFees,
    provider: WalletProvider,
    amount: Amount,
) -> AppResult<WithdrawalFee> {
    let schedule = fees.schedule(provider);

    if amount < schedule.min_withdraw_amount {
        return Err(AppError::validation(format!(
            "minimum withdraw amount for {provider} is {}",
            schedule.min_withdraw_amount
        )));
    }

    let transaction_fee = if amount <= schedule.small_amount_threshold {
        schedule.small_amount_fee
    } else {
        match schedule.large_amount_fee {
            LargeAmountFee::Flat(fee) => fee,
            LargeAmountFee::PerThousand(fee) => {
                let thousands = (amount.as_decimal() / Decimal::ONE_THOUSAND).floor();
                Amount::from_decimal(thousands * fee.as_decimal())
            }
        }
    };

    let actual_amount = amount - transaction_fee;
    // a schedule whose fee eats the whole payout is misconfigured
    if actual_amount <= Amount::ZERO {
        return Err(AppError::validation(format!(
            "fee {transaction_fee} for {provider} leaves nothing to pay out of {amount}"
        )));
    }

    Ok(WithdrawalFee {
        actual_amount: actual_amount.round2(),
        transaction_fee: transaction_fee.round2(),
    })
}
