//! Marketplace configuration.
//!
//! Built once in `main` from the environment and handed to every service
//! through an `Arc`, never read from a global.

use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::calc::withdraw_fee::WalletProvider;
use crate::Amount;

/// How a provider charges withdrawals above its small-amount threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", content = "fee", rename_all = "snake_case")]
pub enum LargeAmountFee {
    Flat(Amount),
    PerThousand(Amount),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeeSchedule {
    pub min_withdraw_amount: Amount,
    pub small_amount_threshold: Amount,
    pub small_amount_fee: Amount,
    pub large_amount_fee: LargeAmountFee,
}

/// One fee schedule per supported wallet provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WalletFees {
    pub bkash: FeeSchedule,
    pub nagad: FeeSchedule,
    pub rocket: FeeSchedule,
}

impl WalletFees {
    pub fn schedule(&self, provider: WalletProvider) -> &FeeSchedule {
        match provider {
            WalletProvider::Bkash => &self.bkash,
            WalletProvider::Nagad => &self.nagad,
            WalletProvider::Rocket => &self.rocket,
        }
    }
}

impl Default for WalletFees {
    fn default() -> Self {
        Self {
            bkash: FeeSchedule {
                min_withdraw_amount: Amount::from(50),
                small_amount_threshold: Amount::from(1000),
                small_amount_fee: Amount::from(5),
                large_amount_fee: LargeAmountFee::Flat(Amount::from(10)),
            },
            nagad: FeeSchedule {
                min_withdraw_amount: Amount::from(50),
                small_amount_threshold: Amount::from(1000),
                small_amount_fee: Amount::from(5),
                large_amount_fee: LargeAmountFee::PerThousand(Amount::from(10)),
            },
            rocket: FeeSchedule {
                min_withdraw_amount: Amount::from(100),
                small_amount_threshold: Amount::from(1000),
                small_amount_fee: Amount::from(8),
                large_amount_fee: LargeAmountFee::Flat(Amount::from(15)),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct MarketConfig {
    pub maximum_withdraw_amount: Amount,
    pub maximum_wallets: usize,
    pub minimum_order_completed_to_be_verified: i64,
    pub delivery_charge_inside_dhaka: Amount,
    pub delivery_charge_outside_dhaka: Amount,
    /// Matched case-insensitively against the customer's zilla.
    pub delivery_hub_keyword: String,
    /// Deficit a verified seller may carry before prepayment is demanded.
    pub negative_balance_limit: Amount,
    pub max_withdraws_per_day: i64,
    pub transaction_timeout: Duration,
    /// Upper bound on one post-commit notification.
    pub notification_timeout: Duration,
    pub admin_phone_no: Option<String>,
    pub wallet_fees: WalletFees,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            maximum_withdraw_amount: Amount::from(25_000),
            maximum_wallets: 3,
            minimum_order_completed_to_be_verified: 10,
            delivery_charge_inside_dhaka: Amount::from(60),
            delivery_charge_outside_dhaka: Amount::from(120),
            delivery_hub_keyword: "dhaka".to_string(),
            negative_balance_limit: Amount::from(200),
            max_withdraws_per_day: 2,
            transaction_timeout: Duration::from_secs(5),
            notification_timeout: Duration::from_secs(3),
            admin_phone_no: None,
            wallet_fees: WalletFees::default(),
        }
    }
}

impl MarketConfig {
    /// Reads overrides from the environment (and `.env`), keeping defaults
    /// for anything unset.
    pub fn from_env() -> Result<Self, String> {
        let defaults = Self::default();

        let wallet_fees = match dotenv::var("WALLET_FEE_SCHEDULES") {
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|err| format!("Invalid WALLET_FEE_SCHEDULES: {err}"))?,
            Err(_) => defaults.wallet_fees,
        };

        Ok(Self {
            maximum_withdraw_amount: env_or("MAXIMUM_WITHDRAW_AMOUNT", defaults.maximum_withdraw_amount)?,
            maximum_wallets: env_or("MAXIMUM_WALLETS", defaults.maximum_wallets)?,
            minimum_order_completed_to_be_verified: env_or(
                "MINIMUM_ORDER_COMPLETED_TO_BE_VERIFIED",
                defaults.minimum_order_completed_to_be_verified,
            )?,
            delivery_charge_inside_dhaka: env_or("DELIVERY_CHARGE_INSIDE_DHAKA", defaults.delivery_charge_inside_dhaka)?,
            delivery_charge_outside_dhaka: env_or("DELIVERY_CHARGE_OUTSIDE_DHAKA", defaults.delivery_charge_outside_dhaka)?,
            delivery_hub_keyword: dotenv::var("DELIVERY_HUB_KEYWORD").unwrap_or(defaults.delivery_hub_keyword),
            negative_balance_limit: env_or("NEGATIVE_BALANCE_LIMIT", defaults.negative_balance_limit)?,
            max_withdraws_per_day: env_or("MAX_WITHDRAWS_PER_DAY", defaults.max_withdraws_per_day)?,
            transaction_timeout: Duration::from_millis(env_or(
                "TRANSACTION_TIMEOUT_MS",
                defaults.transaction_timeout.as_millis() as u64,
            )?),
            notification_timeout: Duration::from_millis(env_or(
                "NOTIFICATION_TIMEOUT_MS",
                defaults.notification_timeout.as_millis() as u64,
            )?),
            admin_phone_no: dotenv::var("ADMIN_PHONE_NO").ok(),
            wallet_fees,
        })
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match dotenv::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| format!("Invalid {key}: {err}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fee_table_parses_from_json() {
        let raw = r#"{
            "bkash": {"min_withdraw_amount": "50", "small_amount_threshold": "1000", "small_amount_fee": "5", "large_amount_fee": {"type": "flat", "fee": "10"}},
            "nagad": {"min_withdraw_amount": "50", "small_amount_threshold": "1000", "small_amount_fee": "5", "large_amount_fee": {"type": "per_thousand", "fee": "10"}},
            "rocket": {"min_withdraw_amount": "100", "small_amount_threshold": "1000", "small_amount_fee": "8", "large_amount_fee": {"type": "flat", "fee": "15"}}
        }"#;
        let fees: WalletFees = serde_json::from_str(raw).unwrap();
        assert_eq!(fees, WalletFees::default());
    }

    #[test]
    fn schedule_lookup_is_per_provider() {
        let fees = WalletFees::default();
        assert_eq!(
            fees.schedule(WalletProvider::Nagad).large_amount_fee,
            LargeAmountFee::PerThousand(Amount::from(10))
        );
        assert_eq!(fees.schedule(WalletProvider::Rocket).min_withdraw_amount, Amount::from(100));
    }
}
