use serde::Serialize;

use crate::config::MarketConfig;
use crate::Amount;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeliveryQuote {
    pub needs_payment: bool,
    pub amount_to_pay: Amount,
    pub delivery_charge: Amount,
}

/// Surcharge for parcels beyond three items: 10 at four items, then 5 more
/// for every further pair.
pub fn extra_charge(product_count: i32) -> Amount {
    if product_count <= 3 {
        return Amount::ZERO;
    }
    let extra_pairs = (product_count - 4) / 2;
    Amount::from(10) + Amount::from(5) * extra_pairs
}

pub fn base_rate(config: &MarketConfig, zilla: &str) -> Amount {
    let keyword = config.delivery_hub_keyword.to_lowercase();
    if zilla.to_lowercase().contains(&keyword) {
        config.delivery_charge_inside_dhaka
    } else {
        config.delivery_charge_outside_dhaka
    }
}

pub fn delivery_charge(config: &MarketConfig, product_count: i32, zilla: &str) -> Amount {
    base_rate(config, zilla) + extra_charge(product_count)
}

/// Decides whether the seller must prepay the delivery charge of a new order.
///
/// A seller already in deficit always clears it together with the new charge.
/// Unverified sellers need the full charge on balance; verified sellers may
/// dip to `-negative_balance_limit` before payment is demanded.
pub fn calculate_amount_to_pay(
    config: &MarketConfig,
    product_count: i32,
    seller_balance: Amount,
    zilla: &str,
    is_verified: bool,
) -> DeliveryQuote {
    let delivery_charge = delivery_charge(config, product_count, zilla);

    let amount_to_pay = if seller_balance.is_negative() {
        delivery_charge + seller_balance.abs()
    } else {
        let remaining = seller_balance - delivery_charge;
        let floor = if is_verified {
            -config.negative_balance_limit
        } else {
            Amount::ZERO
        };
        if remaining >= floor {
            Amount::ZERO
        } else {
            delivery_charge - seller_balance
        }
    };

    DeliveryQuote {
        needs_payment: amount_to_pay > Amount::ZERO,
        amount_to_pay: amount_to_pay.round2(),
        delivery_charge: delivery_charge.round2(),
    }
}

/// How the delivery charge is reconciled when an admin approves an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeliverySettlement {
    pub deduct_from_balance: Amount,
    pub add_to_balance: Amount,
}

/// A seller who prepaid nothing has the whole charge deducted; an underpayment
/// deducts the shortfall; an overpayment (clearing an earlier deficit) is
/// credited back as a due payment.
pub fn settle_delivery_charge(
    is_paid_by_seller: bool,
    paid_by_seller: Amount,
    delivery_charge: Amount,
) -> DeliverySettlement {
    let mut settlement = DeliverySettlement {
        deduct_from_balance: Amount::ZERO,
        add_to_balance: Amount::ZERO,
    };

    if !is_paid_by_seller {
        settlement.deduct_from_balance = delivery_charge;
    } else if paid_by_seller < delivery_charge {
        settlement.deduct_from_balance = delivery_charge - paid_by_seller;
    } else if paid_by_seller > delivery_charge {
        settlement.add_to_balance = paid_by_seller - delivery_charge;
    }

    settlement
}
