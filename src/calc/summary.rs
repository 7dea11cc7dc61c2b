use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::Amount;

/// One product line as submitted with a new order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub base_price: Amount,
    pub selling_price: Amount,
    pub quantity: i32,
    pub selected_options: Option<String>,
}

impl OrderLine {
    pub fn base_subtotal(&self) -> Amount {
        self.base_price * self.quantity
    }

    pub fn selling_subtotal(&self) -> Amount {
        self.selling_price * self.quantity
    }

    pub fn commission_per_unit(&self) -> Amount {
        self.selling_price - self.base_price
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProductsSummary {
    pub total_product_quantity: i32,
    pub total_product_base_price: Amount,
    pub total_product_selling_price: Amount,
    pub total_commission: Amount,
    /// Selling total before the delivery charge is added.
    pub total_amount: Amount,
}

/// Sums quantities, prices and commission over an order's lines.
///
/// Lines priced below their base price are accepted; the seller absorbs the
/// negative commission.
pub fn calculate_products_summary(lines: &[OrderLine]) -> AppResult<ProductsSummary> {
    if lines.is_empty() {
        return Err(AppError::validation("an order needs at least one product"));
    }

    let mut summary = ProductsSummary {
        total_product_quantity: 0,
        total_product_base_price: Amount::ZERO,
        total_product_selling_price: Amount::ZERO,
        total_commission: Amount::ZERO,
        total_amount: Amount::ZERO,
    };

    for line in lines {
        if line.quantity <= 0 {
            return Err(AppError::validation(format!(
                "quantity for product {} must be positive",
                line.product_id
            )));
        }
        if line.base_price.is_negative() || line.selling_price.is_negative() {
            return Err(AppError::validation(format!(
                "prices for product {} must not be negative",
                line.product_id
            )));
        }
        if line.selling_price < line.base_price {
            tracing::warn!(
                product_id = %line.product_id,
                base_price = %line.base_price,
                selling_price = %line.selling_price,
                "product sold below base price"
            );
        }

        let selling_subtotal = line.selling_subtotal();
        summary.total_product_quantity += line.quantity;
        summary.total_product_base_price += line.base_subtotal();
        summary.total_product_selling_price += selling_subtotal;
        summary.total_commission += line.commission_per_unit() * line.quantity;
        summary.total_amount += selling_subtotal;
    }

    Ok(summary)
}
