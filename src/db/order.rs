use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::Amount;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Approved,
    Rejected,
    Processing,
    Shipped,
    Completed,
    Returned,
    Refunded,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub seller_name: String,
    pub seller_phone_no: String,
    pub customer_name: String,
    pub customer_phone_no: String,
    pub customer_zilla: String,
    pub customer_upazilla: String,
    pub delivery_address: String,
    pub comments: Option<String>,
    pub order_status: OrderStatus,
    /// Seller asked to cancel before the admin acted on the order.
    pub cancelled_by_user: bool,
    pub transaction_verified: bool,
    pub is_delivery_charge_paid_by_seller: bool,
    pub delivery_charge: Amount,
    pub delivery_charge_paid_by_seller: Amount,
    pub transaction_id: Option<String>,
    pub payment_phone_no: Option<String>,
    pub total_product_quantity: i32,
    pub total_product_base_price: Amount,
    pub total_product_selling_price: Amount,
    pub total_commission: Amount,
    pub actual_commission: Option<Amount>,
    pub amount_paid_by_customer: Option<Amount>,
    pub courier_name: Option<String>,
    pub tracking_url: Option<String>,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn append_remarks(&mut self, remarks: &str) {
        self.remarks = Some(match self.remarks.take() {
            Some(existing) if !existing.is_empty() => format!("{existing}\n{remarks}"),
            _ => remarks.to_string(),
        });
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderProduct {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub product_base_price: Amount,
    pub product_selling_price: Amount,
    pub product_quantity: i32,
    pub product_total_base_price: Amount,
    pub product_total_selling_price: Amount,
    pub selected_options: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderWithProducts {
    #[serde(flatten)]
    pub order: Order,
    pub products: Vec<OrderProduct>,
}
