//! Order creation and the admin/seller transitions that drive the ledger.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ledger::{self, BalanceChange, LedgerReceipt};
use super::notify::{notify_best_effort, Notifier};
use super::order_fsm::{transition, LedgerEffect, OrderEvent, Outcome};
use super::{within, Actor};
use crate::calc::{
    calculate_amount_to_pay, calculate_products_summary, settle_delivery_charge, Courier, OrderLine,
};
use crate::config::MarketConfig;
use crate::db::{
    Order, OrderProduct, OrderStatus, OrderWithProducts, Role, Store, TransactionReason, Unit,
};
use crate::error::{AppError, AppResult};
use crate::Amount;

/// The seller's own payment toward the delivery charge of a new order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellerPayment {
    pub transaction_id: String,
    pub amount: Amount,
    pub payment_phone_no: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub customer_name: String,
    pub customer_phone_no: String,
    pub customer_zilla: String,
    pub customer_upazilla: String,
    pub delivery_address: String,
    pub comments: Option<String>,
    pub products: Vec<OrderLine>,
    pub payment: Option<SellerPayment>,
}

/// An instruction for an existing order, with whatever input it needs.
#[derive(Debug, Clone)]
pub enum OrderCommand {
    Approve,
    Reject { remarks: String },
    Process,
    Ship { tracking_url: String },
    Complete { amount_paid_by_customer: Amount },
    Return { remarks: Option<String> },
    CancelByAdmin { remarks: Option<String> },
    CancelBySeller { seller_id: Uuid },
}

impl OrderCommand {
    fn event(&self) -> OrderEvent {
        match self {
            OrderCommand::Approve => OrderEvent::Approve,
            OrderCommand::Reject { .. } => OrderEvent::Reject,
            OrderCommand::Process => OrderEvent::Process,
            OrderCommand::Ship { .. } => OrderEvent::Ship,
            OrderCommand::Complete { .. } => OrderEvent::Complete,
            OrderCommand::Return { .. } => OrderEvent::Return,
            OrderCommand::CancelByAdmin { .. } => OrderEvent::CancelByAdmin,
            OrderCommand::CancelBySeller { .. } => OrderEvent::CancelBySeller,
        }
    }
}

/// Result of a transition: the order as committed (`None` once deleted) and
/// the ledger entries written alongside it.
#[derive(Debug, Clone, Serialize)]
pub struct OrderUpdate {
    pub order: Option<Order>,
    pub receipts: Vec<LedgerReceipt>,
}

pub struct OrderService {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    config: Arc<MarketConfig>,
}

impl OrderService {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>, config: Arc<MarketConfig>) -> Self {
        Self { store, notifier, config }
    }

    pub async fn create(&self, seller_id: Uuid, new_order: NewOrder) -> AppResult<OrderWithProducts> {
        let summary = calculate_products_summary(&new_order.products)?;
        for (field, value) in [
            ("customer_name", &new_order.customer_name),
            ("customer_phone_no", &new_order.customer_phone_no),
            ("customer_zilla", &new_order.customer_zilla),
            ("delivery_address", &new_order.delivery_address),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::validation(format!("{field} is required")));
            }
        }

        let created = within(self.config.transaction_timeout, async {
            let mut unit = self.store.begin().await?;

            let seller = unit
                .find_user(seller_id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("seller {seller_id}")))?;
            if seller.role != Role::Seller {
                return Err(AppError::forbidden("only sellers can place orders"));
            }

            let quote = calculate_amount_to_pay(
                &self.config,
                summary.total_product_quantity,
                seller.balance,
                &new_order.customer_zilla,
                seller.is_verified,
            );

            let payment = match (&new_order.payment, quote.needs_payment) {
                (None, true) => {
                    return Err(AppError::validation(format!(
                        "a delivery charge payment of {} is required",
                        quote.amount_to_pay
                    )));
                }
                (None, false) => None,
                (Some(payment), _) => {
                    let transaction_id = payment.transaction_id.trim();
                    if transaction_id.is_empty() {
                        return Err(AppError::validation("payment transaction id is required"));
                    }
                    if payment.amount < quote.amount_to_pay {
                        return Err(AppError::validation(format!(
                            "payment of {} does not cover the required {}",
                            payment.amount, quote.amount_to_pay
                        )));
                    }
                    unit.lock_reference(transaction_id).await?;
                    if unit.transaction_id_exists(transaction_id).await?
                        || unit.order_transaction_id_exists(transaction_id).await?
                    {
                        return Err(AppError::DuplicateTransaction(transaction_id.to_string()));
                    }
                    Some(payment)
                }
            };

            let now = Utc::now();
            let order = Order {
                id: Uuid::new_v4(),
                seller_id: seller.id,
                seller_name: seller.name.clone(),
                seller_phone_no: seller.phone_no.clone(),
                customer_name: new_order.customer_name.trim().to_string(),
                customer_phone_no: new_order.customer_phone_no.trim().to_string(),
                customer_zilla: new_order.customer_zilla.trim().to_string(),
                customer_upazilla: new_order.customer_upazilla.trim().to_string(),
                delivery_address: new_order.delivery_address.trim().to_string(),
                comments: new_order.comments.clone(),
                order_status: OrderStatus::Pending,
                cancelled_by_user: false,
                transaction_verified: false,
                is_delivery_charge_paid_by_seller: payment.is_some(),
                delivery_charge: quote.delivery_charge,
                delivery_charge_paid_by_seller: payment
                    .map(|p| p.amount.round2())
                    .unwrap_or(Amount::ZERO),
                transaction_id: payment.map(|p| p.transaction_id.trim().to_string()),
                payment_phone_no: payment.map(|p| p.payment_phone_no.clone()),
                total_product_quantity: summary.total_product_quantity,
                total_product_base_price: summary.total_product_base_price.round2(),
                total_product_selling_price: summary.total_product_selling_price.round2(),
                total_commission: summary.total_commission.round2(),
                actual_commission: None,
                amount_paid_by_customer: None,
                courier_name: None,
                tracking_url: None,
                remarks: None,
                created_at: now,
                updated_at: now,
            };

            let products: Vec<OrderProduct> = new_order
                .products
                .iter()
                .map(|line| OrderProduct {
                    id: Uuid::new_v4(),
                    order_id: order.id,
                    product_id: line.product_id,
                    product_name: line.product_name.clone(),
                    product_base_price: line.base_price.round2(),
                    product_selling_price: line.selling_price.round2(),
                    product_quantity: line.quantity,
                    product_total_base_price: line.base_subtotal().round2(),
                    product_total_selling_price: line.selling_subtotal().round2(),
                    selected_options: line.selected_options.clone(),
                })
                .collect();

            unit.insert_order(&order, &products).await?;
            unit.commit().await?;

            Ok::<_, AppError>(OrderWithProducts { order, products })
        })
        .await?;

        tracing::info!(
            order_id = %created.order.id,
            seller_id = %seller_id,
            delivery_charge = %created.order.delivery_charge,
            prepaid = created.order.is_delivery_charge_paid_by_seller,
            "order created"
        );

        if let Some(admin_phone_no) = &self.config.admin_phone_no {
            let message = format!(
                "New order {} from {} awaiting approval",
                created.order.id, created.order.seller_name
            );
            notify_best_effort(self.notifier.as_ref(), self.config.notification_timeout, admin_phone_no, &message).await;
        }

        Ok(created)
    }

    pub async fn get(&self, order_id: Uuid, actor: Actor) -> AppResult<OrderWithProducts> {
        let mut unit = self.store.begin().await?;
        let order = unit
            .find_order(order_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("order {order_id}")))?;
        if actor.role == Role::Seller && order.seller_id != actor.user_id {
            return Err(AppError::forbidden("order belongs to another seller"));
        }
        let products = unit.order_products(order_id).await?;
        Ok(OrderWithProducts { order, products })
    }

    pub async fn approve(&self, order_id: Uuid) -> AppResult<OrderUpdate> {
        self.execute(order_id, OrderCommand::Approve).await
    }

    pub async fn reject(&self, order_id: Uuid, remarks: impl Into<String>) -> AppResult<OrderUpdate> {
        self.execute(order_id, OrderCommand::Reject { remarks: remarks.into() }).await
    }

    pub async fn process(&self, order_id: Uuid) -> AppResult<OrderUpdate> {
        self.execute(order_id, OrderCommand::Process).await
    }

    pub async fn ship(&self, order_id: Uuid, tracking_url: impl Into<String>) -> AppResult<OrderUpdate> {
        self.execute(order_id, OrderCommand::Ship { tracking_url: tracking_url.into() }).await
    }

    pub async fn complete(&self, order_id: Uuid, amount_paid_by_customer: Amount) -> AppResult<OrderUpdate> {
        self.execute(order_id, OrderCommand::Complete { amount_paid_by_customer }).await
    }

    pub async fn mark_returned(&self, order_id: Uuid, remarks: Option<String>) -> AppResult<OrderUpdate> {
        self.execute(order_id, OrderCommand::Return { remarks }).await
    }

    pub async fn cancel_by_admin(&self, order_id: Uuid, remarks: Option<String>) -> AppResult<OrderUpdate> {
        self.execute(order_id, OrderCommand::CancelByAdmin { remarks }).await
    }

    pub async fn cancel_by_seller(&self, order_id: Uuid, seller_id: Uuid) -> AppResult<OrderUpdate> {
        self.execute(order_id, OrderCommand::CancelBySeller { seller_id }).await
    }

    /// Runs one transition: status write and ledger effects share a unit.
    pub async fn execute(&self, order_id: Uuid, command: OrderCommand) -> AppResult<OrderUpdate> {
        let event = command.event();

        let update = within(self.config.transaction_timeout, async {
            let mut unit = self.store.begin().await?;

            let mut order = unit
                .lock_order(order_id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("order {order_id}")))?;

            if let OrderCommand::CancelBySeller { seller_id } = &command {
                if order.seller_id != *seller_id {
                    return Err(AppError::forbidden(format!(
                        "order {order_id} does not belong to seller {seller_id}"
                    )));
                }
            }

            let step = transition(&order, event)?;
            prepare(&mut order, &command)?;

            let deleted = match step.outcome {
                Outcome::MoveTo(status) => {
                    order.order_status = status;
                    if matches!(event, OrderEvent::Approve) && status == OrderStatus::Approved {
                        order.transaction_verified = true;
                    }
                    unit.update_order(&order).await?;
                    false
                }
                Outcome::FlagCancelled => {
                    order.cancelled_by_user = true;
                    unit.update_order(&order).await?;
                    false
                }
                Outcome::Delete => {
                    unit.delete_order(order.id).await?;
                    true
                }
            };

            let receipts = self.apply_effect(unit.as_mut(), &order, step.effect).await?;
            unit.commit().await?;

            Ok::<_, AppError>(OrderUpdate {
                order: (!deleted).then_some(order),
                receipts,
            })
        })
        .await?;

        tracing::info!(
            order_id = %order_id,
            event = ?event,
            status = ?update.order.as_ref().map(|order| order.order_status),
            ledger_entries = update.receipts.len(),
            "order transition committed"
        );

        if let Some(order) = &update.order {
            if let Some(message) = status_message(order, event) {
                notify_best_effort(self.notifier.as_ref(), self.config.notification_timeout, &order.seller_phone_no, &message).await;
            }
        }

        Ok(update)
    }

    async fn apply_effect(
        &self,
        unit: &mut dyn Unit,
        order: &Order,
        effect: LedgerEffect,
    ) -> AppResult<Vec<LedgerReceipt>> {
        let mut receipts = Vec::new();

        match effect {
            LedgerEffect::None => {}
            LedgerEffect::SettleDeliveryCharge => {
                let settlement = settle_delivery_charge(
                    order.is_delivery_charge_paid_by_seller,
                    order.delivery_charge_paid_by_seller,
                    order.delivery_charge,
                );
                if settlement.deduct_from_balance > Amount::ZERO {
                    let seller = unit
                        .find_user(order.seller_id)
                        .await?
                        .ok_or_else(|| AppError::not_found(format!("seller {}", order.seller_id)))?;
                    let mut change = BalanceChange::new(
                        order.seller_id,
                        settlement.deduct_from_balance,
                        TransactionReason::DeliveryCharge,
                    )
                    .with_remarks(format!("Delivery charge for order {}", order.id));
                    // the same cushion that waived prepayment at creation
                    if seller.is_verified {
                        change = change
                            .with_overdraft(self.config.negative_balance_limit)
                            .lock_if_negative();
                    }
                    receipts.push(ledger::debit(unit, change).await?);
                }
                if settlement.add_to_balance > Amount::ZERO {
                    let transaction_id = order.transaction_id.clone().ok_or_else(|| {
                        AppError::validation(format!("order {} has no payment reference", order.id))
                    })?;
                    let change = BalanceChange::new(
                        order.seller_id,
                        settlement.add_to_balance,
                        TransactionReason::DuePayment,
                    )
                    .with_transaction_id(transaction_id)
                    .settling_order(order.id)
                    .with_payment("delivery prepayment", order.payment_phone_no.clone())
                    .with_remarks(format!("Due paid with order {}", order.id))
                    .lock_if_negative();
                    receipts.push(ledger::credit(unit, change).await?);
                }
            }
            LedgerEffect::RefundPrepaid => {
                if order.delivery_charge_paid_by_seller > Amount::ZERO {
                    let change = BalanceChange::new(
                        order.seller_id,
                        order.delivery_charge_paid_by_seller,
                        TransactionReason::Refund,
                    )
                    .with_remarks(format!("Prepaid delivery charge refunded for cancelled order {}", order.id))
                    .lock_if_negative();
                    receipts.push(ledger::credit(unit, change).await?);
                }
            }
            LedgerEffect::RefundDeliveryCharge => {
                let change = BalanceChange::new(
                    order.seller_id,
                    order.delivery_charge,
                    TransactionReason::Refund,
                )
                .with_remarks(format!("Delivery charge refunded for order {}", order.id))
                .lock_if_negative();
                receipts.push(ledger::credit(unit, change).await?);
            }
            LedgerEffect::PayCommission => {
                let commission = order.actual_commission.unwrap_or(Amount::ZERO);
                if commission > Amount::ZERO {
                    let change = BalanceChange::new(order.seller_id, commission, TransactionReason::Commission)
                        .with_remarks(format!("Commission for order {}", order.id));
                    receipts.push(ledger::credit(unit, change).await?);
                }
                let change = BalanceChange::new(
                    order.seller_id,
                    order.delivery_charge,
                    TransactionReason::DeliveryCharge,
                )
                .with_remarks(format!("Delivery charge returned for completed order {}", order.id))
                .lock_if_negative();
                receipts.push(ledger::credit(unit, change).await?);

                self.promote_if_eligible(unit, order.seller_id).await?;
            }
        }

        Ok(receipts)
    }

    async fn promote_if_eligible(&self, unit: &mut dyn Unit, seller_id: Uuid) -> AppResult<()> {
        let seller = unit
            .find_user(seller_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("seller {seller_id}")))?;
        if seller.is_verified {
            return Ok(());
        }
        let completed = unit.count_completed_orders(seller_id).await?;
        if completed >= self.config.minimum_order_completed_to_be_verified {
            unit.set_verified(seller_id).await?;
            tracing::info!(seller_id = %seller_id, completed, "seller verified");
        }
        Ok(())
    }
}

/// Applies the command's own input to the order before it is written.
fn prepare(order: &mut Order, command: &OrderCommand) -> AppResult<()> {
    match command {
        OrderCommand::Reject { remarks } => {
            let original = order.transaction_id.take();
            let note = match original {
                Some(transaction_id) => format!("Rejected ({transaction_id}): {remarks}"),
                None => format!("Rejected: {remarks}"),
            };
            order.append_remarks(&note);
        }
        OrderCommand::Ship { tracking_url } => {
            let courier = Courier::from_tracking_url(tracking_url)?;
            order.courier_name = Some(courier.name().to_string());
            order.tracking_url = Some(tracking_url.trim().to_string());
        }
        OrderCommand::Complete { amount_paid_by_customer } => {
            if *amount_paid_by_customer < order.total_product_base_price {
                return Err(AppError::validation(format!(
                    "customer payment {} is below the base price {}",
                    amount_paid_by_customer, order.total_product_base_price
                )));
            }
            let paid = amount_paid_by_customer.round2();
            order.amount_paid_by_customer = Some(paid);
            order.actual_commission = Some((paid - order.total_product_base_price).round2());
        }
        OrderCommand::Return { remarks: Some(remarks) }
        | OrderCommand::CancelByAdmin { remarks: Some(remarks) } => {
            order.append_remarks(remarks);
        }
        _ => {}
    }
    Ok(())
}

fn status_message(order: &Order, event: OrderEvent) -> Option<String> {
    let text = match (event, order.order_status) {
        (OrderEvent::CancelBySeller, _) => return None,
        (_, OrderStatus::Approved) => "has been approved",
        (_, OrderStatus::Rejected) => "has been rejected",
        (_, OrderStatus::Processing) => "is being processed",
        (_, OrderStatus::Shipped) => "has been shipped",
        (_, OrderStatus::Completed) => "has been completed and your commission is credited",
        (_, OrderStatus::Returned) => "has been returned",
        (_, OrderStatus::Refunded) => "has been cancelled and the delivery charge refunded",
        (_, OrderStatus::Cancelled) => "has been cancelled",
        (_, OrderStatus::Pending) => return None,
    };
    Some(format!("Your order {} {text}.", order.id))
}
