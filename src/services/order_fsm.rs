//! Order lifecycle as an explicit table of (status, event, cancel flag)
//! to (outcome, ledger effect). Anything not in the table is a conflict.

use crate::db::{Order, OrderStatus};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderEvent {
    Approve,
    Reject,
    Process,
    Ship,
    Complete,
    Return,
    CancelByAdmin,
    CancelBySeller,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    MoveTo(OrderStatus),
    /// Status stays; the seller's cancel request is recorded.
    FlagCancelled,
    /// The order row and its lines are removed.
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerEffect {
    None,
    /// Reconcile the delivery charge against what the seller prepaid.
    SettleDeliveryCharge,
    /// Return what the seller prepaid for delivery.
    RefundPrepaid,
    /// Return the full delivery charge.
    RefundDeliveryCharge,
    /// Pay the commission and return the delivery charge.
    PayCommission,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub outcome: Outcome,
    pub effect: LedgerEffect,
}

impl Transition {
    const fn new(outcome: Outcome, effect: LedgerEffect) -> Self {
        Self { outcome, effect }
    }
}

pub fn transition(order: &Order, event: OrderEvent) -> AppResult<Transition> {
    use LedgerEffect as Fx;
    use OrderEvent::*;
    use OrderStatus::*;

    let verified = order.transaction_verified;

    let step = match (order.order_status, event, order.cancelled_by_user) {
        (Pending, Approve, false) if !verified => {
            Transition::new(Outcome::MoveTo(Approved), Fx::SettleDeliveryCharge)
        }
        (Pending, Approve, true) if !verified => {
            if order.is_delivery_charge_paid_by_seller {
                Transition::new(Outcome::MoveTo(Refunded), Fx::RefundPrepaid)
            } else {
                Transition::new(Outcome::MoveTo(Cancelled), Fx::None)
            }
        }
        (Pending, Reject, false) if !verified => Transition::new(Outcome::MoveTo(Rejected), Fx::None),
        (Pending, Reject, true) if !verified => Transition::new(Outcome::Delete, Fx::None),
        (Approved, Process, false) => Transition::new(Outcome::MoveTo(Processing), Fx::None),
        (Approved, Process, true) => {
            Transition::new(Outcome::MoveTo(Refunded), Fx::RefundDeliveryCharge)
        }
        (Approved | Processing, CancelByAdmin, _) => {
            Transition::new(Outcome::MoveTo(Refunded), Fx::RefundDeliveryCharge)
        }
        (Processing, Ship, _) => Transition::new(Outcome::MoveTo(Shipped), Fx::None),
        (Shipped, Complete, _) => Transition::new(Outcome::MoveTo(Completed), Fx::PayCommission),
        (Shipped, Return, _) => Transition::new(Outcome::MoveTo(Returned), Fx::None),
        (Pending | Approved, CancelBySeller, false) => {
            Transition::new(Outcome::FlagCancelled, Fx::None)
        }
        (status, event, cancelled) => {
            return Err(AppError::conflict(format!(
                "cannot {event:?} order {} in status {status:?} (cancelled by seller: {cancelled}, verified: {verified})",
                order.id
            )));
        }
    };

    Ok(step)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Amount;
    use chrono::Utc;
    use uuid::Uuid;

    fn order(status: OrderStatus, cancelled: bool, prepaid: bool) -> Order {
        Order {
            id: Uuid::new_v4(),
            seller_id: Uuid::new_v4(),
            seller_name: "Karim".to_string(),
            seller_phone_no: "01800000000".to_string(),
            customer_name: "Nadia".to_string(),
            customer_phone_no: "01900000000".to_string(),
            customer_zilla: "Dhaka".to_string(),
            customer_upazilla: "Mirpur".to_string(),
            delivery_address: "Road 1".to_string(),
            comments: None,
            order_status: status,
            cancelled_by_user: cancelled,
            transaction_verified: false,
            is_delivery_charge_paid_by_seller: prepaid,
            delivery_charge: Amount::from(60),
            delivery_charge_paid_by_seller: if prepaid { Amount::from(60) } else { Amount::ZERO },
            transaction_id: None,
            payment_phone_no: None,
            total_product_quantity: 1,
            total_product_base_price: Amount::from(200),
            total_product_selling_price: Amount::from(250),
            total_commission: Amount::from(50),
            actual_commission: None,
            amount_paid_by_customer: None,
            courier_name: None,
            tracking_url: None,
            remarks: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn happy_path_walks_the_lifecycle() {
        use OrderStatus::*;
        let steps = [
            (Pending, OrderEvent::Approve, Approved, LedgerEffect::SettleDeliveryCharge),
            (Approved, OrderEvent::Process, Processing, LedgerEffect::None),
            (Processing, OrderEvent::Ship, Shipped, LedgerEffect::None),
            (Shipped, OrderEvent::Complete, Completed, LedgerEffect::PayCommission),
        ];
        for (from, event, to, effect) in steps {
            let step = transition(&order(from, false, false), event).unwrap();
            assert_eq!(step, Transition::new(Outcome::MoveTo(to), effect));
        }
    }

    #[test]
    fn cancel_flag_redirects_next_admin_action() {
        let prepaid = transition(&order(OrderStatus::Pending, true, true), OrderEvent::Approve).unwrap();
        assert_eq!(prepaid, Transition::new(Outcome::MoveTo(OrderStatus::Refunded), LedgerEffect::RefundPrepaid));

        let unpaid = transition(&order(OrderStatus::Pending, true, false), OrderEvent::Approve).unwrap();
        assert_eq!(unpaid, Transition::new(Outcome::MoveTo(OrderStatus::Cancelled), LedgerEffect::None));

        let process = transition(&order(OrderStatus::Approved, true, true), OrderEvent::Process).unwrap();
        assert_eq!(
            process,
            Transition::new(Outcome::MoveTo(OrderStatus::Refunded), LedgerEffect::RefundDeliveryCharge)
        );

        let reject = transition(&order(OrderStatus::Pending, true, false), OrderEvent::Reject).unwrap();
        assert_eq!(reject.outcome, Outcome::Delete);
    }

    #[test]
    fn approve_outside_pending_is_a_conflict() {
        for status in [OrderStatus::Approved, OrderStatus::Rejected, OrderStatus::Completed] {
            let err = transition(&order(status, false, false), OrderEvent::Approve).unwrap_err();
            assert!(matches!(err, AppError::Conflict(_)));
        }
    }

    #[test]
    fn verified_pending_order_cannot_be_approved_or_rejected_again() {
        let mut pending = order(OrderStatus::Pending, false, false);
        pending.transaction_verified = true;
        assert!(transition(&pending, OrderEvent::Approve).is_err());
        assert!(transition(&pending, OrderEvent::Reject).is_err());
    }

    #[test]
    fn seller_cancel_only_once_and_only_early() {
        assert_eq!(
            transition(&order(OrderStatus::Approved, false, false), OrderEvent::CancelBySeller)
                .unwrap()
                .outcome,
            Outcome::FlagCancelled
        );
        assert!(transition(&order(OrderStatus::Approved, true, false), OrderEvent::CancelBySeller).is_err());
        assert!(transition(&order(OrderStatus::Processing, false, false), OrderEvent::CancelBySeller).is_err());
    }

    #[test]
    fn terminal_states_accept_nothing() {
        let events = [
            OrderEvent::Approve,
            OrderEvent::Reject,
            OrderEvent::Process,
            OrderEvent::Ship,
            OrderEvent::Complete,
            OrderEvent::Return,
            OrderEvent::CancelByAdmin,
            OrderEvent::CancelBySeller,
        ];
        for status in [
            OrderStatus::Completed,
            OrderStatus::Returned,
            OrderStatus::Refunded,
            OrderStatus::Rejected,
            OrderStatus::Cancelled,
        ] {
            for event in events {
                assert!(transition(&order(status, false, false), event).is_err());
            }
        }
    }
}
