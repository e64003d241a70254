use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::errors::DomainError;
use crate::domain::order::{MasterOrder, StatusChange, SubOrder};
use crate::domain::ports::{MasterOrderRepository, SubOrderRepository};

use super::notification_queue::NotificationQueue;

/// Keeps a master order's status fields in line with its sub-orders.
pub struct MasterOrderSynchronizer {
    masters: Arc<dyn MasterOrderRepository>,
    sub_orders: Arc<dyn SubOrderRepository>,
    queue: NotificationQueue,
}

impl MasterOrderSynchronizer {
    pub fn new(
        masters: Arc<dyn MasterOrderRepository>,
        sub_orders: Arc<dyn SubOrderRepository>,
        queue: NotificationQueue,
    ) -> Self {
        Self {
            masters,
            sub_orders,
            queue,
        }
    }

    /// Recompute the master order from its children.
    ///
    /// Returns the updated master order, or `None` when nothing was written
    /// (no children, no master, or no unanimous change).
    pub async fn sync_master_order_status(
        &self,
        master_order_id: &str,
    ) -> Result<Option<MasterOrder>, DomainError> {
        let children = self.sub_orders.list_by_master(master_order_id).await?;
        if children.is_empty() {
            log::debug!("Master order {} has no sub-orders, skipping sync", master_order_id);
            return Ok(None);
        }

        let Some(master) = self.masters.find_by_id(master_order_id).await? else {
            log::warn!("Sub-orders reference missing master order {}", master_order_id);
            return Ok(None);
        };

        let Some(change) = reconcile(&master, &children, Utc::now()) else {
            return Ok(None);
        };

        let Some(updated) = self.masters.update_status(master_order_id, &change).await? else {
            return Ok(None);
        };
        log::info!(
            "Master order {} synced to {}/{}",
            updated.id,
            updated.status,
            updated.payment_status
        );

        if !updated.customer.user_email.trim().is_empty() {
            self.queue.enqueue(updated.clone());
        }
        Ok(Some(updated))
    }
}

fn unanimous<T: PartialEq + Copy>(mut values: impl Iterator<Item = T>) -> Option<T> {
    let first = values.next()?;
    values.all(|v| v == first).then_some(first)
}

/// Status change implied by the children, if any.
///
/// Status and payment status are judged independently: each moves only when
/// every child agrees on a value different from the master's current one.
/// A split vote leaves the field as it was.
pub fn reconcile(master: &MasterOrder, children: &[SubOrder], now: DateTime<Utc>) -> Option<StatusChange> {
    let status = unanimous(children.iter().map(|c| c.status)).filter(|s| *s != master.status);
    let payment =
        unanimous(children.iter().map(|c| c.payment_status)).filter(|p| *p != master.payment_status);

    if status.is_none() && payment.is_none() {
        return None;
    }

    Some(StatusChange::new(
        status.unwrap_or(master.status),
        payment.unwrap_or(master.payment_status),
        master.confirmed_at,
        master.delivered_at,
        now,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{Amounts, Customer, DeliveryAddress, OrderStatus, PaymentStatus};

    fn master() -> MasterOrder {
        MasterOrder {
            id: "m-1".into(),
            customer: Customer {
                user_id: "u-1".into(),
                user_email: "alice@example.com".into(),
                user_name: "Alice".into(),
                user_phone: "".into(),
            },
            amounts: Amounts::default(),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: "card".into(),
            delivery_address: DeliveryAddress::default(),
            promo_code: None,
            order_notes: None,
            sub_order_ids: vec!["s-1".into(), "s-2".into()],
            fournisseur_count: 2,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            confirmed_at: None,
            delivered_at: None,
        }
    }

    fn child(id: &str, status: OrderStatus, payment: PaymentStatus) -> SubOrder {
        SubOrder {
            id: id.into(),
            master_order_id: "m-1".into(),
            fournisseur_id: format!("sup-{id}"),
            fournisseur_name: "Supplier".into(),
            customer: master().customer,
            items: vec![],
            delivery_address: DeliveryAddress::default(),
            amounts: Amounts::default(),
            status,
            payment_status: payment,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            confirmed_at: None,
            delivered_at: None,
        }
    }

    #[test]
    fn split_status_leaves_master_unchanged() {
        let children = [
            child("s-1", OrderStatus::Confirmed, PaymentStatus::Pending),
            child("s-2", OrderStatus::Preparing, PaymentStatus::Pending),
        ];
        assert_eq!(reconcile(&master(), &children, Utc::now()), None);
    }

    #[test]
    fn unanimous_status_is_adopted_and_stamped() {
        let now = Utc::now();
        let children = [
            child("s-1", OrderStatus::Confirmed, PaymentStatus::Pending),
            child("s-2", OrderStatus::Confirmed, PaymentStatus::Pending),
        ];
        let change = reconcile(&master(), &children, now).unwrap();
        assert_eq!(change.status, OrderStatus::Confirmed);
        assert_eq!(change.payment_status, PaymentStatus::Pending);
        assert_eq!(change.confirmed_at, Some(now));
    }

    #[test]
    fn payment_moves_independently_of_status() {
        let children = [
            child("s-1", OrderStatus::Delivered, PaymentStatus::Paid),
            child("s-2", OrderStatus::Preparing, PaymentStatus::Paid),
        ];
        let change = reconcile(&master(), &children, Utc::now()).unwrap();
        assert_eq!(change.status, OrderStatus::Pending);
        assert_eq!(change.payment_status, PaymentStatus::Paid);
        assert_eq!(change.delivered_at, None);
    }

    #[test]
    fn unanimous_value_equal_to_current_is_not_rewritten() {
        let children = [child("s-1", OrderStatus::Pending, PaymentStatus::Pending)];
        assert_eq!(reconcile(&master(), &children, Utc::now()), None);
    }

    #[test]
    fn unanimous_helper() {
        assert_eq!(unanimous([1, 1, 1].into_iter()), Some(1));
        assert_eq!(unanimous([1, 2].into_iter()), None);
        assert_eq!(unanimous(std::iter::empty::<i32>()), None);
    }
}
