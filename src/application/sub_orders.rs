use std::sync::Arc;

use chrono::Utc;

use crate::domain::errors::DomainError;
use crate::domain::notification::EventType;
use crate::domain::order::{OrderStatus, PaymentStatus, StatusChange, SubOrder};
use crate::domain::ports::{StatusWrite, SubOrderRepository};

use super::dispatcher::NotificationDispatcher;
use super::master_sync::MasterOrderSynchronizer;
use super::stock_ledger::StockLedger;

const MAX_STATUS_ATTEMPTS: usize = 3;

pub struct SubOrderService {
    sub_orders: Arc<dyn SubOrderRepository>,
    stock: Arc<StockLedger>,
    synchronizer: Arc<MasterOrderSynchronizer>,
    dispatcher: Arc<NotificationDispatcher>,
}

impl SubOrderService {
    pub fn new(
        sub_orders: Arc<dyn SubOrderRepository>,
        stock: Arc<StockLedger>,
        synchronizer: Arc<MasterOrderSynchronizer>,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            sub_orders,
            stock,
            synchronizer,
            dispatcher,
        }
    }

    pub async fn get(&self, id: &str) -> Result<Option<SubOrder>, DomainError> {
        self.sub_orders.find_by_id(id).await
    }

    /// Children of a master order, oldest first.
    pub async fn list_for_master(&self, master_order_id: &str) -> Result<Vec<SubOrder>, DomainError> {
        let mut orders = self.sub_orders.list_by_master(master_order_id).await?;
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(orders)
    }

    /// A supplier's sub-orders, newest first.
    pub async fn list_for_supplier(&self, fournisseur_id: &str) -> Result<Vec<SubOrder>, DomainError> {
        let mut orders = self.sub_orders.list_by_supplier(fournisseur_id).await?;
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(orders)
    }

    /// Move a sub-order to `status` (and optionally `payment_status`).
    ///
    /// The write only lands if nobody changed the status since it was read;
    /// the winner of a transition into `out_for_delivery` decrements stock
    /// for the order's items. A failed decrement is logged and does not undo
    /// the status. The master order is re-synced afterwards.
    ///
    /// Returns `Ok(None)` when the sub-order does not exist.
    pub async fn update_status(
        &self,
        id: &str,
        status: OrderStatus,
        payment_status: Option<PaymentStatus>,
    ) -> Result<Option<SubOrder>, DomainError> {
        for _ in 0..MAX_STATUS_ATTEMPTS {
            let Some(current) = self.sub_orders.find_by_id(id).await? else {
                log::warn!("Status update for unknown sub-order {}", id);
                return Ok(None);
            };

            let change = StatusChange::for_sub_order(&current, status, payment_status, Utc::now());
            let updated = match self.sub_orders.update_status(id, current.status, &change).await? {
                StatusWrite::Updated(updated) => updated,
                StatusWrite::Missing => return Ok(None),
                StatusWrite::Stale => {
                    log::debug!("Sub-order {} changed concurrently, re-reading", id);
                    continue;
                }
            };

            log::info!(
                "Sub-order {} (supplier {}) moved {} -> {}",
                updated.id,
                updated.fournisseur_id,
                current.status,
                updated.status
            );

            if status == OrderStatus::OutForDelivery && current.status != OrderStatus::OutForDelivery {
                let result = self
                    .stock
                    .decrement_stock(&StockLedger::lines_for(&updated))
                    .await;
                if !result.success {
                    log::warn!(
                        "Stock not decremented for sub-order {}: {}",
                        updated.id,
                        result.errors.join("; ")
                    );
                }
            }

            if let Err(e) = self
                .synchronizer
                .sync_master_order_status(&updated.master_order_id)
                .await
            {
                log::error!(
                    "Failed to sync master order {} after sub-order {} update: {}",
                    updated.master_order_id,
                    updated.id,
                    e
                );
            }

            return Ok(Some(updated));
        }

        Err(DomainError::Conflict(format!(
            "sub-order {id} kept changing during the status update"
        )))
    }

    /// Re-send the supplier notification for the sub-order's current state.
    /// Skips the idempotency ledger; `Ok(None)` when the sub-order is unknown.
    pub async fn notify(&self, id: &str) -> Result<Option<bool>, DomainError> {
        let Some(order) = self.sub_orders.find_by_id(id).await? else {
            return Ok(None);
        };
        log::info!("Manual notification requested for sub-order {}", id);
        Ok(Some(
            self.dispatcher
                .send_order_notification(&order, EventType::ManualTrigger)
                .await,
        ))
    }
}
