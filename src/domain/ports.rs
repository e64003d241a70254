use async_trait::async_trait;

use super::errors::DomainError;
use super::feed::ChangeSubscription;
use super::notification::{
    InAppNotification, NotificationLogEntry, OutgoingEmail, ProcessedStateKey, SupplierContact,
};
use super::order::{MasterOrder, OrderStatus, StatusChange, SubOrder};
use super::stock::{StockDecrementResult, StockLine};

#[async_trait]
pub trait ProductRepository: Send + Sync + 'static {
    /// Validate and apply every line in one transaction, or write nothing.
    async fn decrement_stock(&self, lines: &[StockLine]) -> Result<StockDecrementResult, DomainError>;
    async fn stock_quantity(&self, product_id: &str) -> Result<Option<i32>, DomainError>;
}

/// Result of a status write guarded by the previously observed status.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusWrite {
    Updated(SubOrder),
    /// Another writer changed the status first.
    Stale,
    Missing,
}

#[async_trait]
pub trait SubOrderRepository: Send + Sync + 'static {
    async fn find_by_id(&self, id: &str) -> Result<Option<SubOrder>, DomainError>;
    /// Children of a master order, in no particular order.
    async fn list_by_master(&self, master_order_id: &str) -> Result<Vec<SubOrder>, DomainError>;
    async fn list_by_supplier(&self, fournisseur_id: &str) -> Result<Vec<SubOrder>, DomainError>;
    /// Write `change` only if the stored status still equals `expected`.
    /// A successful write also appends a `modified` change-feed event.
    async fn update_status(
        &self,
        id: &str,
        expected: OrderStatus,
        change: &StatusChange,
    ) -> Result<StatusWrite, DomainError>;
}

#[async_trait]
pub trait MasterOrderRepository: Send + Sync + 'static {
    /// Persist a master order with all of its sub-orders (and their `added`
    /// change events) atomically.
    async fn create_with_sub_orders(
        &self,
        master: &MasterOrder,
        sub_orders: &[SubOrder],
    ) -> Result<(), DomainError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<MasterOrder>, DomainError>;
    async fn update_status(&self, id: &str, change: &StatusChange) -> Result<Option<MasterOrder>, DomainError>;
}

#[async_trait]
pub trait ChangeFeed: Send + Sync + 'static {
    async fn subscribe(&self, fournisseur_id: &str) -> Result<ChangeSubscription, DomainError>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync + 'static {
    async fn append_log(&self, entry: &NotificationLogEntry) -> Result<(), DomainError>;
    async fn push_in_app(&self, notification: &InAppNotification) -> Result<(), DomainError>;
    async fn logs_for_order(&self, order_id: &str) -> Result<Vec<NotificationLogEntry>, DomainError>;
}

#[async_trait]
pub trait ProcessedStateRepository: Send + Sync + 'static {
    /// Atomically record `key`. Returns `false` if it was already present.
    async fn claim(&self, key: &ProcessedStateKey, fournisseur_id: &str) -> Result<bool, DomainError>;
}

#[async_trait]
pub trait SupplierDirectory: Send + Sync + 'static {
    async fn contact(&self, fournisseur_id: &str) -> Result<Option<SupplierContact>, DomainError>;
    async fn list_ids(&self) -> Result<Vec<String>, DomainError>;
}

/// Hand-off to the external mail relay. `Ok` means the relay accepted it.
#[async_trait]
pub trait MailSender: Send + Sync + 'static {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), DomainError>;
}
