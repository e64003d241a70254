//! In-process implementations of every port.
//!
//! Used when no `DATABASE_URL`/`MAIL_RELAY_URL` is configured and by the test
//! suites. The change feed pushes one batch per write to each subscriber of
//! the sub-order's supplier and starts every subscription with a snapshot of
//! the supplier's existing sub-orders, like a document-store listener does.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::errors::DomainError;
use crate::domain::feed::{ChangeBatch, ChangeEvent, ChangeKind, ChangeSubscription};
use crate::domain::notification::{
    InAppNotification, NotificationLogEntry, OutgoingEmail, ProcessedStateKey, SupplierContact,
};
use crate::domain::order::{MasterOrder, OrderStatus, StatusChange, SubOrder};
use crate::domain::ports::{
    ChangeFeed, MailSender, MasterOrderRepository, NotificationRepository,
    ProcessedStateRepository, ProductRepository, StatusWrite, SubOrderRepository,
    SupplierDirectory,
};
use crate::domain::stock::{plan_decrement, StockDecrementResult, StockLine};

#[derive(Default)]
struct State {
    products: HashMap<String, i32>,
    stock_writes: usize,
    masters: HashMap<String, MasterOrder>,
    sub_orders: HashMap<String, SubOrder>,
    logs: Vec<NotificationLogEntry>,
    in_app: Vec<InAppNotification>,
    processed: HashMap<ProcessedStateKey, String>,
    suppliers: HashMap<String, SupplierContact>,
    subscribers: Vec<(String, mpsc::UnboundedSender<ChangeBatch>)>,
    offline: bool,
}

impl State {
    fn check_online(&self) -> Result<(), DomainError> {
        if self.offline {
            return Err(DomainError::Unavailable("memory store is offline".into()));
        }
        Ok(())
    }

    fn publish(&mut self, batch: ChangeBatch) {
        let Some(fournisseur_id) = batch.first().map(|e| e.snapshot.fournisseur_id.clone()) else {
            return;
        };
        self.subscribers.retain(|(supplier, tx)| {
            if *supplier != fournisseur_id {
                return !tx.is_closed();
            }
            tx.send(batch.clone()).is_ok()
        });
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, State>, DomainError> {
        self.state
            .lock()
            .map_err(|_| DomainError::Internal("memory store lock poisoned".into()))
    }

    fn inspect<R>(&self, f: impl FnOnce(&State) -> R) -> R {
        match self.state.lock() {
            Ok(state) => f(&state),
            Err(poisoned) => f(&poisoned.into_inner()),
        }
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        match self.state.lock() {
            Ok(mut state) => f(&mut state),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    pub fn put_product(&self, id: impl Into<String>, stock_quantity: i32) {
        self.mutate(|s| {
            s.products.insert(id.into(), stock_quantity);
        });
    }

    pub fn put_supplier(&self, contact: SupplierContact) {
        self.mutate(|s| {
            s.suppliers.insert(contact.id.clone(), contact);
        });
    }

    /// Number of product rows written since creation.
    pub fn stock_writes(&self) -> usize {
        self.inspect(|s| s.stock_writes)
    }

    pub fn notification_logs(&self) -> Vec<NotificationLogEntry> {
        self.inspect(|s| s.logs.clone())
    }

    pub fn in_app_notifications(&self) -> Vec<InAppNotification> {
        self.inspect(|s| s.in_app.clone())
    }

    pub fn processed_states(&self) -> usize {
        self.inspect(|s| s.processed.len())
    }

    /// Simulate an outage: every port call fails with `Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.mutate(|s| s.offline = offline);
    }

    /// Push the current snapshot of a sub-order again, as a listener
    /// reconnect would.
    pub fn redeliver(&self, sub_order_id: &str, kind: ChangeKind) -> bool {
        self.mutate(|s| {
            let Some(snapshot) = s.sub_orders.get(sub_order_id).cloned() else {
                return false;
            };
            s.publish(vec![ChangeEvent { kind, snapshot }]);
            true
        })
    }
}

#[async_trait]
impl ProductRepository for MemoryStore {
    async fn decrement_stock(&self, lines: &[StockLine]) -> Result<StockDecrementResult, DomainError> {
        let mut state = self.state()?;
        state.check_online()?;
        match plan_decrement(lines, &state.products) {
            Err(errors) => Ok(StockDecrementResult::rejected(errors)),
            Ok(writes) => {
                for write in writes {
                    state.products.insert(write.product_id, write.new_quantity);
                    state.stock_writes += 1;
                }
                Ok(StockDecrementResult::applied())
            }
        }
    }

    async fn stock_quantity(&self, product_id: &str) -> Result<Option<i32>, DomainError> {
        let state = self.state()?;
        state.check_online()?;
        Ok(state.products.get(product_id).copied())
    }
}

#[async_trait]
impl SubOrderRepository for MemoryStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<SubOrder>, DomainError> {
        let state = self.state()?;
        state.check_online()?;
        Ok(state.sub_orders.get(id).cloned())
    }

    async fn list_by_master(&self, master_order_id: &str) -> Result<Vec<SubOrder>, DomainError> {
        let state = self.state()?;
        state.check_online()?;
        Ok(state
            .sub_orders
            .values()
            .filter(|o| o.master_order_id == master_order_id)
            .cloned()
            .collect())
    }

    async fn list_by_supplier(&self, fournisseur_id: &str) -> Result<Vec<SubOrder>, DomainError> {
        let state = self.state()?;
        state.check_online()?;
        Ok(state
            .sub_orders
            .values()
            .filter(|o| o.fournisseur_id == fournisseur_id)
            .cloned()
            .collect())
    }

    async fn update_status(
        &self,
        id: &str,
        expected: OrderStatus,
        change: &StatusChange,
    ) -> Result<StatusWrite, DomainError> {
        let mut state = self.state()?;
        state.check_online()?;
        let Some(order) = state.sub_orders.get_mut(id) else {
            return Ok(StatusWrite::Missing);
        };
        if order.status != expected {
            return Ok(StatusWrite::Stale);
        }
        change.apply_to_sub_order(order);
        let snapshot = order.clone();
        state.publish(vec![ChangeEvent {
            kind: ChangeKind::Modified,
            snapshot: snapshot.clone(),
        }]);
        Ok(StatusWrite::Updated(snapshot))
    }
}

#[async_trait]
impl MasterOrderRepository for MemoryStore {
    async fn create_with_sub_orders(
        &self,
        master: &MasterOrder,
        sub_orders: &[SubOrder],
    ) -> Result<(), DomainError> {
        let mut state = self.state()?;
        state.check_online()?;
        if state.masters.contains_key(&master.id) {
            return Err(DomainError::Conflict(format!("master order {} exists", master.id)));
        }
        state.masters.insert(master.id.clone(), master.clone());
        for sub in sub_orders {
            state.sub_orders.insert(sub.id.clone(), sub.clone());
            state.publish(vec![ChangeEvent {
                kind: ChangeKind::Added,
                snapshot: sub.clone(),
            }]);
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<MasterOrder>, DomainError> {
        let state = self.state()?;
        state.check_online()?;
        Ok(state.masters.get(id).cloned())
    }

    async fn update_status(&self, id: &str, change: &StatusChange) -> Result<Option<MasterOrder>, DomainError> {
        let mut state = self.state()?;
        state.check_online()?;
        Ok(state.masters.get_mut(id).map(|master| {
            change.apply_to_master(master);
            master.clone()
        }))
    }
}

#[async_trait]
impl ChangeFeed for MemoryStore {
    async fn subscribe(&self, fournisseur_id: &str) -> Result<ChangeSubscription, DomainError> {
        let mut state = self.state()?;
        state.check_online()?;
        let (tx, rx) = mpsc::unbounded_channel();

        let mut initial: Vec<SubOrder> = state
            .sub_orders
            .values()
            .filter(|o| o.fournisseur_id == fournisseur_id)
            .cloned()
            .collect();
        initial.sort_by_key(|o| o.created_at);
        let snapshot: ChangeBatch = initial
            .into_iter()
            .map(|snapshot| ChangeEvent {
                kind: ChangeKind::Added,
                snapshot,
            })
            .collect();
        if !snapshot.is_empty() {
            // The receiver is alive right here, so this cannot fail.
            let _ = tx.send(snapshot);
        }

        state.subscribers.push((fournisseur_id.to_string(), tx));
        Ok(ChangeSubscription::new(rx))
    }
}

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn append_log(&self, entry: &NotificationLogEntry) -> Result<(), DomainError> {
        let mut state = self.state()?;
        state.check_online()?;
        state.logs.push(entry.clone());
        Ok(())
    }

    async fn push_in_app(&self, notification: &InAppNotification) -> Result<(), DomainError> {
        let mut state = self.state()?;
        state.check_online()?;
        state.in_app.push(notification.clone());
        Ok(())
    }

    async fn logs_for_order(&self, order_id: &str) -> Result<Vec<NotificationLogEntry>, DomainError> {
        let state = self.state()?;
        state.check_online()?;
        Ok(state
            .logs
            .iter()
            .filter(|e| e.order_id == order_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ProcessedStateRepository for MemoryStore {
    async fn claim(&self, key: &ProcessedStateKey, fournisseur_id: &str) -> Result<bool, DomainError> {
        let mut state = self.state()?;
        state.check_online()?;
        if state.processed.contains_key(key) {
            return Ok(false);
        }
        state.processed.insert(key.clone(), fournisseur_id.to_string());
        Ok(true)
    }
}

#[async_trait]
impl SupplierDirectory for MemoryStore {
    async fn contact(&self, fournisseur_id: &str) -> Result<Option<SupplierContact>, DomainError> {
        let state = self.state()?;
        state.check_online()?;
        Ok(state.suppliers.get(fournisseur_id).cloned())
    }

    async fn list_ids(&self) -> Result<Vec<String>, DomainError> {
        let state = self.state()?;
        state.check_online()?;
        let mut ids: Vec<String> = state.suppliers.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MailerMode {
    #[default]
    Accept,
    Reject,
    Unreachable,
}

/// Mail sink that records every accepted email instead of relaying it.
#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    attempts: Mutex<usize>,
    mode: Mutex<MailerMode>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mode(&self, mode: MailerMode) {
        if let Ok(mut current) = self.mode.lock() {
            *current = mode;
        }
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.lock().map(|a| *a).unwrap_or_default()
    }
}

#[async_trait]
impl MailSender for MemoryMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), DomainError> {
        if let Ok(mut attempts) = self.attempts.lock() {
            *attempts += 1;
        }
        let mode = self.mode.lock().map(|m| *m).unwrap_or_default();
        match mode {
            MailerMode::Accept => {
                log::debug!("Captured email to {} ({})", email.to_email, email.subject);
                self.sent
                    .lock()
                    .map_err(|_| DomainError::Internal("mailer lock poisoned".into()))?
                    .push(email.clone());
                Ok(())
            }
            MailerMode::Reject => Err(DomainError::Rejected("relay refused the message".into())),
            MailerMode::Unreachable => Err(DomainError::Unavailable("relay unreachable".into())),
        }
    }
}
