//! Detached delivery of customer status emails.
//!
//! The synchronizer only enqueues; a background worker sends with bounded
//! retry so that a slow or failing relay never holds up a status mutation.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::domain::errors::DomainError;
use crate::domain::order::MasterOrder;

use super::dispatcher::NotificationDispatcher;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Clone)]
pub struct NotificationQueue {
    tx: mpsc::Sender<MasterOrder>,
}

impl NotificationQueue {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<MasterOrder>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Never waits. Returns `false` when the job had to be dropped.
    pub fn enqueue(&self, order: MasterOrder) -> bool {
        match self.tx.try_send(order) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(order)) => {
                log::warn!("Notification queue full, dropping email for order {}", order.id);
                false
            }
            Err(mpsc::error::TrySendError::Closed(order)) => {
                log::warn!("Notification worker stopped, dropping email for order {}", order.id);
                false
            }
        }
    }
}

pub struct CustomerNotificationWorker {
    dispatcher: Arc<NotificationDispatcher>,
    retry: RetryPolicy,
}

impl CustomerNotificationWorker {
    pub fn new(dispatcher: Arc<NotificationDispatcher>, retry: RetryPolicy) -> Self {
        Self { dispatcher, retry }
    }

    /// Runs until every queue handle is dropped.
    pub async fn run(self, mut rx: mpsc::Receiver<MasterOrder>) {
        log::info!("Customer notification worker started");
        while let Some(order) = rx.recv().await {
            let outcome = self.deliver(&order).await;
            self.dispatcher.record_customer_outcome(&order, &outcome).await;
        }
        log::info!("Notification queue closed, worker stopping");
    }

    async fn deliver(&self, order: &MasterOrder) -> Result<(), DomainError> {
        let mut delay = self.retry.initial_delay;
        let mut attempt = 1;
        loop {
            match self.dispatcher.send_customer_status_email(order).await {
                Ok(()) => {
                    log::info!("Customer email sent for order {} ({})", order.id, order.status);
                    return Ok(());
                }
                Err(e) if is_transient(&e) && attempt < self.retry.max_attempts => {
                    log::warn!(
                        "Customer email for order {} failed (attempt {}/{}): {}; retrying in {:?}",
                        order.id,
                        attempt,
                        self.retry.max_attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => {
                    log::error!("Customer email for order {} not sent: {}", order.id, e);
                    return Err(e);
                }
            }
        }
    }
}

fn is_transient(e: &DomainError) -> bool {
    matches!(e, DomainError::Unavailable(_) | DomainError::Internal(_))
}
