use std::sync::Arc;

use crate::domain::errors::DomainError;
use crate::domain::notification::ProcessedStateKey;
use crate::domain::order::SubOrder;
use crate::domain::ports::ProcessedStateRepository;

/// Remembers which sub-order states already triggered a notification.
pub struct IdempotencyLedger {
    states: Arc<dyn ProcessedStateRepository>,
}

impl IdempotencyLedger {
    pub fn new(states: Arc<dyn ProcessedStateRepository>) -> Self {
        Self { states }
    }

    pub fn key_for(order: &SubOrder) -> ProcessedStateKey {
        ProcessedStateKey::new(order.id.clone(), order.status, order.payment_status)
    }

    /// Mark `key` as processed. `Ok(true)` means the caller won the claim
    /// and owns the notification; `Ok(false)` means it was handled before.
    pub async fn mark_processed(
        &self,
        key: &ProcessedStateKey,
        fournisseur_id: &str,
    ) -> Result<bool, DomainError> {
        let claimed = self.states.claim(key, fournisseur_id).await?;
        if !claimed {
            log::debug!("State {} already processed", key);
        }
        Ok(claimed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{OrderStatus, PaymentStatus};
    use crate::infrastructure::memory::MemoryStore;

    #[tokio::test]
    async fn concurrent_claims_have_one_winner() {
        let ledger = Arc::new(IdempotencyLedger::new(Arc::new(MemoryStore::new())));
        let key = ProcessedStateKey::new("sub-9", OrderStatus::Delivered, PaymentStatus::Paid);

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let ledger = ledger.clone();
            let key = key.clone();
            tasks.push(tokio::spawn(async move {
                ledger.mark_processed(&key, "sup-1").await.unwrap()
            }));
        }
        let mut winners = 0;
        for task in tasks {
            if task.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn different_payment_status_is_a_new_state() {
        let ledger = IdempotencyLedger::new(Arc::new(MemoryStore::new()));
        let pending = ProcessedStateKey::new("sub-1", OrderStatus::Delivered, PaymentStatus::Pending);
        let paid = ProcessedStateKey::new("sub-1", OrderStatus::Delivered, PaymentStatus::Paid);

        assert!(ledger.mark_processed(&pending, "sup-1").await.unwrap());
        assert!(ledger.mark_processed(&paid, "sup-1").await.unwrap());
        assert!(!ledger.mark_processed(&paid, "sup-1").await.unwrap());
    }
}
