use std::sync::Arc;

use crate::domain::errors::DomainError;
use crate::domain::order::SubOrder;
use crate::domain::ports::ProductRepository;
use crate::domain::stock::{StockDecrementResult, StockLine};

/// All-or-nothing inventory decrements.
///
/// Store failures are folded into the error list; nothing is retried here.
pub struct StockLedger {
    products: Arc<dyn ProductRepository>,
}

impl StockLedger {
    pub fn new(products: Arc<dyn ProductRepository>) -> Self {
        Self { products }
    }

    pub async fn decrement_stock(&self, lines: &[StockLine]) -> StockDecrementResult {
        match self.try_decrement_stock(lines).await {
            Ok(result) => result,
            Err(e) => {
                log::error!("Stock decrement failed: {}", e);
                StockDecrementResult::rejected(vec![format!("Stock update failed: {e}")])
            }
        }
    }

    /// Like [`Self::decrement_stock`], but a store failure is returned as an
    /// error instead of being folded into a refused result.
    pub async fn try_decrement_stock(&self, lines: &[StockLine]) -> Result<StockDecrementResult, DomainError> {
        if lines.is_empty() {
            return Ok(StockDecrementResult::applied());
        }

        let result = self.products.decrement_stock(lines).await?;
        if !result.success {
            log::warn!("Stock decrement rejected: {}", result.errors.join("; "));
        }
        Ok(result)
    }

    pub async fn decrement_one(&self, product_id: &str, quantity: i32) -> StockDecrementResult {
        self.decrement_stock(&[StockLine::new(product_id, quantity)])
            .await
    }

    pub fn lines_for(order: &SubOrder) -> Vec<StockLine> {
        order
            .items
            .iter()
            .map(|item| StockLine::new(item.product_id.clone(), item.quantity))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::memory::MemoryStore;

    fn ledger_with(levels: &[(&str, i32)]) -> (Arc<MemoryStore>, StockLedger) {
        let store = Arc::new(MemoryStore::new());
        for (id, qty) in levels {
            store.put_product(*id, *qty);
        }
        let ledger = StockLedger::new(store.clone());
        (store, ledger)
    }

    #[tokio::test]
    async fn shortage_on_one_line_leaves_every_product_untouched() {
        let (store, ledger) = ledger_with(&[("A", 10), ("B", 3)]);

        let result = ledger
            .decrement_stock(&[StockLine::new("A", 5), StockLine::new("B", 20)])
            .await;

        assert!(!result.success);
        assert!(result.errors.iter().any(|e| e.contains("B")));
        assert_eq!(store.stock_quantity("A").await.unwrap(), Some(10));
        assert_eq!(store.stock_quantity("B").await.unwrap(), Some(3));
        assert_eq!(store.stock_writes(), 0);
    }

    #[tokio::test]
    async fn valid_batch_is_applied() {
        let (store, ledger) = ledger_with(&[("A", 10), ("B", 3)]);

        let result = ledger
            .decrement_stock(&[StockLine::new("A", 5), StockLine::new("B", 3)])
            .await;

        assert_eq!(result, StockDecrementResult::applied());
        assert_eq!(store.stock_quantity("A").await.unwrap(), Some(5));
        assert_eq!(store.stock_quantity("B").await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn single_item_variant() {
        let (store, ledger) = ledger_with(&[("A", 2)]);

        assert!(!ledger.decrement_one("A", 3).await.success);
        assert!(ledger.decrement_one("A", 2).await.success);
        assert_eq!(store.stock_quantity("A").await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn store_outage_is_folded_into_errors() {
        let (store, ledger) = ledger_with(&[("A", 10)]);
        store.set_offline(true);

        let result = ledger.decrement_one("A", 1).await;

        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("unavailable") || result.errors[0].contains("Unavailable"));
    }

    #[tokio::test]
    async fn outage_and_refusal_are_told_apart() {
        let (store, ledger) = ledger_with(&[("A", 1)]);

        let refused = ledger.try_decrement_stock(&[StockLine::new("A", 5)]).await.unwrap();
        assert!(!refused.success);

        store.set_offline(true);
        let err = ledger.try_decrement_stock(&[StockLine::new("A", 1)]).await.unwrap_err();
        assert!(matches!(err, DomainError::Unavailable(_)));
    }
}
