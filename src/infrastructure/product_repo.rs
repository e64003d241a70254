use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;

use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::ports::ProductRepository;
use crate::domain::stock::{plan_decrement, StockDecrementResult, StockLine};
use crate::schema::products;

use super::run_blocking;

pub struct DieselProductRepository {
    pool: DbPool,
}

impl DieselProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductRepository for DieselProductRepository {
    async fn decrement_stock(&self, lines: &[StockLine]) -> Result<StockDecrementResult, DomainError> {
        let lines = lines.to_vec();
        run_blocking(&self.pool, move |conn| {
            conn.transaction::<_, DomainError, _>(|conn| {
                let mut ids: Vec<String> = lines.iter().map(|l| l.product_id.clone()).collect();
                ids.sort_unstable();
                ids.dedup();

                // Row locks are taken in id order to keep concurrent batches from deadlocking.
                let stock: HashMap<String, i32> = products::table
                    .filter(products::id.eq_any(ids))
                    .order(products::id)
                    .select((products::id, products::stock_quantity))
                    .for_update()
                    .load::<(String, i32)>(conn)?
                    .into_iter()
                    .collect();

                let writes = match plan_decrement(&lines, &stock) {
                    Ok(writes) => writes,
                    Err(errors) => return Ok(StockDecrementResult::rejected(errors)),
                };
                let now = Utc::now();
                for write in writes {
                    diesel::update(products::table.find(&write.product_id))
                        .set((
                            products::stock_quantity.eq(write.new_quantity),
                            products::updated_at.eq(now),
                        ))
                        .execute(conn)?;
                }
                Ok(StockDecrementResult::applied())
            })
        })
        .await
    }

    async fn stock_quantity(&self, product_id: &str) -> Result<Option<i32>, DomainError> {
        let product_id = product_id.to_string();
        run_blocking(&self.pool, move |conn| {
            Ok(products::table
                .find(&product_id)
                .select(products::stock_quantity)
                .first::<i32>(conn)
                .optional()?)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::test_support::setup_db;

    fn seed(pool: &DbPool, rows: &[(&str, i32)]) {
        let mut conn = pool.get().unwrap();
        for (id, qty) in rows {
            diesel::insert_into(products::table)
                .values((
                    products::id.eq(*id),
                    products::name.eq(*id),
                    products::stock_quantity.eq(*qty),
                ))
                .execute(&mut conn)
                .unwrap();
        }
    }

    #[tokio::test]
    #[ignore = "requires a container runtime"]
    async fn decrement_is_all_or_nothing() {
        let (_container, pool) = setup_db().await;
        seed(&pool, &[("A", 5), ("B", 1)]);
        let repo = DieselProductRepository::new(pool);

        let result = repo
            .decrement_stock(&[StockLine::new("A", 2), StockLine::new("B", 3)])
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(repo.stock_quantity("A").await.unwrap(), Some(5));
        assert_eq!(repo.stock_quantity("B").await.unwrap(), Some(1));
    }

    #[tokio::test]
    #[ignore = "requires a container runtime"]
    async fn concurrent_decrements_never_oversell() {
        let (_container, pool) = setup_db().await;
        seed(&pool, &[("A", 3)]);
        let repo = std::sync::Arc::new(DieselProductRepository::new(pool));

        let mut tasks = Vec::new();
        for _ in 0..5 {
            let repo = repo.clone();
            tasks.push(tokio::spawn(async move {
                repo.decrement_stock(&[StockLine::new("A", 1)]).await.unwrap()
            }));
        }
        let mut applied = 0;
        for task in tasks {
            if task.await.unwrap().success {
                applied += 1;
            }
        }

        assert_eq!(applied, 3);
        assert_eq!(repo.stock_quantity("A").await.unwrap(), Some(0));
    }
}
