use async_trait::async_trait;
use diesel::prelude::*;

use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::notification::{
    InAppNotification, NotificationLogEntry, ProcessedStateKey, SupplierContact,
};
use crate::domain::ports::{NotificationRepository, ProcessedStateRepository, SupplierDirectory};
use crate::schema::{notification_logs, notifications, processed_order_states, suppliers};

use super::models::{NewNotificationRow, NewProcessedStateRow, NotificationLogRow, SupplierRow};
use super::run_blocking;

/// Notification audit log, in-app inbox and processed-state ledger.
pub struct DieselNotificationRepository {
    pool: DbPool,
}

impl DieselNotificationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for DieselNotificationRepository {
    async fn append_log(&self, entry: &NotificationLogEntry) -> Result<(), DomainError> {
        let row = NotificationLogRow::from(entry);
        run_blocking(&self.pool, move |conn| {
            diesel::insert_into(notification_logs::table)
                .values(&row)
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn push_in_app(&self, notification: &InAppNotification) -> Result<(), DomainError> {
        let row = NewNotificationRow::from(notification);
        run_blocking(&self.pool, move |conn| {
            diesel::insert_into(notifications::table)
                .values(&row)
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn logs_for_order(&self, order_id: &str) -> Result<Vec<NotificationLogEntry>, DomainError> {
        let order_id = order_id.to_string();
        run_blocking(&self.pool, move |conn| {
            notification_logs::table
                .filter(notification_logs::order_id.eq(&order_id))
                .order(notification_logs::created_at.asc())
                .select(NotificationLogRow::as_select())
                .load(conn)?
                .into_iter()
                .map(NotificationLogEntry::try_from)
                .collect()
        })
        .await
    }
}

#[async_trait]
impl ProcessedStateRepository for DieselNotificationRepository {
    async fn claim(&self, key: &ProcessedStateKey, fournisseur_id: &str) -> Result<bool, DomainError> {
        let row = NewProcessedStateRow {
            order_id: key.order_id.clone(),
            status: key.status.as_str().to_string(),
            payment_status: key.payment_status.as_str().to_string(),
            fournisseur_id: fournisseur_id.to_string(),
        };
        run_blocking(&self.pool, move |conn| {
            let inserted = diesel::insert_into(processed_order_states::table)
                .values(&row)
                .on_conflict_do_nothing()
                .execute(conn)?;
            Ok(inserted == 1)
        })
        .await
    }
}

pub struct DieselSupplierDirectory {
    pool: DbPool,
}

impl DieselSupplierDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SupplierDirectory for DieselSupplierDirectory {
    async fn contact(&self, fournisseur_id: &str) -> Result<Option<SupplierContact>, DomainError> {
        let fournisseur_id = fournisseur_id.to_string();
        run_blocking(&self.pool, move |conn| {
            Ok(suppliers::table
                .find(&fournisseur_id)
                .select(SupplierRow::as_select())
                .first(conn)
                .optional()?
                .map(SupplierContact::from))
        })
        .await
    }

    async fn list_ids(&self) -> Result<Vec<String>, DomainError> {
        run_blocking(&self.pool, |conn| {
            Ok(suppliers::table
                .select(suppliers::id)
                .order(suppliers::id.asc())
                .load::<String>(conn)?)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bigdecimal::BigDecimal;
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::domain::notification::{EventType, NotificationStatus};
    use crate::domain::order::{OrderStatus, PaymentStatus};
    use crate::infrastructure::test_support::setup_db;

    #[tokio::test]
    #[ignore = "requires a container runtime"]
    async fn concurrent_claims_insert_once() {
        let (_container, pool) = setup_db().await;
        let repo = Arc::new(DieselNotificationRepository::new(pool));
        let key = ProcessedStateKey::new("s-1", OrderStatus::Confirmed, PaymentStatus::Pending);

        let mut tasks = Vec::new();
        for _ in 0..6 {
            let repo = repo.clone();
            let key = key.clone();
            tasks.push(tokio::spawn(async move { repo.claim(&key, "sup-1").await.unwrap() }));
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
    #[ignore = "requires a container runtime"]
    async fn log_entries_are_read_back_per_order() {
        let (_container, pool) = setup_db().await;
        let repo = DieselNotificationRepository::new(pool);
        let entry = NotificationLogEntry {
            id: Uuid::new_v4(),
            order_id: "s-1".into(),
            fournisseur_id: Some("sup-1".into()),
            event_type: EventType::NewOrder,
            notification_status: NotificationStatus::Failed,
            error_message: Some("Not found: no contact".into()),
            order_status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            recipient_email: None,
            order_total: BigDecimal::from(12),
            created_at: Utc::now(),
        };

        repo.append_log(&entry).await.unwrap();

        let logs = repo.logs_for_order("s-1").await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].event_type, EventType::NewOrder);
        assert_eq!(logs[0].notification_status, NotificationStatus::Failed);
        assert!(repo.logs_for_order("other").await.unwrap().is_empty());
    }

    #[tokio::test]
    #[ignore = "requires a container runtime"]
    async fn supplier_directory_lists_sorted_ids() {
        let (_container, pool) = setup_db().await;
        {
            let mut conn = pool.get().unwrap();
            for id in ["sup-b", "sup-a"] {
                diesel::insert_into(suppliers::table)
                    .values(&SupplierRow {
                        id: id.into(),
                        display_name: id.into(),
                        email: format!("{id}@example.com"),
                        business_name: None,
                        phone: None,
                        address: None,
                    })
                    .execute(&mut conn)
                    .unwrap();
            }
        }
        let directory = DieselSupplierDirectory::new(pool);

        assert_eq!(directory.list_ids().await.unwrap(), vec!["sup-a", "sup-b"]);
        let contact = directory.contact("sup-a").await.unwrap().unwrap();
        assert_eq!(contact.email, "sup-a@example.com");
        assert!(directory.contact("sup-z").await.unwrap().is_none());
    }
}
