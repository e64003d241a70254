use async_trait::async_trait;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};

use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::feed::ChangeKind;
use crate::domain::order::{MasterOrder, OrderStatus, StatusChange, SubOrder};
use crate::domain::ports::{MasterOrderRepository, StatusWrite, SubOrderRepository};
use crate::schema::{master_orders, sub_order_changes, sub_orders};

use super::change_feed::lock_supplier_feed;
use super::models::{MasterOrderRow, NewChangeRow, SubOrderRow};
use super::run_blocking;

// ── Error conversions (infrastructure concern only) ──────────────────────────

impl From<DieselError> for DomainError {
    fn from(e: DieselError) -> Self {
        match e {
            DieselError::NotFound => DomainError::NotFound("row not found".into()),
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                DomainError::Conflict(info.message().to_string())
            }
            DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, info) => {
                DomainError::Unavailable(info.message().to_string())
            }
            other => DomainError::Internal(other.to_string()),
        }
    }
}

impl From<r2d2::Error> for DomainError {
    fn from(e: r2d2::Error) -> Self {
        DomainError::Unavailable(format!("database connection: {e}"))
    }
}

fn to_sub_orders(rows: Vec<SubOrderRow>) -> Result<Vec<SubOrder>, DomainError> {
    rows.into_iter().map(SubOrder::try_from).collect()
}

// ── Master orders ─────────────────────────────────────────────────────────────

pub struct DieselMasterOrderRepository {
    pool: DbPool,
}

impl DieselMasterOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MasterOrderRepository for DieselMasterOrderRepository {
    async fn create_with_sub_orders(
        &self,
        master: &MasterOrder,
        sub_orders: &[SubOrder],
    ) -> Result<(), DomainError> {
        let master_row = MasterOrderRow::from(master);
        let sub_rows = sub_orders
            .iter()
            .map(SubOrderRow::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let changes = sub_orders
            .iter()
            .map(|s| NewChangeRow::new(ChangeKind::Added, s))
            .collect::<Result<Vec<_>, _>>()?;
        let mut suppliers: Vec<String> = sub_orders.iter().map(|s| s.fournisseur_id.clone()).collect();
        suppliers.sort();
        suppliers.dedup();

        run_blocking(&self.pool, move |conn| {
            // Master, children and their feed entries land together or not at all.
            conn.transaction::<_, DomainError, _>(|conn| {
                diesel::insert_into(master_orders::table)
                    .values(&master_row)
                    .execute(conn)?;
                diesel::insert_into(sub_orders::table)
                    .values(&sub_rows)
                    .execute(conn)?;
                // Sorted, so two checkouts sharing suppliers cannot deadlock.
                for fournisseur_id in &suppliers {
                    lock_supplier_feed(conn, fournisseur_id)?;
                }
                diesel::insert_into(sub_order_changes::table)
                    .values(&changes)
                    .execute(conn)?;
                Ok(())
            })
        })
        .await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<MasterOrder>, DomainError> {
        let id = id.to_string();
        run_blocking(&self.pool, move |conn| {
            master_orders::table
                .find(&id)
                .select(MasterOrderRow::as_select())
                .first(conn)
                .optional()?
                .map(MasterOrder::try_from)
                .transpose()
        })
        .await
    }

    async fn update_status(&self, id: &str, change: &StatusChange) -> Result<Option<MasterOrder>, DomainError> {
        let id = id.to_string();
        let change = change.clone();
        run_blocking(&self.pool, move |conn| {
            diesel::update(master_orders::table.find(&id))
                .set((
                    master_orders::status.eq(change.status.as_str()),
                    master_orders::payment_status.eq(change.payment_status.as_str()),
                    master_orders::updated_at.eq(change.updated_at),
                    master_orders::confirmed_at.eq(change.confirmed_at),
                    master_orders::delivered_at.eq(change.delivered_at),
                ))
                .returning(MasterOrderRow::as_returning())
                .get_result(conn)
                .optional()?
                .map(MasterOrder::try_from)
                .transpose()
        })
        .await
    }
}

// ── Sub-orders ────────────────────────────────────────────────────────────────

pub struct DieselSubOrderRepository {
    pool: DbPool,
}

impl DieselSubOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubOrderRepository for DieselSubOrderRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<SubOrder>, DomainError> {
        let id = id.to_string();
        run_blocking(&self.pool, move |conn| {
            sub_orders::table
                .find(&id)
                .select(SubOrderRow::as_select())
                .first(conn)
                .optional()?
                .map(SubOrder::try_from)
                .transpose()
        })
        .await
    }

    async fn list_by_master(&self, master_order_id: &str) -> Result<Vec<SubOrder>, DomainError> {
        let master_order_id = master_order_id.to_string();
        run_blocking(&self.pool, move |conn| {
            let rows = sub_orders::table
                .filter(sub_orders::master_order_id.eq(&master_order_id))
                .select(SubOrderRow::as_select())
                .load(conn)?;
            to_sub_orders(rows)
        })
        .await
    }

    async fn list_by_supplier(&self, fournisseur_id: &str) -> Result<Vec<SubOrder>, DomainError> {
        let fournisseur_id = fournisseur_id.to_string();
        run_blocking(&self.pool, move |conn| {
            let rows = sub_orders::table
                .filter(sub_orders::fournisseur_id.eq(&fournisseur_id))
                .order(sub_orders::created_at.desc())
                .select(SubOrderRow::as_select())
                .load(conn)?;
            to_sub_orders(rows)
        })
        .await
    }

    async fn update_status(
        &self,
        id: &str,
        expected: OrderStatus,
        change: &StatusChange,
    ) -> Result<StatusWrite, DomainError> {
        let id = id.to_string();
        let change = change.clone();
        run_blocking(&self.pool, move |conn| {
            conn.transaction::<_, DomainError, _>(|conn| {
                let updated = diesel::update(
                    sub_orders::table
                        .filter(sub_orders::id.eq(&id))
                        .filter(sub_orders::status.eq(expected.as_str())),
                )
                .set((
                    sub_orders::status.eq(change.status.as_str()),
                    sub_orders::payment_status.eq(change.payment_status.as_str()),
                    sub_orders::updated_at.eq(change.updated_at),
                    sub_orders::confirmed_at.eq(change.confirmed_at),
                    sub_orders::delivered_at.eq(change.delivered_at),
                ))
                .returning(SubOrderRow::as_returning())
                .get_result(conn)
                .optional()?;

                let Some(row) = updated else {
                    let exists: i64 = sub_orders::table
                        .filter(sub_orders::id.eq(&id))
                        .count()
                        .get_result(conn)?;
                    return Ok(if exists > 0 {
                        StatusWrite::Stale
                    } else {
                        StatusWrite::Missing
                    });
                };

                let order = SubOrder::try_from(row)?;
                lock_supplier_feed(conn, &order.fournisseur_id)?;
                diesel::insert_into(sub_order_changes::table)
                    .values(&NewChangeRow::new(ChangeKind::Modified, &order)?)
                    .execute(conn)?;
                Ok(StatusWrite::Updated(order))
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{mpsc, Arc};
    use std::time::Duration;

    use chrono::Utc;

    use super::*;
    use crate::domain::order::{Amounts, Customer, DeliveryAddress, PaymentStatus};
    use crate::domain::ports::ChangeFeed;
    use crate::infrastructure::change_feed::PollingChangeFeed;
    use crate::infrastructure::models::ChangeRow;
    use crate::infrastructure::test_support::setup_db;

    fn order_pair(master_id: &str, sub_id: &str) -> (MasterOrder, SubOrder) {
        let now = Utc::now();
        let customer = Customer {
            user_id: "u-1".into(),
            user_email: "alice@example.com".into(),
            user_name: "Alice".into(),
            user_phone: "0600000000".into(),
        };
        let sub = SubOrder {
            id: sub_id.into(),
            master_order_id: master_id.into(),
            fournisseur_id: "sup-1".into(),
            fournisseur_name: "Green Grocer".into(),
            customer: customer.clone(),
            items: vec![],
            delivery_address: DeliveryAddress::default(),
            amounts: Amounts::default(),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
            confirmed_at: None,
            delivered_at: None,
        };
        let master = MasterOrder {
            id: master_id.into(),
            customer,
            amounts: Amounts::default(),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: "card".into(),
            delivery_address: DeliveryAddress::default(),
            promo_code: None,
            order_notes: None,
            sub_order_ids: vec![sub_id.into()],
            fournisseur_count: 1,
            created_at: now,
            updated_at: now,
            confirmed_at: None,
            delivered_at: None,
        };
        (master, sub)
    }

    #[tokio::test]
    #[ignore = "requires a container runtime"]
    async fn create_writes_master_children_and_feed_entries() {
        let (_container, pool) = setup_db().await;
        let masters = DieselMasterOrderRepository::new(pool.clone());
        let subs = DieselSubOrderRepository::new(pool.clone());
        let (master, sub) = order_pair("m-1", "s-1");

        masters.create_with_sub_orders(&master, &[sub.clone()]).await.unwrap();

        let stored = masters.find_by_id("m-1").await.unwrap().unwrap();
        assert_eq!(stored.sub_order_ids, vec!["s-1".to_string()]);
        assert_eq!(subs.list_by_master("m-1").await.unwrap().len(), 1);

        let mut conn = pool.get().unwrap();
        let changes: Vec<ChangeRow> = sub_order_changes::table
            .select(ChangeRow::as_select())
            .load(&mut conn)
            .unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, "added");
    }

    #[tokio::test]
    #[ignore = "requires a container runtime"]
    async fn duplicate_master_is_a_conflict_and_writes_nothing() {
        let (_container, pool) = setup_db().await;
        let masters = DieselMasterOrderRepository::new(pool.clone());
        let (master, sub) = order_pair("m-1", "s-1");
        masters.create_with_sub_orders(&master, &[sub]).await.unwrap();

        let (_, other_sub) = order_pair("m-1", "s-2");
        let err = masters
            .create_with_sub_orders(&master, &[other_sub])
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        let subs = DieselSubOrderRepository::new(pool);
        assert!(subs.find_by_id("s-2").await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore = "requires a container runtime"]
    async fn status_write_is_guarded_by_expected_status() {
        let (_container, pool) = setup_db().await;
        let masters = DieselMasterOrderRepository::new(pool.clone());
        let subs = DieselSubOrderRepository::new(pool.clone());
        let (master, sub) = order_pair("m-1", "s-1");
        masters.create_with_sub_orders(&master, &[sub.clone()]).await.unwrap();

        let change = StatusChange::for_sub_order(&sub, OrderStatus::Confirmed, None, Utc::now());
        let first = subs.update_status("s-1", OrderStatus::Pending, &change).await.unwrap();
        assert!(matches!(first, StatusWrite::Updated(ref o) if o.status == OrderStatus::Confirmed));

        let again = subs.update_status("s-1", OrderStatus::Pending, &change).await.unwrap();
        assert_eq!(again, StatusWrite::Stale);

        let missing = subs.update_status("nope", OrderStatus::Pending, &change).await.unwrap();
        assert_eq!(missing, StatusWrite::Missing);
    }

    #[tokio::test]
    #[ignore = "requires a container runtime"]
    async fn supplier_changes_are_numbered_in_commit_order() {
        let (_container, pool) = setup_db().await;
        let masters = DieselMasterOrderRepository::new(pool.clone());
        let subs = Arc::new(DieselSubOrderRepository::new(pool.clone()));
        let (master_a, sub_a) = order_pair("m-1", "s-1");
        let (master_b, sub_b) = order_pair("m-2", "s-2");
        masters.create_with_sub_orders(&master_a, &[sub_a.clone()]).await.unwrap();
        masters.create_with_sub_orders(&master_b, &[sub_b.clone()]).await.unwrap();

        // An open transaction appends a change for s-1 and keeps the supplier lock.
        let (appended_tx, appended_rx) = mpsc::channel();
        let (commit_tx, commit_rx) = mpsc::channel::<()>();
        let holder_pool = pool.clone();
        let holder = std::thread::spawn(move || {
            let mut conn = holder_pool.get().unwrap();
            conn.transaction::<_, DieselError, _>(|conn| {
                lock_supplier_feed(conn, "sup-1")?;
                diesel::insert_into(sub_order_changes::table)
                    .values(&NewChangeRow::new(ChangeKind::Modified, &sub_a).unwrap())
                    .execute(conn)?;
                appended_tx.send(()).unwrap();
                commit_rx.recv().unwrap();
                Ok(())
            })
            .unwrap();
        });
        appended_rx.recv().unwrap();

        let change = StatusChange::for_sub_order(&sub_b, OrderStatus::Confirmed, None, Utc::now());
        let writer = {
            let subs = subs.clone();
            tokio::spawn(async move { subs.update_status("s-2", OrderStatus::Pending, &change).await })
        };
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!writer.is_finished(), "s-2 write should wait for the open s-1 append");

        commit_tx.send(()).unwrap();
        holder.join().unwrap();
        let written = writer.await.unwrap().unwrap();
        assert!(matches!(written, StatusWrite::Updated(_)));

        let mut conn = pool.get().unwrap();
        let changes: Vec<ChangeRow> = sub_order_changes::table
            .order(sub_order_changes::seq.asc())
            .select(ChangeRow::as_select())
            .load(&mut conn)
            .unwrap();
        let tail: Vec<(&str, &str)> = changes[changes.len() - 2..]
            .iter()
            .map(|c| (c.sub_order_id.as_str(), c.kind.as_str()))
            .collect();
        assert_eq!(tail, vec![("s-1", "modified"), ("s-2", "modified")]);
    }

    #[tokio::test]
    #[ignore = "requires a container runtime"]
    async fn subscription_starts_from_current_state() {
        let (_container, pool) = setup_db().await;
        let masters = DieselMasterOrderRepository::new(pool.clone());
        let subs = DieselSubOrderRepository::new(pool.clone());
        let (master, sub) = order_pair("m-1", "s-1");
        masters.create_with_sub_orders(&master, &[sub.clone()]).await.unwrap();
        let confirm = StatusChange::for_sub_order(&sub, OrderStatus::Confirmed, None, Utc::now());
        subs.update_status("s-1", OrderStatus::Pending, &confirm).await.unwrap();

        let feed = PollingChangeFeed::new(pool.clone(), Duration::from_millis(50));
        let mut subscription = feed.subscribe("sup-1").await.unwrap();

        let snapshot = subscription.next_batch().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].kind, ChangeKind::Added);
        assert_eq!(snapshot[0].snapshot.status, OrderStatus::Confirmed);

        let confirmed = subs.find_by_id("s-1").await.unwrap().unwrap();
        let prepare = StatusChange::for_sub_order(&confirmed, OrderStatus::Preparing, None, Utc::now());
        subs.update_status("s-1", OrderStatus::Confirmed, &prepare).await.unwrap();

        let next = tokio::time::timeout(Duration::from_secs(5), subscription.next_batch())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].kind, ChangeKind::Modified);
        assert_eq!(next[0].snapshot.status, OrderStatus::Preparing);
    }
}
