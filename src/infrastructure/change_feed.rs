//! Change feed over the `sub_order_changes` outbox table.
//!
//! Writers take the supplier's feed lock before appending, so within one
//! supplier sequence numbers are handed out in commit order and a poller that
//! only reads rows past its cursor cannot skip a late commit. A subscription
//! reads its cursor first, then reports every current sub-order of the
//! supplier as `added`; anything committed in between shows up twice and is
//! absorbed by the idempotency ledger.

use std::time::Duration;

use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::sql_types::Text;
use tokio::sync::mpsc;

use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::feed::{ChangeBatch, ChangeEvent, ChangeKind, ChangeSubscription};
use crate::domain::order::SubOrder;
use crate::domain::ports::ChangeFeed;
use crate::schema::{sub_order_changes, sub_orders};

use super::models::{ChangeRow, SubOrderRow};
use super::run_blocking;

const POLL_LIMIT: i64 = 500;

pub struct PollingChangeFeed {
    pool: DbPool,
    interval: Duration,
}

impl PollingChangeFeed {
    pub fn new(pool: DbPool, interval: Duration) -> Self {
        Self { pool, interval }
    }
}

/// Holds the supplier's feed lock until the surrounding transaction ends.
/// Must run inside a transaction, before the outbox insert.
pub(crate) fn lock_supplier_feed(conn: &mut PgConnection, fournisseur_id: &str) -> QueryResult<()> {
    diesel::sql_query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind::<Text, _>(fournisseur_id)
        .execute(conn)?;
    Ok(())
}

async fn fetch_since(pool: &DbPool, fournisseur_id: &str, after: i64) -> Result<Vec<ChangeRow>, DomainError> {
    let fournisseur_id = fournisseur_id.to_string();
    run_blocking(pool, move |conn| {
        Ok(sub_order_changes::table
            .filter(sub_order_changes::fournisseur_id.eq(&fournisseur_id))
            .filter(sub_order_changes::seq.gt(after))
            .order(sub_order_changes::seq.asc())
            .limit(POLL_LIMIT)
            .select(ChangeRow::as_select())
            .load(conn)?)
    })
    .await
}

/// Last sequence number written for the supplier and its current sub-orders,
/// read in that order.
async fn load_start(pool: &DbPool, fournisseur_id: &str) -> Result<(i64, Vec<SubOrderRow>), DomainError> {
    let fournisseur_id = fournisseur_id.to_string();
    run_blocking(pool, move |conn| {
        let cursor: Option<i64> = sub_order_changes::table
            .filter(sub_order_changes::fournisseur_id.eq(&fournisseur_id))
            .select(diesel::dsl::max(sub_order_changes::seq))
            .get_result(conn)?;
        let rows = sub_orders::table
            .filter(sub_orders::fournisseur_id.eq(&fournisseur_id))
            .order((sub_orders::created_at.asc(), sub_orders::id.asc()))
            .select(SubOrderRow::as_select())
            .load(conn)?;
        Ok((cursor.unwrap_or(0), rows))
    })
    .await
}

fn to_events(fournisseur_id: &str, rows: Vec<ChangeRow>) -> ChangeBatch {
    rows.into_iter()
        .filter_map(|row| {
            let seq = row.seq;
            match ChangeEvent::try_from(row) {
                Ok(event) => Some(event),
                Err(e) => {
                    log::warn!(
                        "Skipping unreadable change {} for supplier {}: {}",
                        seq,
                        fournisseur_id,
                        e
                    );
                    None
                }
            }
        })
        .collect()
}

/// Current sub-orders as `added` events.
fn snapshot_events(fournisseur_id: &str, rows: Vec<SubOrderRow>) -> ChangeBatch {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.id.clone();
            match SubOrder::try_from(row) {
                Ok(snapshot) => Some(ChangeEvent {
                    kind: ChangeKind::Added,
                    snapshot,
                }),
                Err(e) => {
                    log::warn!(
                        "Skipping unreadable sub-order {} for supplier {}: {}",
                        id,
                        fournisseur_id,
                        e
                    );
                    None
                }
            }
        })
        .collect()
}

#[async_trait]
impl ChangeFeed for PollingChangeFeed {
    async fn subscribe(&self, fournisseur_id: &str) -> Result<ChangeSubscription, DomainError> {
        let (mut cursor, rows) = load_start(&self.pool, fournisseur_id).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let snapshot = snapshot_events(fournisseur_id, rows);
        if !snapshot.is_empty() && tx.send(snapshot).is_err() {
            return Err(DomainError::Internal("change feed receiver dropped".into()));
        }

        let pool = self.pool.clone();
        let interval = self.interval;
        let fournisseur_id = fournisseur_id.to_string();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    _ = ticker.tick() => {}
                }
                match fetch_since(&pool, &fournisseur_id, cursor).await {
                    Ok(rows) => {
                        let Some(last) = rows.last().map(|row| row.seq) else {
                            continue;
                        };
                        cursor = last;
                        if tx.send(to_events(&fournisseur_id, rows)).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        log::warn!("Change feed poll for supplier {} failed: {}", fournisseur_id, e)
                    }
                }
            }
            log::debug!("Change feed poller for supplier {} stopped", fournisseur_id);
        });

        Ok(ChangeSubscription::new(rx))
    }
}
