pub mod change_feed;
pub mod mail_relay;
pub mod memory;
pub mod models;
pub mod notification_repo;
pub mod order_repo;
pub mod product_repo;

use std::sync::Arc;
use std::time::Duration;

use diesel::pg::PgConnection;

use crate::application::Ports;
use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::ports::MailSender;

use change_feed::PollingChangeFeed;
use notification_repo::{DieselNotificationRepository, DieselSupplierDirectory};
use order_repo::{DieselMasterOrderRepository, DieselSubOrderRepository};
use product_repo::DieselProductRepository;

/// Run a Diesel call on the blocking pool with a pooled connection.
pub(crate) async fn run_blocking<T, F>(pool: &DbPool, f: F) -> Result<T, DomainError>
where
    T: Send + 'static,
    F: FnOnce(&mut PgConnection) -> Result<T, DomainError> + Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        f(&mut conn)
    })
    .await?
}

/// Ports backed by Postgres; mail goes through `mailer`.
pub fn postgres_ports(pool: DbPool, feed_poll_interval: Duration, mailer: Arc<dyn MailSender>) -> Ports {
    let notifications = Arc::new(DieselNotificationRepository::new(pool.clone()));
    Ports {
        products: Arc::new(DieselProductRepository::new(pool.clone())),
        sub_orders: Arc::new(DieselSubOrderRepository::new(pool.clone())),
        masters: Arc::new(DieselMasterOrderRepository::new(pool.clone())),
        feed: Arc::new(PollingChangeFeed::new(pool.clone(), feed_poll_interval)),
        notifications: notifications.clone(),
        processed: notifications,
        suppliers: Arc::new(DieselSupplierDirectory::new(pool)),
        mailer,
    }
}
