pub mod dispatcher;
pub mod idempotency;
pub mod listener;
pub mod master_sync;
pub mod notification_queue;
pub mod order_service;
pub mod stock_ledger;
pub mod sub_orders;
pub mod templates;

use std::sync::Arc;

use crate::domain::errors::DomainError;
use crate::domain::ports::{
    ChangeFeed, MailSender, MasterOrderRepository, NotificationRepository,
    ProcessedStateRepository, ProductRepository, SubOrderRepository, SupplierDirectory,
};
use crate::infrastructure::memory::MemoryStore;

use dispatcher::NotificationDispatcher;
use idempotency::IdempotencyLedger;
use listener::{ChangeFeedListener, ListenerConfig, WatchHandle};
use master_sync::MasterOrderSynchronizer;
use notification_queue::{CustomerNotificationWorker, NotificationQueue, RetryPolicy};
use order_service::OrderService;
use stock_ledger::StockLedger;
use sub_orders::SubOrderService;

/// Every outbound dependency of the services.
#[derive(Clone)]
pub struct Ports {
    pub products: Arc<dyn ProductRepository>,
    pub sub_orders: Arc<dyn SubOrderRepository>,
    pub masters: Arc<dyn MasterOrderRepository>,
    pub feed: Arc<dyn ChangeFeed>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub processed: Arc<dyn ProcessedStateRepository>,
    pub suppliers: Arc<dyn SupplierDirectory>,
    pub mailer: Arc<dyn MailSender>,
}

impl Ports {
    pub fn in_memory(store: Arc<MemoryStore>, mailer: Arc<dyn MailSender>) -> Self {
        Self {
            products: store.clone(),
            sub_orders: store.clone(),
            masters: store.clone(),
            feed: store.clone(),
            notifications: store.clone(),
            processed: store.clone(),
            suppliers: store,
            mailer,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlatformSettings {
    pub listener: ListenerConfig,
    pub retry: RetryPolicy,
    pub queue_capacity: usize,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            retry: RetryPolicy::default(),
            queue_capacity: 256,
        }
    }
}

/// The wired services, built once and shared with the HTTP layer.
pub struct OrderPlatform {
    pub orders: Arc<OrderService>,
    pub sub_orders: Arc<SubOrderService>,
    pub stock: Arc<StockLedger>,
    pub synchronizer: Arc<MasterOrderSynchronizer>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub listener: Arc<ChangeFeedListener>,
    suppliers: Arc<dyn SupplierDirectory>,
}

impl OrderPlatform {
    /// Wire the services and spawn the customer notification worker.
    /// Must run inside a Tokio runtime.
    pub fn start(ports: Ports, settings: PlatformSettings) -> Self {
        let dispatcher = Arc::new(NotificationDispatcher::new(
            ports.suppliers.clone(),
            ports.notifications.clone(),
            ports.mailer.clone(),
        ));

        let (queue, rx) = NotificationQueue::channel(settings.queue_capacity);
        let worker = CustomerNotificationWorker::new(dispatcher.clone(), settings.retry);
        tokio::spawn(worker.run(rx));

        let stock = Arc::new(StockLedger::new(ports.products.clone()));
        let synchronizer = Arc::new(MasterOrderSynchronizer::new(
            ports.masters.clone(),
            ports.sub_orders.clone(),
            queue,
        ));
        let sub_orders = Arc::new(SubOrderService::new(
            ports.sub_orders.clone(),
            stock.clone(),
            synchronizer.clone(),
            dispatcher.clone(),
        ));
        let orders = Arc::new(OrderService::new(ports.masters.clone(), ports.sub_orders.clone()));
        let listener = Arc::new(ChangeFeedListener::new(
            ports.feed.clone(),
            Arc::new(IdempotencyLedger::new(ports.processed.clone())),
            dispatcher.clone(),
            settings.listener,
        ));

        Self {
            orders,
            sub_orders,
            stock,
            synchronizer,
            dispatcher,
            listener,
            suppliers: ports.suppliers,
        }
    }

    /// Watch the given suppliers, or every supplier in the directory.
    /// A supplier that cannot be watched is logged and skipped.
    pub async fn watch_suppliers(&self, ids: Option<&[String]>) -> Result<Vec<WatchHandle>, DomainError> {
        let ids = match ids {
            Some(ids) => ids.to_vec(),
            None => self.suppliers.list_ids().await?,
        };

        let mut handles = Vec::with_capacity(ids.len());
        for id in ids {
            match self.listener.watch(&id).await {
                Ok(handle) => handles.push(handle),
                Err(e) => log::error!("Could not watch supplier {}: {}", id, e),
            }
        }
        Ok(handles)
    }
}
