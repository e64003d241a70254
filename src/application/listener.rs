//! Per-supplier change-feed watchers.
//!
//! Each watched supplier gets one task that reads its sub-order change feed,
//! absorbs bursts according to the configured [`BurstPolicy`], claims every
//! distinct (order, status, payment status) state in the idempotency ledger
//! and hands the winners to the notification dispatcher.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::domain::errors::DomainError;
use crate::domain::feed::{ChangeBatch, ChangeEvent, ChangeKind, ChangeSubscription};
use crate::domain::notification::EventType;
use crate::domain::ports::ChangeFeed;

use super::dispatcher::NotificationDispatcher;
use super::idempotency::IdempotencyLedger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BurstPolicy {
    /// Drop every batch that arrives within the cooldown of the last
    /// processed one, whatever orders it carries.
    DropWithinCooldown,
    /// Hold changes per order for one cooldown window, then forward the
    /// latest state of each order.
    #[default]
    DebouncePerOrder,
}

impl BurstPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            BurstPolicy::DropWithinCooldown => "drop_within_cooldown",
            BurstPolicy::DebouncePerOrder => "debounce_per_order",
        }
    }
}

impl fmt::Display for BurstPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BurstPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop_within_cooldown" => Ok(BurstPolicy::DropWithinCooldown),
            "debounce_per_order" => Ok(BurstPolicy::DebouncePerOrder),
            other => Err(DomainError::InvalidInput(format!("unknown burst policy '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerConfig {
    pub cooldown: Duration,
    pub burst_policy: BurstPolicy,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(2),
            burst_policy: BurstPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchPhase {
    Idle,
    Subscribed,
    Throttled,
    Processing,
}

type PhaseMap = Arc<Mutex<HashMap<String, WatchPhase>>>;

fn set_phase(phases: &PhaseMap, fournisseur_id: &str, phase: WatchPhase) {
    if let Ok(mut phases) = phases.lock() {
        // A cancelled watch has already removed its entry; keep it removed.
        if let Some(current) = phases.get_mut(fournisseur_id) {
            *current = phase;
        }
    }
}

pub struct ChangeFeedListener {
    feed: Arc<dyn ChangeFeed>,
    ledger: Arc<IdempotencyLedger>,
    dispatcher: Arc<NotificationDispatcher>,
    config: ListenerConfig,
    phases: PhaseMap,
}

impl ChangeFeedListener {
    pub fn new(
        feed: Arc<dyn ChangeFeed>,
        ledger: Arc<IdempotencyLedger>,
        dispatcher: Arc<NotificationDispatcher>,
        config: ListenerConfig,
    ) -> Self {
        Self {
            feed,
            ledger,
            dispatcher,
            config,
            phases: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start watching one supplier. At most one watch per supplier may be
    /// active; dropping or cancelling the handle ends it.
    pub async fn watch(&self, fournisseur_id: &str) -> Result<WatchHandle, DomainError> {
        {
            let mut phases = self
                .phases
                .lock()
                .map_err(|_| DomainError::Internal("listener phase lock poisoned".into()))?;
            if phases.contains_key(fournisseur_id) {
                return Err(DomainError::Conflict(format!(
                    "supplier {fournisseur_id} is already watched"
                )));
            }
            phases.insert(fournisseur_id.to_string(), WatchPhase::Idle);
        }

        let subscription = match self.feed.subscribe(fournisseur_id).await {
            Ok(subscription) => subscription,
            Err(e) => {
                if let Ok(mut phases) = self.phases.lock() {
                    phases.remove(fournisseur_id);
                }
                return Err(e);
            }
        };
        set_phase(&self.phases, fournisseur_id, WatchPhase::Subscribed);
        log::info!("Watching sub-order changes for supplier {}", fournisseur_id);

        let token = CancellationToken::new();
        let watch = SupplierWatch {
            fournisseur_id: fournisseur_id.to_string(),
            ledger: self.ledger.clone(),
            dispatcher: self.dispatcher.clone(),
            config: self.config.clone(),
            phases: self.phases.clone(),
            last_processed: None,
            pending: Vec::new(),
            flush_at: None,
        };
        let task = tokio::spawn(watch.run(subscription, token.clone()));

        Ok(WatchHandle {
            fournisseur_id: fournisseur_id.to_string(),
            token,
            task: Some(task),
            phases: self.phases.clone(),
        })
    }

    pub fn phase(&self, fournisseur_id: &str) -> WatchPhase {
        self.phases
            .lock()
            .ok()
            .and_then(|phases| phases.get(fournisseur_id).copied())
            .unwrap_or(WatchPhase::Idle)
    }

    pub fn watched_suppliers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .phases
            .lock()
            .map(|phases| phases.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }
}

/// Live watch on one supplier's feed.
pub struct WatchHandle {
    fournisseur_id: String,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
    phases: PhaseMap,
}

impl WatchHandle {
    pub fn fournisseur_id(&self) -> &str {
        &self.fournisseur_id
    }

    /// Stop the watch. No notification is started once this returns, and
    /// the supplier's throttle and dedup state is discarded.
    pub fn cancel(self) {}
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Ok(mut phases) = self.phases.lock() {
            phases.remove(&self.fournisseur_id);
        }
        log::info!("Stopped watching supplier {}", self.fournisseur_id);
    }
}

struct SupplierWatch {
    fournisseur_id: String,
    ledger: Arc<IdempotencyLedger>,
    dispatcher: Arc<NotificationDispatcher>,
    config: ListenerConfig,
    phases: PhaseMap,
    last_processed: Option<Instant>,
    pending: Vec<ChangeEvent>,
    flush_at: Option<Instant>,
}

impl SupplierWatch {
    async fn run(mut self, mut subscription: ChangeSubscription, token: CancellationToken) {
        loop {
            let flush_at = self.flush_at;
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = tokio::time::sleep_until(flush_at.unwrap_or_else(Instant::now)), if flush_at.is_some() => {
                    self.flush(&token).await;
                }
                batch = subscription.next_batch() => match batch {
                    Some(batch) => self.on_batch(batch, &token).await,
                    None => {
                        log::warn!("Change feed for supplier {} closed", self.fournisseur_id);
                        self.set_phase(WatchPhase::Idle);
                        break;
                    }
                },
            }
        }
    }

    fn set_phase(&self, phase: WatchPhase) {
        set_phase(&self.phases, &self.fournisseur_id, phase);
    }

    async fn on_batch(&mut self, batch: ChangeBatch, token: &CancellationToken) {
        match self.config.burst_policy {
            BurstPolicy::DropWithinCooldown => {
                let now = Instant::now();
                if let Some(last) = self.last_processed {
                    if now.duration_since(last) < self.config.cooldown {
                        self.set_phase(WatchPhase::Throttled);
                        log::info!(
                            "Dropping {} change(s) for supplier {} within cooldown",
                            batch.len(),
                            self.fournisseur_id
                        );
                        self.set_phase(WatchPhase::Subscribed);
                        return;
                    }
                }
                self.last_processed = Some(now);
                self.process(batch, token).await;
            }
            BurstPolicy::DebouncePerOrder => {
                for event in batch {
                    self.hold(event);
                }
                if !self.pending.is_empty() && self.flush_at.is_none() {
                    self.flush_at = Some(Instant::now() + self.config.cooldown);
                    self.set_phase(WatchPhase::Throttled);
                }
            }
        }
    }

    /// Keep only the latest state per order. An order first seen as added
    /// stays added so the supplier still gets the new-order variant.
    fn hold(&mut self, event: ChangeEvent) {
        if event.kind == ChangeKind::Removed {
            log::debug!("Ignoring removal of sub-order {}", event.snapshot.id);
            return;
        }
        match self.pending.iter_mut().find(|p| p.snapshot.id == event.snapshot.id) {
            Some(held) => {
                let kind = if held.kind == ChangeKind::Added {
                    ChangeKind::Added
                } else {
                    event.kind
                };
                *held = ChangeEvent {
                    kind,
                    snapshot: event.snapshot,
                };
            }
            None => self.pending.push(event),
        }
    }

    async fn flush(&mut self, token: &CancellationToken) {
        self.flush_at = None;
        let batch = std::mem::take(&mut self.pending);
        self.last_processed = Some(Instant::now());
        self.process(batch, token).await;
    }

    async fn process(&mut self, batch: ChangeBatch, token: &CancellationToken) {
        self.set_phase(WatchPhase::Processing);
        for event in batch {
            if token.is_cancelled() {
                return;
            }
            self.process_change(event).await;
        }
        self.set_phase(WatchPhase::Subscribed);
    }

    async fn process_change(&mut self, event: ChangeEvent) {
        let event_type = match event.kind {
            ChangeKind::Added => EventType::NewOrder,
            ChangeKind::Modified => EventType::StatusUpdate,
            ChangeKind::Removed => {
                log::debug!("Ignoring removal of sub-order {}", event.snapshot.id);
                return;
            }
        };

        let key = IdempotencyLedger::key_for(&event.snapshot);
        match self.ledger.mark_processed(&key, &self.fournisseur_id).await {
            Ok(true) => {}
            Ok(false) => {
                log::debug!("Skipping duplicate state {} for supplier {}", key, self.fournisseur_id);
                return;
            }
            Err(e) => {
                log::warn!(
                    "Could not claim state {} for supplier {}: {}",
                    key,
                    self.fournisseur_id,
                    e
                );
                return;
            }
        }

        self.dispatcher
            .send_order_notification(&event.snapshot, event_type)
            .await;
    }
}
