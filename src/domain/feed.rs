use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::errors::DomainError;
use super::order::SubOrder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Removed => "removed",
        }
    }

    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "added" => Ok(ChangeKind::Added),
            "modified" => Ok(ChangeKind::Modified),
            "removed" => Ok(ChangeKind::Removed),
            other => Err(DomainError::Internal(format!("unknown change kind '{other}'"))),
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One sub-order mutation with the document snapshot after it.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub snapshot: SubOrder,
}

pub type ChangeBatch = Vec<ChangeEvent>;

/// Receiving end of a supplier-filtered change feed.
///
/// Delivery is at-least-once and unordered across reconnects. Dropping the
/// subscription closes it; producers stop once they notice.
pub struct ChangeSubscription {
    rx: mpsc::UnboundedReceiver<ChangeBatch>,
}

impl ChangeSubscription {
    pub fn new(rx: mpsc::UnboundedReceiver<ChangeBatch>) -> Self {
        Self { rx }
    }

    /// Next non-empty batch, or `None` once the feed is closed.
    pub async fn next_batch(&mut self) -> Option<ChangeBatch> {
        loop {
            let batch = self.rx.recv().await?;
            if !batch.is_empty() {
                return Some(batch);
            }
        }
    }
}
