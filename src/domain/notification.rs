use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::errors::DomainError;
use super::order::{OrderStatus, PaymentStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    NewOrder,
    StatusUpdate,
    ManualTrigger,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::NewOrder => "new_order",
            EventType::StatusUpdate => "status_update",
            EventType::ManualTrigger => "manual_trigger",
        }
    }
}

impl FromStr for EventType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [EventType::NewOrder, EventType::StatusUpdate, EventType::ManualTrigger]
            .into_iter()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| DomainError::InvalidInput(format!("unknown event type '{s}'")))
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome recorded for a notification attempt.
///
/// `Success` means the relay accepted the request, not that mail was delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Success,
    Failed,
    Error,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Success => "success",
            NotificationStatus::Failed => "failed",
            NotificationStatus::Error => "error",
        }
    }
}

impl FromStr for NotificationStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [NotificationStatus::Success, NotificationStatus::Failed, NotificationStatus::Error]
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::InvalidInput(format!("unknown notification status '{s}'")))
    }
}

/// Append-only audit record of one notification attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationLogEntry {
    pub id: Uuid,
    pub order_id: String,
    pub fournisseur_id: Option<String>,
    pub event_type: EventType,
    pub notification_status: NotificationStatus,
    pub error_message: Option<String>,
    pub order_status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub recipient_email: Option<String>,
    pub order_total: BigDecimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct InAppNotification {
    pub id: Uuid,
    pub recipient_id: String,
    pub order_id: String,
    pub title: String,
    pub message: String,
    pub order_status: OrderStatus,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Idempotency key for one observed sub-order state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProcessedStateKey {
    pub order_id: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
}

impl ProcessedStateKey {
    pub fn new(order_id: impl Into<String>, status: OrderStatus, payment_status: PaymentStatus) -> Self {
        Self {
            order_id: order_id.into(),
            status,
            payment_status,
        }
    }
}

impl fmt::Display for ProcessedStateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.order_id, self.status, self.payment_status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SupplierContact {
    pub id: String,
    pub display_name: String,
    pub email: String,
    pub business_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Customer,
    Supplier,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub audience: Audience,
    pub to_email: String,
    pub to_name: String,
    pub subject: String,
    pub message: String,
    pub html_message: Option<String>,
    /// Extra fields forwarded to the relay for the recipient's context.
    pub metadata: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processed_key_joins_all_three_parts() {
        let key = ProcessedStateKey::new("sub-1", OrderStatus::Confirmed, PaymentStatus::Paid);
        assert_eq!(key.to_string(), "sub-1:confirmed:paid");
    }

    #[test]
    fn event_type_wire_names() {
        assert_eq!(EventType::ManualTrigger.as_str(), "manual_trigger");
        assert_eq!(
            serde_json::to_string(&EventType::NewOrder).unwrap(),
            "\"new_order\""
        );
        assert_eq!("status_update".parse::<EventType>().unwrap(), EventType::StatusUpdate);
        assert!("unknown".parse::<NotificationStatus>().is_err());
    }
}
