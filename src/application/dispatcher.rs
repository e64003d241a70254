use std::collections::BTreeMap;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::Utc;
use uuid::Uuid;
use validator::ValidateEmail;

use crate::domain::display::order_number;
use crate::domain::errors::DomainError;
use crate::domain::notification::{
    Audience, EventType, InAppNotification, NotificationLogEntry, NotificationStatus,
    OutgoingEmail,
};
use crate::domain::order::{MasterOrder, OrderStatus, PaymentStatus, SubOrder};
use crate::domain::ports::{MailSender, NotificationRepository, SupplierDirectory};

use super::templates;

/// Renders and sends order notifications, then records what happened.
///
/// Nothing here returns an error to the caller: every outcome ends up in the
/// notification log and as a boolean.
pub struct NotificationDispatcher {
    suppliers: Arc<dyn SupplierDirectory>,
    notifications: Arc<dyn NotificationRepository>,
    mailer: Arc<dyn MailSender>,
}

impl NotificationDispatcher {
    pub fn new(
        suppliers: Arc<dyn SupplierDirectory>,
        notifications: Arc<dyn NotificationRepository>,
        mailer: Arc<dyn MailSender>,
    ) -> Self {
        Self {
            suppliers,
            notifications,
            mailer,
        }
    }

    /// Supplier-facing notification for a sub-order state.
    pub async fn send_order_notification(&self, order: &SubOrder, event: EventType) -> bool {
        let outcome = self.deliver_to_supplier(order, event).await;

        let (status, error_message, recipient) = match &outcome {
            Ok(email) => (NotificationStatus::Success, None, Some(email.clone())),
            Err(e) => {
                log::warn!(
                    "{} notification for order {} (supplier {}) not sent: {}",
                    event,
                    order.id,
                    order.fournisseur_id,
                    e
                );
                (classify(e), Some(e.to_string()), None)
            }
        };

        self.record(LogParams {
            order_id: &order.id,
            fournisseur_id: Some(&order.fournisseur_id),
            event,
            status,
            error_message,
            order_status: order.status,
            payment_status: order.payment_status,
            recipient_email: recipient,
            order_total: &order.amounts.total,
        })
        .await;

        if outcome.is_err() {
            return false;
        }

        let (title, message) = templates::in_app_text(&order.id, order.status, event);
        self.push_in_app(&order.fournisseur_id, &order.id, order.status, title, message)
            .await;
        log::info!(
            "{} notification sent for order {} to supplier {}",
            event,
            order.id,
            order.fournisseur_id
        );
        true
    }

    async fn deliver_to_supplier(&self, order: &SubOrder, event: EventType) -> Result<String, DomainError> {
        let contact = self
            .suppliers
            .contact(&order.fournisseur_id)
            .await?
            .ok_or_else(|| {
                DomainError::NotFound(format!("no contact for supplier {}", order.fournisseur_id))
            })?;
        if !contact.email.validate_email() {
            return Err(DomainError::InvalidInput(format!(
                "supplier {} has an invalid email address",
                contact.id
            )));
        }

        let rendered = templates::supplier_email(order, &contact, event);
        let mut metadata = order_metadata(&order.id, order.status, order.payment_status);
        metadata.insert("event_type".into(), event.as_str().into());
        metadata.insert("fournisseur_id".into(), order.fournisseur_id.clone());
        metadata.insert("customer_name".into(), order.customer.user_name.clone());
        if let Some(business) = &contact.business_name {
            metadata.insert("business_name".into(), business.clone());
        }

        let email = OutgoingEmail {
            audience: Audience::Supplier,
            to_email: contact.email.clone(),
            to_name: contact.display_name.clone(),
            subject: rendered.subject,
            message: rendered.text,
            html_message: Some(rendered.html),
            metadata,
        };
        self.mailer.send(&email).await?;
        Ok(contact.email)
    }

    /// Customer-facing email for a master-order state. Callers own retries
    /// and must report the final outcome with [`Self::record_customer_outcome`].
    pub async fn send_customer_status_email(&self, order: &MasterOrder) -> Result<(), DomainError> {
        let to = order.customer.user_email.trim();
        if !to.validate_email() {
            return Err(DomainError::InvalidInput(format!(
                "customer email '{}' is not valid",
                order.customer.user_email
            )));
        }

        let rendered = templates::customer_email(order);
        let mut metadata = order_metadata(&order.id, order.status, order.payment_status);
        metadata.insert("supplier_count".into(), order.fournisseur_count.to_string());

        let email = OutgoingEmail {
            audience: Audience::Customer,
            to_email: to.to_string(),
            to_name: order.customer.user_name.clone(),
            subject: rendered.subject,
            message: rendered.text,
            html_message: Some(rendered.html),
            metadata,
        };
        self.mailer.send(&email).await
    }

    pub async fn record_customer_outcome(&self, order: &MasterOrder, outcome: &Result<(), DomainError>) {
        let (status, error_message) = match outcome {
            Ok(()) => (NotificationStatus::Success, None),
            Err(e) => (classify(e), Some(e.to_string())),
        };
        self.record(LogParams {
            order_id: &order.id,
            fournisseur_id: None,
            event: EventType::StatusUpdate,
            status,
            error_message,
            order_status: order.status,
            payment_status: order.payment_status,
            recipient_email: outcome.is_ok().then(|| order.customer.user_email.clone()),
            order_total: &order.amounts.total,
        })
        .await;

        if outcome.is_ok() {
            let (title, message) =
                templates::in_app_text(&order.id, order.status, EventType::StatusUpdate);
            self.push_in_app(&order.customer.user_id, &order.id, order.status, title, message)
                .await;
        }
    }

    async fn record(&self, params: LogParams<'_>) {
        let entry = NotificationLogEntry {
            id: Uuid::new_v4(),
            order_id: params.order_id.to_string(),
            fournisseur_id: params.fournisseur_id.map(str::to_string),
            event_type: params.event,
            notification_status: params.status,
            error_message: params.error_message,
            order_status: params.order_status,
            payment_status: params.payment_status,
            recipient_email: params.recipient_email,
            order_total: params.order_total.clone(),
            created_at: Utc::now(),
        };
        if let Err(e) = self.notifications.append_log(&entry).await {
            log::error!("Failed to write notification log for order {}: {}", entry.order_id, e);
        }
    }

    async fn push_in_app(
        &self,
        recipient_id: &str,
        order_id: &str,
        status: OrderStatus,
        title: String,
        message: String,
    ) {
        let notification = InAppNotification {
            id: Uuid::new_v4(),
            recipient_id: recipient_id.to_string(),
            order_id: order_id.to_string(),
            title,
            message,
            order_status: status,
            is_read: false,
            created_at: Utc::now(),
        };
        if let Err(e) = self.notifications.push_in_app(&notification).await {
            log::error!("Failed to write in-app notification for order {}: {}", order_id, e);
        }
    }
}

struct LogParams<'a> {
    order_id: &'a str,
    fournisseur_id: Option<&'a str>,
    event: EventType,
    status: NotificationStatus,
    error_message: Option<String>,
    order_status: OrderStatus,
    payment_status: PaymentStatus,
    recipient_email: Option<String>,
    order_total: &'a BigDecimal,
}

fn order_metadata(id: &str, status: OrderStatus, payment: PaymentStatus) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("order_id".to_string(), id.to_string()),
        ("order_number".to_string(), order_number(id)),
        ("order_status".to_string(), status.as_str().to_string()),
        ("payment_status".to_string(), payment.as_str().to_string()),
    ])
}

/// Refusals and missing data are `failed`; transport and store trouble is `error`.
pub fn classify(e: &DomainError) -> NotificationStatus {
    match e {
        DomainError::NotFound(_) | DomainError::InvalidInput(_) | DomainError::Rejected(_) => {
            NotificationStatus::Failed
        }
        DomainError::Unavailable(_) | DomainError::Conflict(_) | DomainError::Internal(_) => {
            NotificationStatus::Error
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::notification::SupplierContact;
    use crate::domain::order::{Amounts, Customer, DeliveryAddress};
    use crate::infrastructure::memory::{MailerMode, MemoryMailer, MemoryStore};

    fn sub_order() -> SubOrder {
        SubOrder {
            id: "sub-abcdef123456".into(),
            master_order_id: "m-1".into(),
            fournisseur_id: "sup-1".into(),
            fournisseur_name: "Green Grocer".into(),
            customer: Customer {
                user_id: "u-1".into(),
                user_email: "alice@example.com".into(),
                user_name: "Alice".into(),
                user_phone: "0600000000".into(),
            },
            items: vec![],
            delivery_address: DeliveryAddress::default(),
            amounts: Amounts {
                total: BigDecimal::from(20),
                ..Amounts::default()
            },
            status: OrderStatus::Confirmed,
            payment_status: PaymentStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            confirmed_at: None,
            delivered_at: None,
        }
    }

    fn setup(with_contact: bool) -> (Arc<MemoryStore>, Arc<MemoryMailer>, NotificationDispatcher) {
        let store = Arc::new(MemoryStore::new());
        if with_contact {
            store.put_supplier(SupplierContact {
                id: "sup-1".into(),
                display_name: "Green Grocer".into(),
                email: "grocer@example.com".into(),
                business_name: Some("Green Grocer SARL".into()),
                phone: None,
                address: None,
            });
        }
        let mailer = Arc::new(MemoryMailer::new());
        let dispatcher = NotificationDispatcher::new(store.clone(), store.clone(), mailer.clone());
        (store, mailer, dispatcher)
    }

    #[tokio::test]
    async fn successful_send_logs_and_writes_in_app_record() {
        let (store, mailer, dispatcher) = setup(true);

        assert!(dispatcher.send_order_notification(&sub_order(), EventType::StatusUpdate).await);

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to_email, "grocer@example.com");
        assert_eq!(sent[0].audience, Audience::Supplier);
        assert_eq!(sent[0].metadata["order_number"], "EF123456");

        let logs = store.notification_logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].notification_status, NotificationStatus::Success);
        assert_eq!(logs[0].event_type, EventType::StatusUpdate);

        let in_app = store.in_app_notifications();
        assert_eq!(in_app.len(), 1);
        assert_eq!(in_app[0].recipient_id, "sup-1");
        assert_eq!(in_app[0].title, "Order confirmed");
    }

    #[tokio::test]
    async fn missing_contact_is_a_failed_attempt_without_mail() {
        let (store, mailer, dispatcher) = setup(false);

        assert!(!dispatcher.send_order_notification(&sub_order(), EventType::NewOrder).await);

        assert_eq!(mailer.attempts(), 0);
        let logs = store.notification_logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].notification_status, NotificationStatus::Failed);
        assert!(store.in_app_notifications().is_empty());
    }

    #[tokio::test]
    async fn unreachable_relay_is_logged_as_error() {
        let (store, mailer, dispatcher) = setup(true);
        mailer.set_mode(MailerMode::Unreachable);

        assert!(!dispatcher.send_order_notification(&sub_order(), EventType::StatusUpdate).await);

        let logs = store.notification_logs();
        assert_eq!(logs[0].notification_status, NotificationStatus::Error);
        assert!(store.in_app_notifications().is_empty());
    }

    #[tokio::test]
    async fn invalid_customer_email_is_rejected_before_sending() {
        let (_store, mailer, dispatcher) = setup(true);
        let order = MasterOrder {
            id: "m-1".into(),
            customer: Customer {
                user_id: "u-1".into(),
                user_email: "not-an-email".into(),
                user_name: "Alice".into(),
                user_phone: "".into(),
            },
            amounts: Amounts::default(),
            status: OrderStatus::Confirmed,
            payment_status: PaymentStatus::Pending,
            payment_method: "card".into(),
            delivery_address: DeliveryAddress::default(),
            promo_code: None,
            order_notes: None,
            sub_order_ids: vec![],
            fournisseur_count: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            confirmed_at: None,
            delivered_at: None,
        };

        let result = dispatcher.send_customer_status_email(&order).await;

        assert!(matches!(result, Err(DomainError::InvalidInput(_))));
        assert_eq!(mailer.attempts(), 0);
    }
}
