use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::feed::{ChangeEvent, ChangeKind};
use crate::domain::notification::{InAppNotification, NotificationLogEntry, SupplierContact};
use crate::domain::order::{Amounts, Customer, DeliveryAddress, MasterOrder, OrderItem, SubOrder};
use crate::schema::{
    master_orders, notification_logs, notifications, processed_order_states, sub_order_changes,
    sub_orders, suppliers,
};

// ── Master orders ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Queryable, Selectable, Insertable, Identifiable)]
#[diesel(table_name = master_orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MasterOrderRow {
    pub id: String,
    pub user_id: String,
    pub user_email: String,
    pub user_name: String,
    pub user_phone: String,
    pub subtotal: BigDecimal,
    pub delivery_fee: BigDecimal,
    pub tax: BigDecimal,
    pub promo_discount: BigDecimal,
    pub total: BigDecimal,
    pub status: String,
    pub payment_status: String,
    pub payment_method: String,
    pub street: String,
    pub city: String,
    pub postal_code: String,
    pub delivery_instructions: Option<String>,
    pub promo_code: Option<String>,
    pub order_notes: Option<String>,
    pub sub_order_ids: Vec<String>,
    pub fournisseur_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl From<&MasterOrder> for MasterOrderRow {
    fn from(o: &MasterOrder) -> Self {
        Self {
            id: o.id.clone(),
            user_id: o.customer.user_id.clone(),
            user_email: o.customer.user_email.clone(),
            user_name: o.customer.user_name.clone(),
            user_phone: o.customer.user_phone.clone(),
            subtotal: o.amounts.subtotal.clone(),
            delivery_fee: o.amounts.delivery_fee.clone(),
            tax: o.amounts.tax.clone(),
            promo_discount: o.amounts.promo_discount.clone(),
            total: o.amounts.total.clone(),
            status: o.status.as_str().to_string(),
            payment_status: o.payment_status.as_str().to_string(),
            payment_method: o.payment_method.clone(),
            street: o.delivery_address.street.clone(),
            city: o.delivery_address.city.clone(),
            postal_code: o.delivery_address.postal_code.clone(),
            delivery_instructions: o.delivery_address.instructions.clone(),
            promo_code: o.promo_code.clone(),
            order_notes: o.order_notes.clone(),
            sub_order_ids: o.sub_order_ids.clone(),
            fournisseur_count: o.fournisseur_count,
            created_at: o.created_at,
            updated_at: o.updated_at,
            confirmed_at: o.confirmed_at,
            delivered_at: o.delivered_at,
        }
    }
}

impl TryFrom<MasterOrderRow> for MasterOrder {
    type Error = DomainError;

    fn try_from(r: MasterOrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            status: r.status.parse()?,
            payment_status: r.payment_status.parse()?,
            customer: Customer {
                user_id: r.user_id,
                user_email: r.user_email,
                user_name: r.user_name,
                user_phone: r.user_phone,
            },
            amounts: Amounts {
                subtotal: r.subtotal,
                delivery_fee: r.delivery_fee,
                tax: r.tax,
                promo_discount: r.promo_discount,
                total: r.total,
            },
            delivery_address: DeliveryAddress {
                street: r.street,
                city: r.city,
                postal_code: r.postal_code,
                instructions: r.delivery_instructions,
            },
            id: r.id,
            payment_method: r.payment_method,
            promo_code: r.promo_code,
            order_notes: r.order_notes,
            sub_order_ids: r.sub_order_ids,
            fournisseur_count: r.fournisseur_count,
            created_at: r.created_at,
            updated_at: r.updated_at,
            confirmed_at: r.confirmed_at,
            delivered_at: r.delivered_at,
        })
    }
}

// ── Sub-orders ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Queryable, Selectable, Insertable, Identifiable)]
#[diesel(table_name = sub_orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SubOrderRow {
    pub id: String,
    pub master_order_id: String,
    pub fournisseur_id: String,
    pub fournisseur_name: String,
    pub user_id: String,
    pub user_email: String,
    pub user_name: String,
    pub user_phone: String,
    pub items: Value,
    pub street: String,
    pub city: String,
    pub postal_code: String,
    pub delivery_instructions: Option<String>,
    pub subtotal: BigDecimal,
    pub delivery_fee: BigDecimal,
    pub tax: BigDecimal,
    pub promo_discount: BigDecimal,
    pub total: BigDecimal,
    pub status: String,
    pub payment_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl TryFrom<&SubOrder> for SubOrderRow {
    type Error = DomainError;

    fn try_from(o: &SubOrder) -> Result<Self, Self::Error> {
        Ok(Self {
            id: o.id.clone(),
            master_order_id: o.master_order_id.clone(),
            fournisseur_id: o.fournisseur_id.clone(),
            fournisseur_name: o.fournisseur_name.clone(),
            user_id: o.customer.user_id.clone(),
            user_email: o.customer.user_email.clone(),
            user_name: o.customer.user_name.clone(),
            user_phone: o.customer.user_phone.clone(),
            items: serde_json::to_value(&o.items)?,
            street: o.delivery_address.street.clone(),
            city: o.delivery_address.city.clone(),
            postal_code: o.delivery_address.postal_code.clone(),
            delivery_instructions: o.delivery_address.instructions.clone(),
            subtotal: o.amounts.subtotal.clone(),
            delivery_fee: o.amounts.delivery_fee.clone(),
            tax: o.amounts.tax.clone(),
            promo_discount: o.amounts.promo_discount.clone(),
            total: o.amounts.total.clone(),
            status: o.status.as_str().to_string(),
            payment_status: o.payment_status.as_str().to_string(),
            created_at: o.created_at,
            updated_at: o.updated_at,
            confirmed_at: o.confirmed_at,
            delivered_at: o.delivered_at,
        })
    }
}

impl TryFrom<SubOrderRow> for SubOrder {
    type Error = DomainError;

    fn try_from(r: SubOrderRow) -> Result<Self, Self::Error> {
        let items: Vec<OrderItem> = serde_json::from_value(r.items)?;
        Ok(Self {
            status: r.status.parse()?,
            payment_status: r.payment_status.parse()?,
            customer: Customer {
                user_id: r.user_id,
                user_email: r.user_email,
                user_name: r.user_name,
                user_phone: r.user_phone,
            },
            amounts: Amounts {
                subtotal: r.subtotal,
                delivery_fee: r.delivery_fee,
                tax: r.tax,
                promo_discount: r.promo_discount,
                total: r.total,
            },
            delivery_address: DeliveryAddress {
                street: r.street,
                city: r.city,
                postal_code: r.postal_code,
                instructions: r.delivery_instructions,
            },
            id: r.id,
            master_order_id: r.master_order_id,
            fournisseur_id: r.fournisseur_id,
            fournisseur_name: r.fournisseur_name,
            items,
            created_at: r.created_at,
            updated_at: r.updated_at,
            confirmed_at: r.confirmed_at,
            delivered_at: r.delivered_at,
        })
    }
}

// ── Change feed ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = sub_order_changes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ChangeRow {
    pub seq: i64,
    pub sub_order_id: String,
    pub fournisseur_id: String,
    pub kind: String,
    pub snapshot: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = sub_order_changes)]
pub struct NewChangeRow {
    pub sub_order_id: String,
    pub fournisseur_id: String,
    pub kind: String,
    pub snapshot: Value,
}

impl NewChangeRow {
    pub fn new(kind: ChangeKind, snapshot: &SubOrder) -> Result<Self, DomainError> {
        Ok(Self {
            sub_order_id: snapshot.id.clone(),
            fournisseur_id: snapshot.fournisseur_id.clone(),
            kind: kind.as_str().to_string(),
            snapshot: serde_json::to_value(snapshot)?,
        })
    }
}

impl TryFrom<ChangeRow> for ChangeEvent {
    type Error = DomainError;

    fn try_from(r: ChangeRow) -> Result<Self, Self::Error> {
        Ok(Self {
            kind: ChangeKind::parse(&r.kind)?,
            snapshot: serde_json::from_value(r.snapshot)?,
        })
    }
}

// ── Suppliers ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = suppliers)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SupplierRow {
    pub id: String,
    pub display_name: String,
    pub email: String,
    pub business_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl From<SupplierRow> for SupplierContact {
    fn from(r: SupplierRow) -> Self {
        Self {
            id: r.id,
            display_name: r.display_name,
            email: r.email,
            business_name: r.business_name,
            phone: r.phone,
            address: r.address,
        }
    }
}

// ── Notifications ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = notification_logs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NotificationLogRow {
    pub id: Uuid,
    pub order_id: String,
    pub fournisseur_id: Option<String>,
    pub event_type: String,
    pub notification_status: String,
    pub error_message: Option<String>,
    pub order_status: String,
    pub payment_status: String,
    pub recipient_email: Option<String>,
    pub order_total: BigDecimal,
    pub created_at: DateTime<Utc>,
}

impl From<&NotificationLogEntry> for NotificationLogRow {
    fn from(e: &NotificationLogEntry) -> Self {
        Self {
            id: e.id,
            order_id: e.order_id.clone(),
            fournisseur_id: e.fournisseur_id.clone(),
            event_type: e.event_type.as_str().to_string(),
            notification_status: e.notification_status.as_str().to_string(),
            error_message: e.error_message.clone(),
            order_status: e.order_status.as_str().to_string(),
            payment_status: e.payment_status.as_str().to_string(),
            recipient_email: e.recipient_email.clone(),
            order_total: e.order_total.clone(),
            created_at: e.created_at,
        }
    }
}

impl TryFrom<NotificationLogRow> for NotificationLogEntry {
    type Error = DomainError;

    fn try_from(r: NotificationLogRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            order_id: r.order_id,
            fournisseur_id: r.fournisseur_id,
            event_type: r.event_type.parse()?,
            notification_status: r.notification_status.parse()?,
            error_message: r.error_message,
            order_status: r.order_status.parse()?,
            payment_status: r.payment_status.parse()?,
            recipient_email: r.recipient_email,
            order_total: r.order_total,
            created_at: r.created_at,
        })
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = notifications)]
pub struct NewNotificationRow {
    pub id: Uuid,
    pub recipient_id: String,
    pub order_id: String,
    pub title: String,
    pub message: String,
    pub order_status: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&InAppNotification> for NewNotificationRow {
    fn from(n: &InAppNotification) -> Self {
        Self {
            id: n.id,
            recipient_id: n.recipient_id.clone(),
            order_id: n.order_id.clone(),
            title: n.title.clone(),
            message: n.message.clone(),
            order_status: n.order_status.as_str().to_string(),
            is_read: n.is_read,
            created_at: n.created_at,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = processed_order_states)]
pub struct NewProcessedStateRow {
    pub order_id: String,
    pub status: String,
    pub payment_status: String,
    pub fournisseur_id: String,
}
