use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::errors::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::InvalidInput(format!("unknown order status '{s}'")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 4] = [
        PaymentStatus::Pending,
        PaymentStatus::Paid,
        PaymentStatus::Failed,
        PaymentStatus::Refunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::InvalidInput(format!("unknown payment status '{s}'")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub product_id: String,
    pub product_name: String,
    pub product_image: Option<String>,
    pub quantity: i32,
    #[schema(value_type = String)]
    pub unit_price: BigDecimal,
    #[schema(value_type = String)]
    pub total_price: BigDecimal,
    pub unit: String,
}

/// Customer fields copied onto every sub-order at checkout time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Customer {
    pub user_id: String,
    pub user_email: String,
    pub user_name: String,
    pub user_phone: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DeliveryAddress {
    pub street: String,
    pub city: String,
    pub postal_code: String,
    pub instructions: Option<String>,
}

impl DeliveryAddress {
    /// Single-line rendering used by notification templates.
    pub fn formatted(&self) -> String {
        let mut out = self.street.trim().to_string();
        let locality = format!("{} {}", self.postal_code.trim(), self.city.trim());
        let locality = locality.trim();
        if !locality.is_empty() {
            if !out.is_empty() {
                out.push_str(", ");
            }
            out.push_str(locality);
        }
        if let Some(instructions) = self.instructions.as_deref().map(str::trim) {
            if !instructions.is_empty() {
                out.push_str(&format!(" ({instructions})"));
            }
        }
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Amounts {
    #[schema(value_type = String)]
    pub subtotal: BigDecimal,
    #[schema(value_type = String)]
    pub delivery_fee: BigDecimal,
    #[schema(value_type = String)]
    pub tax: BigDecimal,
    #[schema(value_type = String)]
    pub promo_discount: BigDecimal,
    #[schema(value_type = String)]
    pub total: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MasterOrder {
    pub id: String,
    pub customer: Customer,
    pub amounts: Amounts,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: String,
    pub delivery_address: DeliveryAddress,
    pub promo_code: Option<String>,
    pub order_notes: Option<String>,
    pub sub_order_ids: Vec<String>,
    pub fournisseur_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SubOrder {
    pub id: String,
    pub master_order_id: String,
    pub fournisseur_id: String,
    pub fournisseur_name: String,
    pub customer: Customer,
    pub items: Vec<OrderItem>,
    pub delivery_address: DeliveryAddress,
    pub amounts: Amounts,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// Field values written by a status transition.
///
/// `confirmed_at` and `delivered_at` are first-write-wins: a repeated
/// transition into the same status keeps the original stamp.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub updated_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl StatusChange {
    pub fn new(
        status: OrderStatus,
        payment_status: PaymentStatus,
        previous_confirmed_at: Option<DateTime<Utc>>,
        previous_delivered_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        let confirmed_at = match status {
            OrderStatus::Confirmed => previous_confirmed_at.or(Some(now)),
            _ => previous_confirmed_at,
        };
        let delivered_at = match status {
            OrderStatus::Delivered => previous_delivered_at.or(Some(now)),
            _ => previous_delivered_at,
        };
        Self {
            status,
            payment_status,
            updated_at: now,
            confirmed_at,
            delivered_at,
        }
    }

    pub fn for_sub_order(
        order: &SubOrder,
        status: OrderStatus,
        payment_status: Option<PaymentStatus>,
        now: DateTime<Utc>,
    ) -> Self {
        Self::new(
            status,
            payment_status.unwrap_or(order.payment_status),
            order.confirmed_at,
            order.delivered_at,
            now,
        )
    }

    pub fn apply_to_sub_order(&self, order: &mut SubOrder) {
        order.status = self.status;
        order.payment_status = self.payment_status;
        order.updated_at = self.updated_at;
        order.confirmed_at = self.confirmed_at;
        order.delivered_at = self.delivered_at;
    }

    pub fn apply_to_master(&self, order: &mut MasterOrder) {
        order.status = self.status;
        order.payment_status = self.payment_status;
        order.updated_at = self.updated_at;
        order.confirmed_at = self.confirmed_at;
        order.delivered_at = self.delivered_at;
    }
}
