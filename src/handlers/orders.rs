use std::str::FromStr;

use actix_web::{web, HttpResponse};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::application::order_service::{CheckoutLine, NewCheckout};
use crate::application::OrderPlatform;
use crate::domain::order::{Customer, DeliveryAddress, MasterOrder, SubOrder};
use crate::errors::AppError;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CustomerRequest {
    #[validate(length(min = 1))]
    pub user_id: String,
    #[validate(email)]
    pub user_email: String,
    #[validate(length(min = 1))]
    pub user_name: String,
    #[serde(default)]
    pub user_phone: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct DeliveryAddressRequest {
    #[validate(length(min = 1))]
    pub street: String,
    #[validate(length(min = 1))]
    pub city: String,
    #[validate(length(min = 1, max = 20))]
    pub postal_code: String,
    pub instructions: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CheckoutLineRequest {
    #[validate(length(min = 1))]
    pub fournisseur_id: String,
    #[validate(length(min = 1))]
    pub fournisseur_name: String,
    #[validate(length(min = 1))]
    pub product_id: String,
    #[validate(length(min = 1))]
    pub product_name: String,
    pub product_image: Option<String>,
    #[validate(range(min = 1))]
    pub quantity: i32,
    /// Decimal price as a string to avoid floating-point issues, e.g. "9.99"
    pub unit_price: String,
    #[serde(default = "default_unit")]
    pub unit: String,
}

fn default_unit() -> String {
    "piece".to_string()
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    #[validate(nested)]
    pub customer: CustomerRequest,
    #[validate(nested)]
    pub delivery_address: DeliveryAddressRequest,
    #[validate(length(min = 1))]
    pub payment_method: String,
    pub promo_code: Option<String>,
    pub order_notes: Option<String>,
    /// Checkout-level amounts, split across suppliers by subtotal.
    pub delivery_fee: Option<String>,
    pub tax: Option<String>,
    pub promo_discount: Option<String>,
    #[validate(length(min = 1), nested)]
    pub lines: Vec<CheckoutLineRequest>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateOrderResponse {
    pub id: String,
    pub sub_order_ids: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub order: MasterOrder,
    pub sub_orders: Vec<SubOrder>,
}

fn money(field: &str, value: Option<&str>) -> Result<BigDecimal, AppError> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(BigDecimal::from(0));
    };
    BigDecimal::from_str(value)
        .map_err(|_| AppError::BadRequest(format!("{field} '{value}' is not a decimal amount")))
}

impl CreateOrderRequest {
    fn into_checkout(self) -> Result<NewCheckout, AppError> {
        let lines = self
            .lines
            .into_iter()
            .map(|l| {
                Ok(CheckoutLine {
                    unit_price: money("unit_price", Some(&l.unit_price))?,
                    fournisseur_id: l.fournisseur_id,
                    fournisseur_name: l.fournisseur_name,
                    product_id: l.product_id,
                    product_name: l.product_name,
                    product_image: l.product_image,
                    quantity: l.quantity,
                    unit: l.unit,
                })
            })
            .collect::<Result<Vec<_>, AppError>>()?;

        Ok(NewCheckout {
            delivery_fee: money("delivery_fee", self.delivery_fee.as_deref())?,
            tax: money("tax", self.tax.as_deref())?,
            promo_discount: money("promo_discount", self.promo_discount.as_deref())?,
            customer: Customer {
                user_id: self.customer.user_id,
                user_email: self.customer.user_email,
                user_name: self.customer.user_name,
                user_phone: self.customer.user_phone,
            },
            delivery_address: DeliveryAddress {
                street: self.delivery_address.street,
                city: self.delivery_address.city,
                postal_code: self.delivery_address.postal_code,
                instructions: self.delivery_address.instructions,
            },
            payment_method: self.payment_method,
            promo_code: self.promo_code,
            order_notes: self.order_notes,
            lines,
        })
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /orders
///
/// Splits the checkout into one sub-order per supplier and stores the master
/// order with its sub-orders in a single write.
#[utoipa::path(
    post,
    path = "/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order placed", body = CreateOrderResponse),
        (status = 400, description = "Invalid checkout"),
        (status = 503, description = "Store unavailable"),
    ),
    tag = "orders"
)]
pub async fn create_order(
    platform: web::Data<OrderPlatform>,
    body: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    body.validate()?;

    let placed = platform.orders.place_order(body.into_checkout()?).await?;

    Ok(HttpResponse::Created().json(CreateOrderResponse {
        id: placed.master.id,
        sub_order_ids: placed.sub_orders.into_iter().map(|s| s.id).collect(),
    }))
}

/// GET /orders/{id}
///
/// Returns the master order together with its sub-orders, oldest first.
#[utoipa::path(
    get,
    path = "/orders/{id}",
    params(
        ("id" = String, Path, description = "Master order id"),
    ),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 404, description = "Order not found"),
    ),
    tag = "orders"
)]
pub async fn get_order(
    platform: web::Data<OrderPlatform>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let placed = platform
        .orders
        .get_order(&path.into_inner())
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(HttpResponse::Ok().json(OrderResponse {
        order: placed.master,
        sub_orders: placed.sub_orders,
    }))
}
