use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::application::OrderPlatform;
use crate::domain::order::{OrderStatus, PaymentStatus, SubOrder};
use crate::errors::AppError;

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
    pub payment_status: Option<PaymentStatus>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NotifyResponse {
    pub sent: bool,
}

#[utoipa::path(
    get,
    path = "/sub-orders/{id}",
    params(("id" = String, Path, description = "Sub-order id")),
    responses(
        (status = 200, description = "Sub-order found", body = SubOrder),
        (status = 404, description = "Sub-order not found"),
    ),
    tag = "sub-orders"
)]
pub async fn get_sub_order(
    platform: web::Data<OrderPlatform>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let order = platform
        .sub_orders
        .get(&path.into_inner())
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(HttpResponse::Ok().json(order))
}

/// PATCH /sub-orders/{id}/status
///
/// Moving into `out_for_delivery` decrements stock once; the master order is
/// re-synced after every successful write.
#[utoipa::path(
    patch,
    path = "/sub-orders/{id}/status",
    params(("id" = String, Path, description = "Sub-order id")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = SubOrder),
        (status = 400, description = "Unknown status value"),
        (status = 404, description = "Sub-order not found"),
        (status = 409, description = "Concurrent updates kept winning"),
    ),
    tag = "sub-orders"
)]
pub async fn update_status(
    platform: web::Data<OrderPlatform>,
    path: web::Path<String>,
    body: web::Json<UpdateStatusRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let updated = platform
        .sub_orders
        .update_status(&path.into_inner(), body.status, body.payment_status)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(HttpResponse::Ok().json(updated))
}

/// POST /sub-orders/{id}/notify
///
/// Re-sends the supplier notification for the current state.
#[utoipa::path(
    post,
    path = "/sub-orders/{id}/notify",
    params(("id" = String, Path, description = "Sub-order id")),
    responses(
        (status = 200, description = "Attempt recorded", body = NotifyResponse),
        (status = 404, description = "Sub-order not found"),
    ),
    tag = "sub-orders"
)]
pub async fn notify(
    platform: web::Data<OrderPlatform>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let sent = platform
        .sub_orders
        .notify(&path.into_inner())
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(HttpResponse::Ok().json(NotifyResponse { sent }))
}

#[utoipa::path(
    get,
    path = "/suppliers/{id}/sub-orders",
    params(("id" = String, Path, description = "Supplier id")),
    responses(
        (status = 200, description = "Supplier's sub-orders, newest first", body = [SubOrder]),
    ),
    tag = "sub-orders"
)]
pub async fn list_for_supplier(
    platform: web::Data<OrderPlatform>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let orders = platform
        .sub_orders
        .list_for_supplier(&path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(orders))
}
