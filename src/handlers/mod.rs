pub mod orders;
pub mod stock;
pub mod sub_orders;

use actix_web::{web, HttpResponse};
use utoipa::OpenApi;

use crate::domain::notification::{EventType, NotificationStatus};
use crate::domain::order::{
    Amounts, Customer, DeliveryAddress, MasterOrder, OrderItem, OrderStatus, PaymentStatus,
    SubOrder,
};
use crate::domain::stock::{StockDecrementResult, StockLine};

#[derive(OpenApi)]
#[openapi(
    paths(
        orders::create_order,
        orders::get_order,
        sub_orders::get_sub_order,
        sub_orders::update_status,
        sub_orders::notify,
        sub_orders::list_for_supplier,
        stock::decrement,
        health,
    ),
    components(schemas(
        orders::CreateOrderRequest,
        orders::CustomerRequest,
        orders::DeliveryAddressRequest,
        orders::CheckoutLineRequest,
        orders::CreateOrderResponse,
        orders::OrderResponse,
        sub_orders::UpdateStatusRequest,
        sub_orders::NotifyResponse,
        stock::DecrementRequest,
        MasterOrder,
        SubOrder,
        OrderItem,
        Customer,
        DeliveryAddress,
        Amounts,
        OrderStatus,
        PaymentStatus,
        EventType,
        NotificationStatus,
        StockLine,
        StockDecrementResult,
    )),
    tags(
        (name = "orders", description = "Checkout and master orders"),
        (name = "sub-orders", description = "Per-supplier fulfilment"),
        (name = "stock", description = "Inventory"),
    )
)]
pub struct ApiDoc;

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up")),
    tag = "orders"
)]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

/// Register every route on an app or scope.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .service(
            web::scope("/orders")
                .route("", web::post().to(orders::create_order))
                .route("/{id}", web::get().to(orders::get_order)),
        )
        .service(
            web::scope("/sub-orders")
                .route("/{id}", web::get().to(sub_orders::get_sub_order))
                .route("/{id}/status", web::patch().to(sub_orders::update_status))
                .route("/{id}/notify", web::post().to(sub_orders::notify)),
        )
        .route(
            "/suppliers/{id}/sub-orders",
            web::get().to(sub_orders::list_for_supplier),
        )
        .route("/stock/decrement", web::post().to(stock::decrement));
}
