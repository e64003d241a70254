use actix_web::{web, HttpResponse};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::application::OrderPlatform;
use crate::domain::stock::{StockDecrementResult, StockLine};
use crate::errors::AppError;

#[derive(Debug, Deserialize, ToSchema)]
pub struct DecrementRequest {
    pub items: Vec<StockLine>,
}

/// POST /stock/decrement
///
/// All-or-nothing: either every line is applied or none is.
#[utoipa::path(
    post,
    path = "/stock/decrement",
    request_body = DecrementRequest,
    responses(
        (status = 200, description = "Stock decremented", body = StockDecrementResult),
        (status = 409, description = "Nothing applied, see errors", body = StockDecrementResult),
        (status = 503, description = "Inventory store unavailable"),
    ),
    tag = "stock"
)]
pub async fn decrement(
    platform: web::Data<OrderPlatform>,
    body: web::Json<DecrementRequest>,
) -> Result<HttpResponse, AppError> {
    let result = platform.stock.try_decrement_stock(&body.items).await?;
    if result.success {
        Ok(HttpResponse::Ok().json(result))
    } else {
        Ok(HttpResponse::Conflict().json(result))
    }
}
