use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StockLine {
    pub product_id: String,
    pub quantity: i32,
}

impl StockLine {
    pub fn new(product_id: impl Into<String>, quantity: i32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// New stock level for one product, produced only when the whole batch validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockWrite {
    pub product_id: String,
    pub new_quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StockDecrementResult {
    pub success: bool,
    pub errors: Vec<String>,
}

impl StockDecrementResult {
    pub fn applied() -> Self {
        Self {
            success: true,
            errors: vec![],
        }
    }

    pub fn rejected(errors: Vec<String>) -> Self {
        Self {
            success: false,
            errors,
        }
    }
}

/// Validate a decrement batch against current stock levels.
///
/// Lines naming the same product are summed first. Returns the full write set
/// only when every product has enough stock; otherwise every per-product error.
pub fn plan_decrement(
    lines: &[StockLine],
    current: &HashMap<String, i32>,
) -> Result<Vec<StockWrite>, Vec<String>> {
    let mut requested: Vec<(String, i64)> = Vec::new();
    for line in lines {
        match requested.iter_mut().find(|(id, _)| *id == line.product_id) {
            Some((_, qty)) => *qty += i64::from(line.quantity),
            None => requested.push((line.product_id.clone(), i64::from(line.quantity))),
        }
    }

    let mut writes = Vec::with_capacity(requested.len());
    let mut errors = Vec::new();
    for (product_id, qty) in requested {
        if qty <= 0 {
            errors.push(format!(
                "Invalid quantity {qty} for product {product_id}"
            ));
            continue;
        }
        match current.get(&product_id) {
            None => errors.push(format!("Product {product_id} not found")),
            Some(&stock) if i64::from(stock) < qty => errors.push(format!(
                "Insufficient stock for product {product_id}: available {stock}, requested {qty}"
            )),
            Some(&stock) => writes.push(StockWrite {
                product_id,
                // qty <= stock, so the difference fits in i32
                new_quantity: (i64::from(stock) - qty) as i32,
            }),
        }
    }

    if errors.is_empty() {
        Ok(writes)
    } else {
        Err(errors)
    }
}
