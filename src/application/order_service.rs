use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::Utc;
use uuid::Uuid;
use validator::ValidateEmail;

use crate::domain::display::round_cents;
use crate::domain::errors::DomainError;
use crate::domain::order::{
    Amounts, Customer, DeliveryAddress, MasterOrder, OrderItem, OrderStatus, PaymentStatus,
    SubOrder,
};
use crate::domain::ports::{MasterOrderRepository, SubOrderRepository};

#[derive(Debug, Clone)]
pub struct CheckoutLine {
    pub fournisseur_id: String,
    pub fournisseur_name: String,
    pub product_id: String,
    pub product_name: String,
    pub product_image: Option<String>,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub unit: String,
}

#[derive(Debug, Clone)]
pub struct NewCheckout {
    pub customer: Customer,
    pub delivery_address: DeliveryAddress,
    pub payment_method: String,
    pub promo_code: Option<String>,
    pub order_notes: Option<String>,
    pub delivery_fee: BigDecimal,
    pub tax: BigDecimal,
    pub promo_discount: BigDecimal,
    pub lines: Vec<CheckoutLine>,
}

#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub master: MasterOrder,
    pub sub_orders: Vec<SubOrder>,
}

pub struct OrderService {
    masters: Arc<dyn MasterOrderRepository>,
    sub_orders: Arc<dyn SubOrderRepository>,
}

impl OrderService {
    pub fn new(masters: Arc<dyn MasterOrderRepository>, sub_orders: Arc<dyn SubOrderRepository>) -> Self {
        Self { masters, sub_orders }
    }

    /// Split a checkout into one sub-order per supplier and store the whole
    /// group in a single atomic write.
    pub async fn place_order(&self, checkout: NewCheckout) -> Result<PlacedOrder, DomainError> {
        let placed = build_order(checkout)?;
        self.masters
            .create_with_sub_orders(&placed.master, &placed.sub_orders)
            .await?;
        log::info!(
            "Placed master order {} with {} sub-order(s), total {}",
            placed.master.id,
            placed.sub_orders.len(),
            placed.master.amounts.total
        );
        Ok(placed)
    }

    /// Master order with its sub-orders, oldest first.
    pub async fn get_order(&self, id: &str) -> Result<Option<PlacedOrder>, DomainError> {
        let Some(master) = self.masters.find_by_id(id).await? else {
            return Ok(None);
        };
        let mut sub_orders = self.sub_orders.list_by_master(id).await?;
        sub_orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(Some(PlacedOrder { master, sub_orders }))
    }
}

fn zero() -> BigDecimal {
    BigDecimal::from(0)
}

fn sum<'a>(values: impl Iterator<Item = &'a BigDecimal>) -> BigDecimal {
    values.fold(zero(), |acc, v| acc + v)
}

fn validate(checkout: &NewCheckout) -> Result<(), DomainError> {
    if checkout.lines.is_empty() {
        return Err(DomainError::InvalidInput("checkout has no items".into()));
    }
    if !checkout.customer.user_email.validate_email() {
        return Err(DomainError::InvalidInput(format!(
            "invalid customer email '{}'",
            checkout.customer.user_email
        )));
    }
    for (name, amount) in [
        ("delivery fee", &checkout.delivery_fee),
        ("tax", &checkout.tax),
        ("promo discount", &checkout.promo_discount),
    ] {
        if *amount < zero() {
            return Err(DomainError::InvalidInput(format!("{name} must not be negative")));
        }
    }
    for line in &checkout.lines {
        if line.fournisseur_id.trim().is_empty() {
            return Err(DomainError::InvalidInput(format!(
                "product {} has no supplier",
                line.product_id
            )));
        }
        if line.quantity <= 0 {
            return Err(DomainError::InvalidInput(format!(
                "quantity for product {} must be positive",
                line.product_id
            )));
        }
        if line.unit_price < zero() {
            return Err(DomainError::InvalidInput(format!(
                "unit price for product {} must not be negative",
                line.product_id
            )));
        }
    }
    Ok(())
}

/// Split `total` across `weights` proportionally, in cents. The last share
/// takes the rounding residue so the parts always add up to `total`.
pub fn allocate(total: &BigDecimal, weights: &[BigDecimal]) -> Vec<BigDecimal> {
    if weights.is_empty() {
        return vec![];
    }
    let total = round_cents(total);
    let weight_sum = sum(weights.iter());
    let count = BigDecimal::from(weights.len() as i64);

    let mut shares = Vec::with_capacity(weights.len());
    let mut allocated = zero();
    for (i, weight) in weights.iter().enumerate() {
        let share = if i + 1 == weights.len() {
            &total - &allocated
        } else if weight_sum == zero() {
            round_cents(&(&total / &count))
        } else {
            round_cents(&(&total * weight / &weight_sum))
        };
        allocated += &share;
        shares.push(share);
    }
    shares
}

fn build_order(checkout: NewCheckout) -> Result<PlacedOrder, DomainError> {
    validate(&checkout)?;

    // Group lines per supplier, keeping first-seen supplier order.
    let mut groups: Vec<(String, String, Vec<OrderItem>)> = Vec::new();
    for line in checkout.lines {
        let quantity = BigDecimal::from(line.quantity);
        let item = OrderItem {
            product_id: line.product_id,
            product_name: line.product_name,
            product_image: line.product_image,
            quantity: line.quantity,
            total_price: round_cents(&(&line.unit_price * &quantity)),
            unit_price: line.unit_price,
            unit: line.unit,
        };
        match groups.iter_mut().find(|(id, _, _)| *id == line.fournisseur_id) {
            Some((_, _, items)) => items.push(item),
            None => groups.push((line.fournisseur_id, line.fournisseur_name, vec![item])),
        }
    }

    let subtotals: Vec<BigDecimal> = groups
        .iter()
        .map(|(_, _, items)| sum(items.iter().map(|i| &i.total_price)))
        .collect();
    let delivery_fees = allocate(&checkout.delivery_fee, &subtotals);
    let taxes = allocate(&checkout.tax, &subtotals);
    let discounts = allocate(&checkout.promo_discount, &subtotals);

    let now = Utc::now();
    let master_id = Uuid::new_v4().to_string();
    let mut sub_orders = Vec::with_capacity(groups.len());
    for (i, (fournisseur_id, fournisseur_name, items)) in groups.into_iter().enumerate() {
        let amounts = amounts(&subtotals[i], &delivery_fees[i], &taxes[i], &discounts[i])?;
        sub_orders.push(SubOrder {
            id: Uuid::new_v4().to_string(),
            master_order_id: master_id.clone(),
            fournisseur_id,
            fournisseur_name,
            customer: checkout.customer.clone(),
            items,
            delivery_address: checkout.delivery_address.clone(),
            amounts,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
            confirmed_at: None,
            delivered_at: None,
        });
    }

    let master_amounts = amounts(
        &sum(subtotals.iter()),
        &round_cents(&checkout.delivery_fee),
        &round_cents(&checkout.tax),
        &round_cents(&checkout.promo_discount),
    )?;
    let master = MasterOrder {
        id: master_id,
        customer: checkout.customer,
        amounts: master_amounts,
        status: OrderStatus::Pending,
        payment_status: PaymentStatus::Pending,
        payment_method: checkout.payment_method,
        delivery_address: checkout.delivery_address,
        promo_code: checkout.promo_code,
        order_notes: checkout.order_notes,
        sub_order_ids: sub_orders.iter().map(|s| s.id.clone()).collect(),
        fournisseur_count: sub_orders.len() as i32,
        created_at: now,
        updated_at: now,
        confirmed_at: None,
        delivered_at: None,
    };

    Ok(PlacedOrder { master, sub_orders })
}

fn amounts(
    subtotal: &BigDecimal,
    delivery_fee: &BigDecimal,
    tax: &BigDecimal,
    promo_discount: &BigDecimal,
) -> Result<Amounts, DomainError> {
    let total = subtotal + delivery_fee + tax - promo_discount;
    if total < zero() {
        return Err(DomainError::InvalidInput(
            "promo discount exceeds the order amount".into(),
        ));
    }
    Ok(Amounts {
        subtotal: subtotal.clone(),
        delivery_fee: delivery_fee.clone(),
        tax: tax.clone(),
        promo_discount: promo_discount.clone(),
        total: round_cents(&total),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::memory::MemoryStore;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn line(supplier: &str, product: &str, qty: i32, price: &str) -> CheckoutLine {
        CheckoutLine {
            fournisseur_id: supplier.into(),
            fournisseur_name: format!("Supplier {supplier}"),
            product_id: product.into(),
            product_name: format!("Product {product}"),
            product_image: None,
            quantity: qty,
            unit_price: dec(price),
            unit: "piece".into(),
        }
    }

    fn checkout(lines: Vec<CheckoutLine>) -> NewCheckout {
        NewCheckout {
            customer: Customer {
                user_id: "u-1".into(),
                user_email: "alice@example.com".into(),
                user_name: "Alice".into(),
                user_phone: "0600000000".into(),
            },
            delivery_address: DeliveryAddress::default(),
            payment_method: "card".into(),
            promo_code: None,
            order_notes: None,
            delivery_fee: dec("3.00"),
            tax: dec("1.00"),
            promo_discount: dec("0"),
            lines,
        }
    }

    #[test]
    fn lines_are_grouped_per_supplier_in_first_seen_order() {
        let placed = build_order(checkout(vec![
            line("X", "a", 2, "5.00"),
            line("Y", "b", 1, "15.00"),
            line("X", "c", 1, "10.00"),
        ]))
        .unwrap();

        assert_eq!(placed.sub_orders.len(), 2);
        assert_eq!(placed.master.fournisseur_count, 2);
        let x = &placed.sub_orders[0];
        assert_eq!(x.fournisseur_id, "X");
        assert_eq!(x.items.len(), 2);
        assert_eq!(x.items[0].total_price, dec("10.00"));
        assert_eq!(x.amounts.subtotal, dec("20.00"));
        assert_eq!(placed.sub_orders[1].amounts.subtotal, dec("15.00"));
        assert!(placed
            .sub_orders
            .iter()
            .all(|s| s.master_order_id == placed.master.id && s.status == OrderStatus::Pending));
        assert_eq!(placed.master.sub_order_ids.len(), 2);
    }

    #[test]
    fn fees_are_allocated_so_parts_sum_to_master() {
        let placed = build_order(checkout(vec![
            line("X", "a", 1, "10.00"),
            line("Y", "b", 1, "10.00"),
            line("Z", "c", 1, "10.00"),
        ]))
        .unwrap();

        let fee_sum = sum(placed.sub_orders.iter().map(|s| &s.amounts.delivery_fee));
        let total_sum = sum(placed.sub_orders.iter().map(|s| &s.amounts.total));
        assert_eq!(fee_sum, dec("3.00"));
        assert_eq!(total_sum, placed.master.amounts.total);
        assert_eq!(placed.master.amounts.total, dec("34.00"));
    }

    #[test]
    fn allocation_handles_rounding_and_zero_weights() {
        let shares = allocate(&dec("1.00"), &[dec("1"), dec("1"), dec("1")]);
        assert_eq!(shares, vec![dec("0.33"), dec("0.33"), dec("0.34")]);

        let even = allocate(&dec("2.00"), &[dec("0"), dec("0")]);
        assert_eq!(even, vec![dec("1.00"), dec("1.00")]);
    }

    #[test]
    fn invalid_checkouts_are_rejected() {
        assert!(build_order(checkout(vec![])).is_err());
        assert!(build_order(checkout(vec![line("X", "a", 0, "1.00")])).is_err());

        let mut bad_email = checkout(vec![line("X", "a", 1, "1.00")]);
        bad_email.customer.user_email = "nope".into();
        assert!(matches!(build_order(bad_email), Err(DomainError::InvalidInput(_))));

        let mut too_generous = checkout(vec![line("X", "a", 1, "1.00")]);
        too_generous.promo_discount = dec("100");
        assert!(build_order(too_generous).is_err());
    }

    #[tokio::test]
    async fn placed_order_can_be_read_back() {
        let store = Arc::new(MemoryStore::new());
        let service = OrderService::new(store.clone(), store.clone());

        let placed = service
            .place_order(checkout(vec![line("X", "a", 2, "5.00"), line("Y", "b", 1, "15.00")]))
            .await
            .unwrap();

        let read = service.get_order(&placed.master.id).await.unwrap().unwrap();
        assert_eq!(read.master, placed.master);
        assert_eq!(read.sub_orders.len(), 2);
        assert!(service.get_order("missing").await.unwrap().is_none());
    }
}
