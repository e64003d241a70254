#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use bigdecimal::BigDecimal;
use food_orders::application::listener::{BurstPolicy, ListenerConfig};
use food_orders::application::notification_queue::RetryPolicy;
use food_orders::application::order_service::{CheckoutLine, NewCheckout};
use food_orders::application::{OrderPlatform, PlatformSettings, Ports};
use food_orders::domain::notification::{Audience, OutgoingEmail, SupplierContact};
use food_orders::domain::order::{Customer, DeliveryAddress};
use food_orders::infrastructure::memory::{MemoryMailer, MemoryStore};

pub const COOLDOWN: Duration = Duration::from_millis(30);

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<MemoryMailer>,
    pub platform: Arc<OrderPlatform>,
}

/// Platform over the in-memory store with two known suppliers and three
/// stocked products.
pub fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let mailer = Arc::new(MemoryMailer::new());
    for (id, name) in [("sup-bakery", "Le Fournil"), ("sup-dairy", "Laiterie Martin")] {
        store.put_supplier(SupplierContact {
            id: id.into(),
            display_name: name.into(),
            email: format!("{id}@suppliers.example.com"),
            business_name: Some(name.into()),
            phone: None,
            address: None,
        });
    }
    store.put_product("baguette", 20);
    store.put_product("croissant", 10);
    store.put_product("milk", 5);

    let settings = PlatformSettings {
        listener: ListenerConfig {
            cooldown: COOLDOWN,
            burst_policy: BurstPolicy::DebouncePerOrder,
        },
        retry: RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(5),
        },
        queue_capacity: 16,
    };
    let platform = Arc::new(OrderPlatform::start(
        Ports::in_memory(store.clone(), mailer.clone()),
        settings,
    ));
    Harness {
        store,
        mailer,
        platform,
    }
}

fn line(supplier: &str, product: &str, quantity: i32, price: &str) -> CheckoutLine {
    CheckoutLine {
        fournisseur_id: supplier.into(),
        fournisseur_name: supplier.trim_start_matches("sup-").into(),
        product_id: product.into(),
        product_name: product.into(),
        product_image: None,
        quantity,
        unit_price: BigDecimal::from_str(price).unwrap(),
        unit: "piece".into(),
    }
}

/// Two suppliers: bakery (2 baguettes + 3 croissants) and dairy (1 milk).
pub fn checkout() -> NewCheckout {
    NewCheckout {
        customer: Customer {
            user_id: "user-42".into(),
            user_email: "alice@example.com".into(),
            user_name: "Alice".into(),
            user_phone: "+33600000000".into(),
        },
        delivery_address: DeliveryAddress {
            street: "12 rue des Lilas".into(),
            city: "Lyon".into(),
            postal_code: "69003".into(),
            instructions: None,
        },
        payment_method: "card".into(),
        promo_code: None,
        order_notes: None,
        delivery_fee: BigDecimal::from_str("4.00").unwrap(),
        tax: BigDecimal::from(0),
        promo_discount: BigDecimal::from(0),
        lines: vec![
            line("sup-bakery", "baguette", 2, "1.20"),
            line("sup-bakery", "croissant", 3, "1.10"),
            line("sup-dairy", "milk", 1, "0.95"),
        ],
    }
}

pub fn sent_to(mailer: &MemoryMailer, audience: Audience) -> Vec<OutgoingEmail> {
    mailer
        .sent()
        .into_iter()
        .filter(|email| email.audience == audience)
        .collect()
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

pub async fn settle() {
    tokio::time::sleep(COOLDOWN * 4).await;
}
