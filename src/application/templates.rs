//! Email and in-app notification texts.
//!
//! Rendering is plain `{{placeholder}}` substitution over a fixed set of keys.
//! Templates are looked up through exhaustive matches on the status enums, so
//! there is no fallback template for an unknown status: such a status never
//! gets past parsing.

use crate::domain::display::{format_money, order_number};
use crate::domain::notification::{EventType, SupplierContact};
use crate::domain::order::{Amounts, Customer, DeliveryAddress, MasterOrder, OrderItem, OrderStatus, SubOrder};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub text: String,
    pub html: String,
}

struct Template {
    subject: &'static str,
    body: &'static str,
}

const SUPPLIER_NEW_ORDER: Template = Template {
    subject: "New order #{{order_number}} from {{customer_name}}",
    body: "Hello {{supplier_name}},\n\n\
           You have received a new order #{{order_number}} from {{customer_name}} ({{customer_phone}}).\n\n\
           Items:\n{{items}}\n\n\
           Subtotal: {{subtotal}}\nDelivery fee: {{delivery_fee}}\nTax: {{tax}}\nDiscount: {{promo_discount}}\nTotal: {{total}}\n\n\
           Delivery address: {{address}}\n\n\
           Please confirm the order from your dashboard.",
};

fn supplier_template(status: OrderStatus) -> Template {
    match status {
        OrderStatus::Pending => Template {
            subject: "Order #{{order_number}} is awaiting your confirmation",
            body: "Hello {{supplier_name}},\n\n\
                   Order #{{order_number}} from {{customer_name}} is still pending.\n\n\
                   Items:\n{{items}}\n\nTotal: {{total}}\n\n\
                   Please confirm it from your dashboard.",
        },
        OrderStatus::Confirmed => Template {
            subject: "Order #{{order_number}} confirmed",
            body: "Hello {{supplier_name}},\n\n\
                   Order #{{order_number}} for {{customer_name}} is confirmed (payment: {{payment_status}}).\n\n\
                   Items:\n{{items}}\n\nTotal: {{total}}",
        },
        OrderStatus::Preparing => Template {
            subject: "Order #{{order_number}} is being prepared",
            body: "Hello {{supplier_name}},\n\n\
                   Order #{{order_number}} for {{customer_name}} is now in preparation.\n\n\
                   Items:\n{{items}}",
        },
        OrderStatus::OutForDelivery => Template {
            subject: "Order #{{order_number}} is out for delivery",
            body: "Hello {{supplier_name}},\n\n\
                   Order #{{order_number}} has left for {{address}}.\n\
                   Customer: {{customer_name}} ({{customer_phone}})\n\nTotal: {{total}}",
        },
        OrderStatus::Delivered => Template {
            subject: "Order #{{order_number}} delivered",
            body: "Hello {{supplier_name}},\n\n\
                   Order #{{order_number}} was delivered to {{customer_name}}.\n\n\
                   Total: {{total}} (payment: {{payment_status}})",
        },
        OrderStatus::Cancelled => Template {
            subject: "Order #{{order_number}} cancelled",
            body: "Hello {{supplier_name}},\n\n\
                   Order #{{order_number}} from {{customer_name}} has been cancelled.\n\n\
                   Items:\n{{items}}\n\nTotal: {{total}}",
        },
    }
}

fn customer_template(status: OrderStatus) -> Template {
    match status {
        OrderStatus::Pending => Template {
            subject: "We received your order #{{order_number}}",
            body: "Hello {{customer_name}},\n\n\
                   Thank you for your order #{{order_number}}. It is waiting for confirmation \
                   from {{supplier_count}} supplier(s).\n\nTotal: {{total}}\nPayment: {{payment_status}}",
        },
        OrderStatus::Confirmed => Template {
            subject: "Your order #{{order_number}} is confirmed",
            body: "Hello {{customer_name}},\n\n\
                   Good news: your order #{{order_number}} has been confirmed.\n\n\
                   Total: {{total}}\nPayment: {{payment_status}}\nDelivery address: {{address}}",
        },
        OrderStatus::Preparing => Template {
            subject: "Your order #{{order_number}} is being prepared",
            body: "Hello {{customer_name}},\n\n\
                   Your order #{{order_number}} is being prepared.\n\nTotal: {{total}}",
        },
        OrderStatus::OutForDelivery => Template {
            subject: "Your order #{{order_number}} is on its way",
            body: "Hello {{customer_name}},\n\n\
                   Your order #{{order_number}} is out for delivery to {{address}}.\n\nTotal: {{total}}",
        },
        OrderStatus::Delivered => Template {
            subject: "Your order #{{order_number}} has been delivered",
            body: "Hello {{customer_name}},\n\n\
                   Your order #{{order_number}} has been delivered. Enjoy your meal!\n\n\
                   Total: {{total}}\nPayment: {{payment_status}}",
        },
        OrderStatus::Cancelled => Template {
            subject: "Your order #{{order_number}} has been cancelled",
            body: "Hello {{customer_name}},\n\n\
                   Your order #{{order_number}} has been cancelled.\n\n\
                   Total: {{total}}\nPayment: {{payment_status}}",
        },
    }
}

/// Replace every `{{key}}` with its value in one pass. Inserted values are
/// copied verbatim; unknown placeholders are left as is.
pub fn render(template: &str, vars: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let key = &after[..end];
        match vars.iter().find(|(k, _)| *k == key) {
            Some((_, value)) => out.push_str(value),
            None => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}

pub fn format_items(items: &[OrderItem]) -> String {
    items
        .iter()
        .map(|item| {
            format!(
                "- {} x {} ({}) @ {} = {}",
                item.quantity,
                item.product_name,
                item.unit,
                format_money(&item.unit_price),
                format_money(&item.total_price)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn common_vars(
    id: &str,
    customer: &Customer,
    amounts: &Amounts,
    address: &DeliveryAddress,
    payment_status: &str,
) -> Vec<(&'static str, String)> {
    vec![
        ("order_number", order_number(id)),
        ("customer_name", customer.user_name.clone()),
        ("customer_email", customer.user_email.clone()),
        ("customer_phone", customer.user_phone.clone()),
        ("subtotal", format_money(&amounts.subtotal)),
        ("delivery_fee", format_money(&amounts.delivery_fee)),
        ("tax", format_money(&amounts.tax)),
        ("promo_discount", format_money(&amounts.promo_discount)),
        ("total", format_money(&amounts.total)),
        ("address", address.formatted()),
        ("payment_status", payment_status.to_string()),
    ]
}

pub fn supplier_email(order: &SubOrder, contact: &SupplierContact, event: EventType) -> RenderedEmail {
    let template = match event {
        EventType::NewOrder => SUPPLIER_NEW_ORDER,
        EventType::StatusUpdate | EventType::ManualTrigger => supplier_template(order.status),
    };
    let mut vars = common_vars(
        &order.id,
        &order.customer,
        &order.amounts,
        &order.delivery_address,
        order.payment_status.as_str(),
    );
    vars.push(("supplier_name", contact.display_name.clone()));
    vars.push(("items", format_items(&order.items)));
    finish(&template, &vars)
}

pub fn customer_email(order: &MasterOrder) -> RenderedEmail {
    let template = customer_template(order.status);
    let mut vars = common_vars(
        &order.id,
        &order.customer,
        &order.amounts,
        &order.delivery_address,
        order.payment_status.as_str(),
    );
    vars.push(("supplier_count", order.fournisseur_count.to_string()));
    finish(&template, &vars)
}

fn finish(template: &Template, vars: &[(&str, String)]) -> RenderedEmail {
    let subject = render(template.subject, vars);
    let text = render(template.body, vars);
    let html = to_html(&subject, &text);
    RenderedEmail { subject, text, html }
}

fn to_html(subject: &str, text: &str) -> String {
    let paragraphs = text
        .split("\n\n")
        .map(|p| format!("<p>{}</p>", escape_html(p).replace('\n', "<br>")))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{}</title></head>\n\
         <body style=\"font-family: Arial, sans-serif; color: #333;\">\n{}\n</body></html>",
        escape_html(subject),
        paragraphs
    )
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Title and message of the in-app notification for an order state.
pub fn in_app_text(id: &str, status: OrderStatus, event: EventType) -> (String, String) {
    let number = order_number(id);
    if event == EventType::NewOrder {
        return (
            "New order received".to_string(),
            format!("Order #{number} is waiting for your confirmation."),
        );
    }
    match status {
        OrderStatus::Pending => (
            "Order pending".to_string(),
            format!("Order #{number} is awaiting confirmation."),
        ),
        OrderStatus::Confirmed => (
            "Order confirmed".to_string(),
            format!("Order #{number} has been confirmed."),
        ),
        OrderStatus::Preparing => (
            "Order in preparation".to_string(),
            format!("Order #{number} is being prepared."),
        ),
        OrderStatus::OutForDelivery => (
            "Order out for delivery".to_string(),
            format!("Order #{number} is on its way."),
        ),
        OrderStatus::Delivered => (
            "Order delivered".to_string(),
            format!("Order #{number} has been delivered."),
        ),
        OrderStatus::Cancelled => (
            "Order cancelled".to_string(),
            format!("Order #{number} has been cancelled."),
        ),
    }
}
