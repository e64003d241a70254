//! Human-facing renderings shared by templates and API responses.

use bigdecimal::{BigDecimal, RoundingMode};

/// Display order number: the trailing 8 characters of the id, uppercased.
///
/// Not unique; never use it to look an order up.
pub fn order_number(id: &str) -> String {
    let chars: Vec<char> = id.chars().collect();
    let start = chars.len().saturating_sub(8);
    chars[start..].iter().collect::<String>().to_uppercase()
}

/// Currency amount with exactly two decimal digits, half-up rounded.
pub fn format_money(amount: &BigDecimal) -> String {
    round_cents(amount).to_string()
}

pub fn round_cents(amount: &BigDecimal) -> BigDecimal {
    amount.with_scale_round(2, RoundingMode::HalfUp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn order_number_takes_trailing_eight_uppercased() {
        assert_eq!(order_number("abcXYZ0123456789"), "23456789");
        assert_eq!(order_number("0f3a9c2e-77aa-4d1b-9e55-4b1c2d3eabcd"), "2D3EABCD");
    }

    #[test]
    fn short_ids_are_shown_whole() {
        assert_eq!(order_number("ab12"), "AB12");
        assert_eq!(order_number("abcdefgh"), "ABCDEFGH");
        assert_eq!(order_number(""), "");
    }

    #[test]
    fn money_always_has_two_decimals() {
        assert_eq!(format_money(&BigDecimal::from(20)), "20.00");
        assert_eq!(format_money(&BigDecimal::from_str("15.5").unwrap()), "15.50");
        assert_eq!(format_money(&BigDecimal::from_str("3.14159").unwrap()), "3.14");
        assert_eq!(format_money(&BigDecimal::from_str("0.125").unwrap()), "0.13");
    }
}
