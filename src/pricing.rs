//! Order pricing.
//!
//! Amounts are integer minor units (cents). The same rules price the cart
//! preview and the order written at checkout, so both always agree.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingRules {
    /// Flat shipping fee added to every order.
    pub shipping_fee: i64,
    /// Discounted subtotal at or above which shipping is free. `None` disables it.
    pub free_shipping_threshold: Option<i64>,
    /// Total item quantity needed for the bulk discount.
    pub bulk_discount_min_items: i64,
    /// Bulk discount in whole percent of the subtotal.
    pub bulk_discount_percent: i64,
}

impl Default for PricingRules {
    fn default() -> Self {
        Self {
            shipping_fee: 4999,
            free_shipping_threshold: None,
            bulk_discount_min_items: 4,
            bulk_discount_percent: 15,
        }
    }
}

/// One priced line: unit price captured at quote time and a quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    pub unit_price: i64,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OrderQuote {
    pub item_count: i64,
    pub subtotal: i64,
    pub discount_amount: i64,
    pub shipping_fee: i64,
    pub total_amount: i64,
}

impl PricingRules {
    pub fn quote(&self, lines: &[PricedLine]) -> OrderQuote {
        let subtotal: i64 = lines
            .iter()
            .map(|line| line.unit_price * i64::from(line.quantity))
            .sum();
        let item_count: i64 = lines.iter().map(|line| i64::from(line.quantity)).sum();

        let discount_amount = if item_count >= self.bulk_discount_min_items {
            percent_of(subtotal, self.bulk_discount_percent)
        } else {
            0
        };

        let discounted = subtotal - discount_amount;
        let shipping_fee = match self.free_shipping_threshold {
            Some(threshold) if discounted >= threshold => 0,
            _ if lines.is_empty() => 0,
            _ => self.shipping_fee,
        };

        OrderQuote {
            item_count,
            subtotal,
            discount_amount,
            shipping_fee,
            total_amount: discounted + shipping_fee,
        }
    }
}

/// `amount * percent / 100`, rounded half up.
fn percent_of(amount: i64, percent: i64) -> i64 {
    (amount * percent + 50) / 100
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(unit_price: i64, quantity: i32) -> PricedLine {
        PricedLine {
            unit_price,
            quantity,
        }
    }

    #[test]
    fn small_order_pays_flat_shipping() {
        let quote = PricingRules::default().quote(&[line(10_000, 1), line(2_500, 2)]);
        assert_eq!(quote.subtotal, 15_000);
        assert_eq!(quote.item_count, 3);
        assert_eq!(quote.discount_amount, 0);
        assert_eq!(quote.shipping_fee, 4_999);
        assert_eq!(quote.total_amount, 19_999);
    }

    #[test]
    fn four_items_get_fifteen_percent_off() {
        let quote = PricingRules::default().quote(&[line(10_000, 4)]);
        assert_eq!(quote.subtotal, 40_000);
        assert_eq!(quote.discount_amount, 6_000);
        assert_eq!(quote.total_amount, 34_000 + 4_999);
    }

    #[test]
    fn discount_rounds_half_up() {
        // 15% of 1_010 = 151.5
        let quote = PricingRules::default().quote(&[line(505, 2), line(0, 2)]);
        assert_eq!(quote.discount_amount, 152);
    }

    #[test]
    fn free_shipping_threshold_applies_to_discounted_subtotal() {
        let rules = PricingRules {
            free_shipping_threshold: Some(34_000),
            ..PricingRules::default()
        };
        assert_eq!(rules.quote(&[line(10_000, 4)]).shipping_fee, 0);
        assert_eq!(rules.quote(&[line(12_000, 3)]).shipping_fee, 0);
        assert_eq!(rules.quote(&[line(10_000, 3)]).shipping_fee, 4_999);
    }

    #[test]
    fn empty_cart_costs_nothing() {
        let quote = PricingRules::default().quote(&[]);
        assert_eq!(quote.total_amount, 0);
        assert_eq!(quote.shipping_fee, 0);
    }
}
