//! Payment provider abstraction.
//!
//! Checkout never talks to a provider directly; it goes through
//! [`PaymentGateway`] so the provider can be swapped (or faked in tests).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

pub mod chapa;

/// Prefix shared by every tx_ref this store issues.
pub const TX_REF_PREFIX: &str = "JF";
/// Prefix of order numbers, used to locate the order number inside a tx_ref.
pub const ORDER_NUMBER_PREFIX: &str = "JF-";

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment provider is not configured")]
    NotConfigured,

    #[error("payment provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("payment provider rejected the request: {0}")]
    Rejected(String),

    #[error("payment not successful: {0}")]
    NotSuccessful(String),
}

/// What the provider needs to open a hosted checkout page.
#[derive(Debug, Clone)]
pub struct InitializePayment {
    pub tx_ref: String,
    /// Amount in minor units.
    pub amount: i64,
    pub currency: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub order_id: String,
    pub order_number: String,
    pub guest: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CheckoutSession {
    pub checkout_url: String,
    pub tx_ref: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentVerification {
    pub tx_ref: String,
    pub successful: bool,
    /// Amount reported by the provider, in minor units, when present.
    pub amount: Option<i64>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initialize(&self, request: &InitializePayment) -> Result<CheckoutSession, PaymentError>;

    async fn verify(&self, tx_ref: &str) -> Result<PaymentVerification, PaymentError>;
}

/// `JF_<order_number>_<unix timestamp>`
pub fn build_tx_ref(order_number: &str, timestamp: i64) -> String {
    format!("{TX_REF_PREFIX}_{order_number}_{timestamp}")
}

/// Order number embedded in a tx_ref, if any.
pub fn order_number_from_tx_ref(tx_ref: &str) -> Option<&str> {
    tx_ref
        .split('_')
        .find(|part| part.starts_with(ORDER_NUMBER_PREFIX) && part.len() > ORDER_NUMBER_PREFIX.len())
}

/// Minor units rendered as a decimal major-unit string, e.g. `4999` -> `"49.99"`.
pub fn format_amount(minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

/// Decimal major-unit string back to minor units. Extra fraction digits are truncated.
pub fn parse_amount(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    let (whole, fraction) = raw.split_once('.').unwrap_or((raw, ""));
    let whole: i64 = whole.parse().ok()?;
    let mut cents = 0_i64;
    for (idx, digit) in fraction.chars().take(2).enumerate() {
        let value = i64::from(digit.to_digit(10)?);
        cents += if idx == 0 { value * 10 } else { value };
    }
    Some(whole * 100 + cents)
}

/// Splits a display name into provider first/last name fields.
pub fn split_name(full_name: &str) -> (String, String) {
    let mut parts = full_name.split_whitespace();
    let first = parts.next().unwrap_or("Customer").to_string();
    let last = parts.collect::<Vec<_>>().join(" ");
    (first, last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_ref_carries_order_number() {
        let tx_ref = build_tx_ref("JF-20250101-ABCDEF12", 1_700_000_000);
        assert_eq!(tx_ref, "JF_JF-20250101-ABCDEF12_1700000000");
        assert_eq!(order_number_from_tx_ref(&tx_ref), Some("JF-20250101-ABCDEF12"));
    }

    #[test]
    fn tx_ref_without_order_number_is_rejected() {
        assert_eq!(order_number_from_tx_ref("JF_1700000000"), None);
        assert_eq!(order_number_from_tx_ref("JF_JF-_1"), None);
        assert_eq!(order_number_from_tx_ref(""), None);
    }

    #[test]
    fn amounts_render_as_major_units() {
        assert_eq!(format_amount(4999), "49.99");
        assert_eq!(format_amount(100), "1.00");
        assert_eq!(format_amount(5), "0.05");
        assert_eq!(parse_amount("49.99"), Some(4999));
        assert_eq!(parse_amount("120"), Some(12_000));
        assert_eq!(parse_amount("1.5"), Some(150));
        assert_eq!(parse_amount("abc"), None);
    }

    #[test]
    fn names_split_on_first_space() {
        assert_eq!(
            split_name("Abebe Kebede Tesfaye"),
            ("Abebe".to_string(), "Kebede Tesfaye".to_string())
        );
        assert_eq!(split_name(""), ("Customer".to_string(), String::new()));
    }
}
