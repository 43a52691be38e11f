use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::PaymentConfig;

use super::{
    CheckoutSession, InitializePayment, PaymentError, PaymentGateway, PaymentVerification,
    format_amount, parse_amount,
};

/// Chapa hosted checkout over its REST API.
pub struct ChapaGateway {
    client: Client,
    config: PaymentConfig,
}

impl ChapaGateway {
    pub fn new(config: PaymentConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.chapa_base_url.trim_end_matches('/'), path)
    }

    fn secret(&self) -> Result<&str, PaymentError> {
        if self.config.chapa_secret_key.is_empty() {
            return Err(PaymentError::NotConfigured);
        }
        Ok(&self.config.chapa_secret_key)
    }
}

#[derive(Serialize)]
struct Customization<'a> {
    title: &'a str,
    description: String,
}

#[derive(Serialize)]
struct InitializeBody<'a> {
    amount: String,
    currency: &'a str,
    email: &'a str,
    first_name: &'a str,
    last_name: &'a str,
    tx_ref: &'a str,
    callback_url: &'a str,
    return_url: String,
    customization: Customization<'a>,
    meta: Value,
}

#[derive(Deserialize)]
struct Envelope<T> {
    status: String,
    #[serde(default)]
    message: Option<Value>,
    data: Option<T>,
}

#[derive(Deserialize)]
struct InitializeData {
    checkout_url: String,
}

#[derive(Deserialize)]
struct VerifyData {
    status: String,
    #[serde(default)]
    amount: Option<Value>,
}

fn amount_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::String(raw) => parse_amount(raw),
        Value::Number(number) => parse_amount(&number.to_string()),
        _ => None,
    }
}

fn message_text(message: Option<Value>) -> String {
    match message {
        Some(Value::String(text)) => text,
        Some(other) => other.to_string(),
        None => "no message".to_string(),
    }
}

#[async_trait]
impl PaymentGateway for ChapaGateway {
    async fn initialize(&self, request: &InitializePayment) -> Result<CheckoutSession, PaymentError> {
        let secret = self.secret()?;
        let return_url = format!("{}?tx_ref={}", self.config.return_url, request.tx_ref);

        let body = InitializeBody {
            amount: format_amount(request.amount),
            currency: &request.currency,
            email: &request.email,
            first_name: &request.first_name,
            last_name: &request.last_name,
            tx_ref: &request.tx_ref,
            callback_url: &self.config.callback_url,
            return_url,
            customization: Customization {
                title: "Jimmy Furniture",
                description: format!("Order {}", request.order_number),
            },
            meta: serde_json::json!({
                "order_id": request.order_id,
                "order_number": request.order_number,
                "user_type": if request.guest { "guest" } else { "registered" },
            }),
        };

        let response: Envelope<InitializeData> = self
            .client
            .post(self.endpoint("/v1/transaction/initialize"))
            .bearer_auth(secret)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        match (response.status.as_str(), response.data) {
            ("success", Some(data)) => Ok(CheckoutSession {
                checkout_url: data.checkout_url,
                tx_ref: request.tx_ref.clone(),
            }),
            _ => {
                let message = message_text(response.message);
                tracing::warn!(tx_ref = %request.tx_ref, %message, "chapa initialize rejected");
                Err(PaymentError::Rejected(message))
            }
        }
    }

    async fn verify(&self, tx_ref: &str) -> Result<PaymentVerification, PaymentError> {
        let secret = self.secret()?;

        let response: Envelope<VerifyData> = self
            .client
            .get(self.endpoint(&format!("/v1/transaction/verify/{tx_ref}")))
            .bearer_auth(secret)
            .send()
            .await?
            .json()
            .await?;

        let (successful, amount) = match (&response.status[..], &response.data) {
            ("success", Some(data)) => (
                data.status == "success",
                data.amount.as_ref().and_then(amount_from_value),
            ),
            _ => (false, None),
        };

        Ok(PaymentVerification {
            tx_ref: tx_ref.to_string(),
            successful,
            amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway(secret: &str) -> ChapaGateway {
        ChapaGateway::new(PaymentConfig {
            chapa_secret_key: secret.to_string(),
            chapa_base_url: "https://api.chapa.co/".to_string(),
            callback_url: "http://localhost/cb".to_string(),
            return_url: "http://localhost/done".to_string(),
        })
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        assert_eq!(
            gateway("k").endpoint("/v1/transaction/initialize"),
            "https://api.chapa.co/v1/transaction/initialize"
        );
    }

    #[test]
    fn missing_secret_is_reported() {
        assert!(matches!(gateway("").secret(), Err(PaymentError::NotConfigured)));
    }

    #[test]
    fn verify_amount_accepts_string_or_number() {
        assert_eq!(amount_from_value(&serde_json::json!("150.00")), Some(15_000));
        assert_eq!(amount_from_value(&serde_json::json!(150)), Some(15_000));
        assert_eq!(amount_from_value(&Value::Null), None);
    }
}
