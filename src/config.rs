use std::env;

use anyhow::Context;

use crate::pricing::PricingRules;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub session_cookie_name: String,
    pub session_cookie_secure: bool,
    pub cors_allowed_origins: Vec<String>,
    pub payment: PaymentConfig,
    pub pricing: PricingRules,
}

#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub chapa_secret_key: String,
    pub chapa_base_url: String,
    pub callback_url: String,
    pub return_url: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET is not set")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env_parse("APP_PORT").unwrap_or(3000);

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let payment = PaymentConfig {
            chapa_secret_key: env::var("CHAPA_SECRET_KEY").unwrap_or_default(),
            chapa_base_url: env::var("CHAPA_BASE_URL")
                .unwrap_or_else(|_| "https://api.chapa.co".to_string()),
            callback_url: env::var("PAYMENT_CALLBACK_URL").unwrap_or_else(|_| {
                format!("http://{host}:{port}/api/payments/callback")
            }),
            return_url: env::var("PAYMENT_RETURN_URL")
                .unwrap_or_else(|_| format!("http://{host}:{port}/payment-success")),
        };

        let defaults = PricingRules::default();
        let pricing = PricingRules {
            shipping_fee: env_parse("SHIPPING_FEE").unwrap_or(defaults.shipping_fee),
            free_shipping_threshold: env_parse("FREE_SHIPPING_THRESHOLD"),
            bulk_discount_min_items: env_parse("BULK_DISCOUNT_MIN_ITEMS")
                .unwrap_or(defaults.bulk_discount_min_items),
            bulk_discount_percent: env_parse("BULK_DISCOUNT_PERCENT")
                .unwrap_or(defaults.bulk_discount_percent),
        };

        Ok(Self {
            port,
            database_url,
            host,
            jwt_secret,
            session_cookie_name: env::var("SESSION_COOKIE_NAME")
                .unwrap_or_else(|_| "jf_session".to_string()),
            session_cookie_secure: env_parse("SESSION_COOKIE_SECURE").unwrap_or(false),
            cors_allowed_origins,
            payment,
            pricing,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|value| value.trim().parse::<T>().ok())
}
