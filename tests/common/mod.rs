#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use furniture_store::{
    config::{AppConfig, PaymentConfig},
    db::{create_pool, run_migrations},
    middleware::auth::AuthUser,
    models::Role,
    payments::{CheckoutSession, InitializePayment, PaymentError, PaymentGateway, PaymentVerification},
    pricing::PricingRules,
    state::AppState,
};
use uuid::Uuid;

pub const JWT_SECRET: &str = "test-secret";

pub fn test_config(database_url: &str) -> AppConfig {
    AppConfig {
        database_url: database_url.to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        jwt_secret: JWT_SECRET.to_string(),
        session_cookie_name: "jf_session".to_string(),
        session_cookie_secure: false,
        cors_allowed_origins: Vec::new(),
        payment: PaymentConfig {
            chapa_secret_key: String::new(),
            chapa_base_url: "http://127.0.0.1:9".to_string(),
            callback_url: "http://127.0.0.1/api/payments/callback".to_string(),
            return_url: "http://127.0.0.1/payment-success".to_string(),
        },
        pricing: PricingRules::default(),
    }
}

/// Provider double: every verification succeeds, reporting `reported_amount`.
pub struct FakeGateway {
    pub reported_amount: Option<i64>,
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn initialize(&self, request: &InitializePayment) -> Result<CheckoutSession, PaymentError> {
        Ok(CheckoutSession {
            checkout_url: format!("https://checkout.test/{}", request.tx_ref),
            tx_ref: request.tx_ref.clone(),
        })
    }

    async fn verify(&self, tx_ref: &str) -> Result<PaymentVerification, PaymentError> {
        Ok(PaymentVerification {
            tx_ref: tx_ref.to_string(),
            successful: true,
            amount: self.reported_amount,
        })
    }
}

/// Connects to `TEST_DATABASE_URL`/`DATABASE_URL`; `None` means the test should skip.
pub async fn setup_state() -> anyhow::Result<Option<AppState>> {
    setup_state_with_gateway(Arc::new(FakeGateway {
        reported_amount: None,
    }))
    .await
}

pub async fn setup_state_with_gateway(
    gateway: Arc<dyn PaymentGateway>,
) -> anyhow::Result<Option<AppState>> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run database flows.");
            return Ok(None);
        }
    };

    let pool = create_pool(&database_url).await?;
    run_migrations(&pool).await?;
    Ok(Some(AppState::with_gateway(
        pool,
        test_config(&database_url),
        gateway,
    )))
}

pub async fn create_user(state: &AppState, role: Role) -> anyhow::Result<AuthUser> {
    let user_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, role) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(user_id)
    .bind(format!("Test {role}"))
    .bind(format!("{role}-{user_id}@example.com"))
    .bind("not-a-real-hash")
    .bind(role.as_str())
    .execute(&state.pool)
    .await?;
    Ok(AuthUser { user_id, role })
}

pub async fn create_category(state: &AppState, parent_id: Option<Uuid>) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    let slug = format!("test-{}", id.simple());
    sqlx::query("INSERT INTO categories (id, name, slug, parent_id) VALUES ($1, $2, $3, $4)")
        .bind(id)
        .bind(format!("Category {slug}"))
        .bind(&slug)
        .bind(parent_id)
        .execute(&state.pool)
        .await?;
    Ok(id)
}

pub async fn create_product(
    state: &AppState,
    price: i64,
    stock: i32,
    category_id: Option<Uuid>,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO products (id, name, description, price, stock_quantity, category_id) VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(id)
    .bind(format!("Test Chair {id}"))
    .bind("A product for testing")
    .bind(price)
    .bind(stock)
    .bind(category_id)
    .execute(&state.pool)
    .await?;
    Ok(id)
}

pub async fn stock_of(state: &AppState, product_id: Uuid) -> anyhow::Result<i32> {
    let (stock,): (i32,) = sqlx::query_as("SELECT stock_quantity FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_one(&state.pool)
        .await?;
    Ok(stock)
}
