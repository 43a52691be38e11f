use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::{DbPool, OrmConn, orm_from_pool},
    payments::{PaymentGateway, chapa::ChapaGateway},
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub config: Arc<AppConfig>,
    pub payments: Arc<dyn PaymentGateway>,
}

impl AppState {
    pub fn new(pool: DbPool, config: AppConfig) -> Self {
        let payments = Arc::new(ChapaGateway::new(config.payment.clone()));
        Self::with_gateway(pool, config, payments)
    }

    pub fn with_gateway(
        pool: DbPool,
        config: AppConfig,
        payments: Arc<dyn PaymentGateway>,
    ) -> Self {
        let orm = orm_from_pool(&pool);
        Self {
            pool,
            orm,
            config: Arc::new(config),
            payments,
        }
    }
}
