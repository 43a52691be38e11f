use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Order, OrderStatus};

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignCourierRequest {
    pub courier_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LowStockQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub threshold: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InventoryAdjustRequest {
    pub delta: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CourierSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub active_deliveries: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardStats {
    pub total_users: i64,
    pub total_products: i64,
    pub total_orders: i64,
    pub pending_orders: i64,
    /// Sum of order totals, cancelled orders excluded.
    pub total_revenue: i64,
    pub low_stock_products: i64,
    pub recent_orders: Vec<Order>,
}

/// A shipped order as a courier sees it.
#[derive(Debug, Serialize, ToSchema)]
pub struct Delivery {
    pub order_id: Uuid,
    pub order_number: String,
    pub shipping_address: String,
    pub total_amount: i64,
    /// Cash is still owed at the door.
    pub collect_on_delivery: bool,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub placed_at: DateTime<Utc>,
}
