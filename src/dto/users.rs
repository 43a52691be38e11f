use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Order, Role, User};

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRoleRequest {
    pub role: Role,
}

#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
pub struct UserOrderStats {
    pub order_count: i64,
    pub total_spent: i64,
    pub average_order_value: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserDetail {
    pub user: User,
    pub stats: UserOrderStats,
    pub recent_orders: Vec<Order>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserList {
    pub items: Vec<User>,
}
