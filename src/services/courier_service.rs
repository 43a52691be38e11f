use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set, TransactionTrait};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit::{AuditEvent, record},
    dto::admin::Delivery,
    entity::orders::ActiveModel as OrderActive,
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderStatus, PAYMENT_PAID, PAYMENT_UNPAID, PaymentMethod},
    policy::{Action, Resource},
    repo,
    response::ApiResponse,
    state::AppState,
};

#[derive(FromRow)]
struct DeliveryRow {
    id: Uuid,
    order_number: String,
    shipping_address: String,
    total_amount: i64,
    payment_method: String,
    payment_status: String,
    created_at: chrono::DateTime<Utc>,
    customer_name: Option<String>,
    customer_email: Option<String>,
    customer_phone: Option<String>,
}

/// Shipped orders assigned to the calling courier.
pub async fn list_deliveries(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<Vec<Delivery>>> {
    user.authorize(Resource::Deliveries, Action::Read)?;
    let rows = sqlx::query_as::<_, DeliveryRow>(
        r#"
        SELECT o.id, o.order_number, o.shipping_address, o.total_amount,
               o.payment_method, o.payment_status, o.created_at,
               COALESCE(u.name, o.guest_name) AS customer_name,
               COALESCE(u.email, o.guest_email) AS customer_email,
               o.guest_phone AS customer_phone
        FROM orders o
        LEFT JOIN users u ON u.id = o.user_id
        WHERE o.courier_id = $1 AND o.status = $2
        ORDER BY o.created_at DESC
        "#,
    )
    .bind(user.user_id)
    .bind(OrderStatus::Shipped.as_str())
    .fetch_all(&state.pool)
    .await?;

    let deliveries = rows
        .into_iter()
        .map(|row| Delivery {
            order_id: row.id,
            order_number: row.order_number,
            shipping_address: row.shipping_address,
            total_amount: row.total_amount,
            collect_on_delivery: row.payment_method == PaymentMethod::CashOnDelivery.as_str()
                && row.payment_status == PAYMENT_UNPAID,
            customer_name: row.customer_name,
            customer_email: row.customer_email,
            customer_phone: row.customer_phone,
            placed_at: row.created_at,
        })
        .collect();
    Ok(ApiResponse::ok("Deliveries", deliveries))
}

pub async fn confirm_delivery(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    user.authorize(Resource::Deliveries, Action::Update)?;

    let txn = state.orm.begin().await?;
    let existing = repo::orders::lock(&txn, id)
        .await?
        .ok_or(AppError::NotFound)?;
    if existing.courier_id != Some(user.user_id) {
        return Err(AppError::Forbidden);
    }
    if existing.status != OrderStatus::Shipped.as_str() {
        return Err(AppError::bad_request(format!(
            "Only shipped orders can be delivered, order is {}",
            existing.status
        )));
    }

    let cash_collected = existing.payment_method == PaymentMethod::CashOnDelivery.as_str()
        && existing.payment_status == PAYMENT_UNPAID;

    let mut active: OrderActive = existing.into();
    active.status = Set(OrderStatus::Delivered.as_str().to_string());
    if cash_collected {
        active.payment_status = Set(PAYMENT_PAID.to_string());
        active.paid_at = Set(Some(Utc::now().into()));
    }
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    repo::orders::append_history(
        &txn,
        order.id,
        OrderStatus::Delivered,
        Some("Delivered by courier".to_string()),
        Some(user.user_id),
    )
    .await?;
    txn.commit().await?;

    record(
        &state.pool,
        AuditEvent::new(
            Some(user.user_id),
            "order_delivered",
            "orders",
            serde_json::json!({ "order_id": order.id, "cash_collected": cash_collected }),
        ),
    )
    .await;

    Ok(ApiResponse::ok("Delivery confirmed", Order::from(order)))
}
