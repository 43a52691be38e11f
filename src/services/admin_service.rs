use chrono::{Duration, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseTransaction, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    ActiveValue::Set,
    sea_query::{Expr, Query, extension::postgres::PgExpr},
};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit::{AuditEvent, record},
    dto::{
        admin::{
            AssignCourierRequest, CourierSummary, DashboardStats, InventoryAdjustRequest,
            LowStockQuery, UpdateOrderStatusRequest,
        },
        orders::{OrderList, OrderWithItems},
        products::ProductList,
    },
    entity::{
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::{ActiveModel as ProductActive, Column as ProdCol, Entity as Products},
        users::{Column as UserCol, Entity as Users},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderStatus, PAYMENT_PAID, PaymentMethod, Product, Role},
    policy::{Action, Resource},
    repo,
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::order_service::load_detail,
    state::AppState,
};

pub const DEFAULT_LOW_STOCK_THRESHOLD: i32 = 5;
const RECENT_ORDERS: u64 = 5;

fn start_of(date: NaiveDate) -> chrono::DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    user.authorize(Resource::AdminOrders, Action::Read)?;
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::Status.eq(status.clone()));
    }

    if let Some(search) = query.search.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        let matching_users = Query::select()
            .column(UserCol::Id)
            .from(Users)
            .and_where(Expr::col(UserCol::Email).ilike(pattern.clone()))
            .to_owned();
        condition = condition.add(
            Condition::any()
                .add(Expr::col(OrderCol::OrderNumber).ilike(pattern.clone()))
                .add(Expr::col(OrderCol::GuestEmail).ilike(pattern))
                .add(OrderCol::UserId.in_subquery(matching_users)),
        );
    }

    if let Some(from) = query.date_from {
        condition = condition.add(OrderCol::CreatedAt.gte(start_of(from)));
    }
    if let Some(to) = query.date_to {
        condition = condition.add(OrderCol::CreatedAt.lt(start_of(to) + Duration::days(1)));
    }

    let mut finder = Orders::find().filter(condition);

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Order::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Orders", OrderList { items: orders }, Some(meta)))
}

pub async fn get_order_admin(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    user.authorize(Resource::AdminOrders, Action::Read)?;
    let order = repo::orders::find(&state.orm, id)
        .await?
        .ok_or(AppError::NotFound)?;
    let data = load_detail(&state.orm, order).await?;
    Ok(ApiResponse::success("Order found", data, Some(Meta::empty())))
}

/// Puts reserved stock of an order back on the shelf.
async fn release_stock(txn: &DatabaseTransaction, order: &OrderModel) -> AppResult<()> {
    for item in repo::orders::items(txn, order.id).await? {
        repo::products::increment_stock(txn, item.product_id, item.quantity).await?;
    }
    tracing::debug!(order_number = %order.order_number, "reserved stock released");
    Ok(())
}

fn parse_status(order: &OrderModel) -> AppResult<OrderStatus> {
    order
        .status
        .parse::<OrderStatus>()
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))
}

fn ensure_transition(current: OrderStatus, next: OrderStatus) -> AppResult<()> {
    if current.is_terminal() {
        return Err(AppError::bad_request(format!(
            "Order is {current} and can no longer change"
        )));
    }
    if !current.can_transition_to(next) {
        return Err(AppError::bad_request(format!("Order is already {current}")));
    }
    Ok(())
}

pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    user.authorize(Resource::AdminOrders, Action::Update)?;
    let next = payload.status;

    let txn = state.orm.begin().await?;
    let existing = repo::orders::lock(&txn, id)
        .await?
        .ok_or(AppError::NotFound)?;
    let current = parse_status(&existing)?;
    ensure_transition(current, next)?;

    let release = next == OrderStatus::Cancelled && existing.stock_reserved;
    if release {
        release_stock(&txn, &existing).await?;
    }

    let mut active: OrderActive = existing.into();
    active.status = Set(next.as_str().to_string());
    if release {
        active.stock_reserved = Set(false);
    }
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    let note = payload
        .note
        .map(|note| note.trim().to_string())
        .filter(|note| !note.is_empty())
        .unwrap_or_else(|| format!("Status changed from {current} to {next}"));
    repo::orders::append_history(&txn, order.id, next, Some(note), Some(user.user_id)).await?;

    txn.commit().await?;

    record(
        &state.pool,
        AuditEvent::new(
            Some(user.user_id),
            "order_status_update",
            "orders",
            serde_json::json!({ "order_id": order.id, "from": current, "status": order.status }),
        ),
    )
    .await;

    Ok(ApiResponse::success(
        "Order updated",
        Order::from(order),
        Some(Meta::empty()),
    ))
}

pub async fn delete_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    user.authorize(Resource::AdminOrders, Action::Delete)?;

    let txn = state.orm.begin().await?;
    let existing = repo::orders::lock(&txn, id)
        .await?
        .ok_or(AppError::NotFound)?;
    let current = parse_status(&existing)?;

    // Goods that never left the warehouse go back into stock.
    if existing.stock_reserved && !current.is_terminal() && current != OrderStatus::Shipped {
        release_stock(&txn, &existing).await?;
    }

    let order_number = existing.order_number.clone();
    Orders::delete_by_id(existing.id).exec(&txn).await?;
    txn.commit().await?;

    record(
        &state.pool,
        AuditEvent::new(
            Some(user.user_id),
            "order_delete",
            "orders",
            serde_json::json!({ "order_id": id, "order_number": order_number }),
        ),
    )
    .await;

    Ok(ApiResponse::ok(
        "Order deleted",
        serde_json::json!({ "id": id }),
    ))
}

pub async fn assign_courier(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: AssignCourierRequest,
) -> AppResult<ApiResponse<Order>> {
    user.authorize(Resource::AdminOrders, Action::Update)?;

    let courier = repo::users::find(&state.orm, payload.courier_id)
        .await?
        .filter(|courier| courier.role == Role::Courier.as_str())
        .ok_or_else(|| AppError::bad_request("Courier not found"))?;

    let txn = state.orm.begin().await?;
    let existing = repo::orders::lock(&txn, id)
        .await?
        .ok_or(AppError::NotFound)?;
    let current = parse_status(&existing)?;
    if current.is_terminal() {
        return Err(AppError::bad_request(format!(
            "Order is {current} and can no longer change"
        )));
    }
    if existing.payment_method == PaymentMethod::Chapa.as_str()
        && existing.payment_status != PAYMENT_PAID
    {
        return Err(AppError::bad_request("Order is awaiting online payment"));
    }

    let mut active: OrderActive = existing.into();
    active.courier_id = Set(Some(courier.id));
    active.status = Set(OrderStatus::Shipped.as_str().to_string());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    repo::orders::append_history(
        &txn,
        order.id,
        OrderStatus::Shipped,
        Some("Courier assigned by admin".to_string()),
        Some(user.user_id),
    )
    .await?;
    txn.commit().await?;

    record(
        &state.pool,
        AuditEvent::new(
            Some(user.user_id),
            "courier_assign",
            "orders",
            serde_json::json!({ "order_id": order.id, "courier_id": courier.id }),
        ),
    )
    .await;

    Ok(ApiResponse::ok("Courier assigned", Order::from(order)))
}

#[derive(FromRow)]
struct CourierRow {
    id: Uuid,
    name: String,
    email: String,
    active_deliveries: i64,
}

pub async fn list_couriers(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<Vec<CourierSummary>>> {
    user.authorize(Resource::Couriers, Action::Read)?;
    let rows = sqlx::query_as::<_, CourierRow>(
        r#"
        SELECT u.id, u.name, u.email,
               COUNT(o.id) FILTER (WHERE o.status = 'shipped') AS active_deliveries
        FROM users u
        LEFT JOIN orders o ON o.courier_id = u.id
        WHERE u.role = 'courier'
        GROUP BY u.id, u.name, u.email
        ORDER BY u.name ASC
        "#,
    )
    .fetch_all(&state.pool)
    .await?;

    let couriers = rows
        .into_iter()
        .map(|row| CourierSummary {
            id: row.id,
            name: row.name,
            email: row.email,
            active_deliveries: row.active_deliveries,
        })
        .collect();
    Ok(ApiResponse::ok("Couriers", couriers))
}

#[derive(FromRow)]
struct DashboardRow {
    total_users: i64,
    total_products: i64,
    total_orders: i64,
    pending_orders: i64,
    total_revenue: i64,
    low_stock_products: i64,
}

pub async fn dashboard(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<DashboardStats>> {
    user.authorize(Resource::Dashboard, Action::Read)?;
    let row = sqlx::query_as::<_, DashboardRow>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM users) AS total_users,
            (SELECT COUNT(*) FROM products) AS total_products,
            (SELECT COUNT(*) FROM orders) AS total_orders,
            (SELECT COUNT(*) FROM orders WHERE status = 'pending') AS pending_orders,
            (SELECT COALESCE(SUM(total_amount), 0)::BIGINT FROM orders WHERE status <> 'cancelled') AS total_revenue,
            (SELECT COUNT(*) FROM products WHERE stock_quantity <= $1) AS low_stock_products
        "#,
    )
    .bind(DEFAULT_LOW_STOCK_THRESHOLD)
    .fetch_one(&state.pool)
    .await?;

    let recent_orders = Orders::find()
        .order_by_desc(OrderCol::CreatedAt)
        .limit(RECENT_ORDERS)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Order::from)
        .collect();

    Ok(ApiResponse::ok(
        "Dashboard",
        DashboardStats {
            total_users: row.total_users,
            total_products: row.total_products,
            total_orders: row.total_orders,
            pending_orders: row.pending_orders,
            total_revenue: row.total_revenue,
            low_stock_products: row.low_stock_products,
            recent_orders,
        },
    ))
}

pub async fn list_low_stock(
    state: &AppState,
    user: &AuthUser,
    query: LowStockQuery,
) -> AppResult<ApiResponse<ProductList>> {
    user.authorize(Resource::Inventory, Action::Read)?;
    let threshold = query.threshold.unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD);
    let (page, limit, offset) = query.pagination().normalize();

    let finder = Products::find()
        .filter(ProdCol::StockQuantity.lte(threshold))
        .order_by_asc(ProdCol::StockQuantity)
        .order_by_desc(ProdCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Low stock", ProductList { items }, Some(meta)))
}

pub async fn adjust_inventory(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: InventoryAdjustRequest,
) -> AppResult<ApiResponse<Product>> {
    user.authorize(Resource::Inventory, Action::Update)?;
    if payload.delta == 0 {
        return Err(AppError::bad_request("delta must not be 0"));
    }

    let txn = state.orm.begin().await?;
    let product = repo::products::lock_one(&txn, id)
        .await?
        .ok_or(AppError::NotFound)?;

    let new_stock = product.stock_quantity + payload.delta;
    if new_stock < 0 {
        return Err(AppError::bad_request("stock cannot be negative"));
    }

    let mut active: ProductActive = product.into();
    active.stock_quantity = Set(new_stock);
    active.updated_at = Set(Utc::now().into());
    let updated = active.update(&txn).await?;

    txn.commit().await?;

    record(
        &state.pool,
        AuditEvent::new(
            Some(user.user_id),
            "inventory_adjust",
            "products",
            serde_json::json!({ "product_id": updated.id, "delta": payload.delta }),
        ),
    )
    .await;

    Ok(ApiResponse::success(
        "Inventory updated",
        Product::from(updated),
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_orders_reject_every_transition() {
        for next in OrderStatus::ALL {
            assert!(ensure_transition(OrderStatus::Delivered, next).is_err());
            assert!(ensure_transition(OrderStatus::Cancelled, next).is_err());
        }
    }

    #[test]
    fn open_orders_move_to_any_other_status() {
        assert!(ensure_transition(OrderStatus::Pending, OrderStatus::Cancelled).is_ok());
        assert!(ensure_transition(OrderStatus::Confirmed, OrderStatus::Shipped).is_ok());
        assert!(ensure_transition(OrderStatus::Shipped, OrderStatus::Shipped).is_err());
    }

    #[test]
    fn date_filter_starts_at_midnight_utc() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).expect("date");
        assert_eq!(start_of(date).to_rfc3339(), "2025-06-01T00:00:00+00:00");
    }
}
