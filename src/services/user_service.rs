use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
    sea_query::{Expr, Func, SimpleExpr},
};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit::{AuditEvent, record},
    dto::users::{UpdateRoleRequest, UserDetail, UserList, UserOrderStats},
    entity::{
        orders::{Column as OrderCol, Entity as Orders},
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, Role, User},
    policy::{Action, Resource},
    repo,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

const RECENT_ORDERS: u64 = 5;

pub async fn list_users(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<UserList>> {
    user.authorize(Resource::Users, Action::Read)?;
    let (page, limit, offset) = pagination.normalize();

    let finder = Users::find().order_by_desc(UserCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(User::from)
        .collect();

    Ok(ApiResponse::success(
        "Users",
        UserList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

#[derive(FromRow)]
struct StatsRow {
    order_count: i64,
    total_spent: i64,
}

impl From<StatsRow> for UserOrderStats {
    fn from(row: StatsRow) -> Self {
        let average_order_value = if row.order_count > 0 {
            row.total_spent / row.order_count
        } else {
            0
        };
        UserOrderStats {
            order_count: row.order_count,
            total_spent: row.total_spent,
            average_order_value,
        }
    }
}

pub async fn get_user(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<UserDetail>> {
    user.authorize(Resource::Users, Action::Read)?;
    let target = repo::users::find(&state.orm, id)
        .await?
        .ok_or(AppError::NotFound)?;

    let stats = sqlx::query_as::<_, StatsRow>(
        r#"
        SELECT COUNT(*) AS order_count,
               COALESCE(SUM(total_amount), 0)::BIGINT AS total_spent
        FROM orders
        WHERE user_id = $1 AND status <> 'cancelled'
        "#,
    )
    .bind(id)
    .fetch_one(&state.pool)
    .await?;

    let recent_orders = Orders::find()
        .filter(OrderCol::UserId.eq(id))
        .order_by_desc(OrderCol::CreatedAt)
        .limit(RECENT_ORDERS)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Order::from)
        .collect();

    Ok(ApiResponse::ok(
        "User",
        UserDetail {
            user: User::from(target),
            stats: UserOrderStats::from(stats),
            recent_orders,
        },
    ))
}

pub async fn update_role(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateRoleRequest,
) -> AppResult<ApiResponse<User>> {
    user.authorize(Resource::Users, Action::Update)?;
    if id == user.user_id && payload.role != Role::Admin {
        return Err(AppError::bad_request("You cannot remove your own admin role"));
    }

    let target = repo::users::find(&state.orm, id)
        .await?
        .ok_or(AppError::NotFound)?;
    let previous = target.role.clone();

    let mut active: UserActive = target.into();
    active.role = Set(payload.role.as_str().to_string());
    let updated = active.update(&state.orm).await?;

    record(
        &state.pool,
        AuditEvent::new(
            Some(user.user_id),
            "user_role_update",
            "users",
            serde_json::json!({ "user_id": id, "from": previous, "to": updated.role }),
        ),
    )
    .await;

    Ok(ApiResponse::ok("Role updated", User::from(updated)))
}

/// Removes a non-admin account. Cart and wishlist go with it; orders stay,
/// detached and stamped with the customer's contact details.
pub async fn delete_user(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    user.authorize(Resource::Users, Action::Delete)?;
    if id == user.user_id {
        return Err(AppError::bad_request("You cannot delete your own account"));
    }

    let txn = state.orm.begin().await?;
    let target = repo::users::find(&txn, id)
        .await?
        .ok_or(AppError::NotFound)?;
    if target.role == Role::Admin.as_str() {
        return Err(AppError::bad_request("Admin accounts cannot be deleted"));
    }

    Orders::update_many()
        .col_expr(
            OrderCol::GuestEmail,
            Func::coalesce([
                SimpleExpr::from(Expr::col(OrderCol::GuestEmail)),
                SimpleExpr::from(Expr::val(target.email.clone())),
            ])
            .into(),
        )
        .col_expr(
            OrderCol::GuestName,
            Func::coalesce([
                SimpleExpr::from(Expr::col(OrderCol::GuestName)),
                SimpleExpr::from(Expr::val(target.name.clone())),
            ])
            .into(),
        )
        .filter(OrderCol::UserId.eq(id))
        .exec(&txn)
        .await?;

    Users::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    record(
        &state.pool,
        AuditEvent::new(
            Some(user.user_id),
            "user_delete",
            "users",
            serde_json::json!({ "user_id": id, "email": target.email }),
        ),
    )
    .await;

    Ok(ApiResponse::ok("User deleted", serde_json::json!({ "id": id })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_is_zero_without_orders() {
        let stats = UserOrderStats::from(StatsRow {
            order_count: 0,
            total_spent: 0,
        });
        assert_eq!(stats.average_order_value, 0);
    }

    #[test]
    fn average_rounds_down_to_minor_unit() {
        let stats = UserOrderStats::from(StatsRow {
            order_count: 3,
            total_spent: 10_000,
        });
        assert_eq!(stats.average_order_value, 3_333);
        assert_eq!(stats.total_spent, 10_000);
    }
}
