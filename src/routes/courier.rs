use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::admin::Delivery,
    error::AppResult,
    middleware::auth::AuthUser,
    models::Order,
    response::ApiResponse,
    services::courier_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_deliveries))
        .route("/orders/{id}/deliver", post(confirm_delivery))
}

#[utoipa::path(
    get,
    path = "/api/courier/orders",
    responses(
        (status = 200, description = "Shipped orders assigned to the calling courier", body = ApiResponse<Vec<Delivery>>),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Courier"
)]
pub async fn list_deliveries(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<Vec<Delivery>>>> {
    let resp = courier_service::list_deliveries(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/courier/orders/{id}/deliver",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Mark delivered; cash orders are marked paid", body = ApiResponse<Order>),
        (status = 400, description = "Order is not out for delivery"),
        (status = 403, description = "Order assigned to another courier"),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = [])),
    tag = "Courier"
)]
pub async fn confirm_delivery(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = courier_service::confirm_delivery(&state, &user, id).await?;
    Ok(Json(resp))
}
