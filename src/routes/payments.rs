use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};

use crate::{
    dto::payments::{InitializePaymentRequest, PaymentConfirmation, PaymentReference},
    error::{AppError, AppResult},
    middleware::auth::MaybeAuthUser,
    payments::CheckoutSession,
    response::ApiResponse,
    services::payment_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/initialize", post(initialize_payment))
        .route("/callback", get(payment_callback).post(payment_callback))
        .route("/verify", get(verify_payment))
}

fn tx_ref(reference: &PaymentReference) -> AppResult<&str> {
    reference
        .tx_ref
        .as_deref()
        .map(str::trim)
        .filter(|tx_ref| !tx_ref.is_empty())
        .ok_or_else(|| AppError::bad_request("tx_ref is required"))
}

#[utoipa::path(
    post,
    path = "/api/payments/initialize",
    request_body = InitializePaymentRequest,
    responses(
        (status = 200, description = "Hosted checkout URL for the order", body = ApiResponse<CheckoutSession>),
        (status = 400, description = "Order already paid or cancelled"),
        (status = 403, description = "Order belongs to someone else"),
        (status = 500, description = "Payment provider error")
    ),
    tag = "Payments"
)]
pub async fn initialize_payment(
    State(state): State<AppState>,
    caller: MaybeAuthUser,
    Json(payload): Json<InitializePaymentRequest>,
) -> AppResult<Json<ApiResponse<CheckoutSession>>> {
    let resp = payment_service::initialize(&state, &caller, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/payments/callback",
    params(("tx_ref" = String, Query, description = "Transaction reference; `trx_ref` is accepted too")),
    responses(
        (status = 200, description = "Provider callback", body = ApiResponse<PaymentConfirmation>),
        (status = 400, description = "Missing reference, mismatch or unsuccessful payment")
    ),
    tag = "Payments"
)]
pub async fn payment_callback(
    State(state): State<AppState>,
    Query(reference): Query<PaymentReference>,
) -> AppResult<Json<ApiResponse<PaymentConfirmation>>> {
    let resp = payment_service::confirm(&state, tx_ref(&reference)?).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/payments/verify",
    params(("tx_ref" = String, Query, description = "Transaction reference")),
    responses(
        (status = 200, description = "Verify and confirm a payment; safe to repeat", body = ApiResponse<PaymentConfirmation>),
        (status = 400, description = "Missing reference, mismatch or unsuccessful payment")
    ),
    tag = "Payments"
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    Query(reference): Query<PaymentReference>,
) -> AppResult<Json<ApiResponse<PaymentConfirmation>>> {
    let resp = payment_service::confirm(&state, tx_ref(&reference)?).await?;
    Ok(Json(resp))
}
