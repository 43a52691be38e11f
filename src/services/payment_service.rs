use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set, TransactionTrait};

use crate::{
    audit::{AuditEvent, record},
    dto::payments::{InitializePaymentRequest, PaymentConfirmation},
    entity::orders::ActiveModel as OrderActive,
    error::{AppError, AppResult},
    middleware::auth::MaybeAuthUser,
    models::{OrderStatus, PAYMENT_PAID},
    payments::{
        CheckoutSession, InitializePayment, PaymentError, build_tx_ref, order_number_from_tx_ref,
        split_name,
    },
    policy::{self, Action, Resource},
    repo,
    response::ApiResponse,
    state::AppState,
};

pub const CURRENCY: &str = "ETB";

/// Opens a hosted checkout for an unpaid order.
pub async fn initialize(
    state: &AppState,
    caller: &MaybeAuthUser,
    payload: InitializePaymentRequest,
) -> AppResult<ApiResponse<CheckoutSession>> {
    policy::authorize(caller.role(), Resource::Payments, Action::Create)?;

    let order = repo::orders::find(&state.orm, payload.order_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let (email, customer_name) = match order.user_id {
        None => {
            let email = payload
                .email
                .as_deref()
                .map(str::trim)
                .filter(|email| !email.is_empty())
                .ok_or_else(|| AppError::bad_request("Email is required"))?;
            let matches = order
                .guest_email
                .as_deref()
                .is_some_and(|guest| guest.eq_ignore_ascii_case(email));
            if !matches {
                return Err(AppError::Forbidden);
            }
            (email.to_string(), order.guest_name.clone())
        }
        Some(owner) => {
            let caller = caller.0.as_ref().ok_or(AppError::Unauthorized)?;
            if caller.user_id != owner {
                return Err(AppError::Forbidden);
            }
            let user = repo::users::find(&state.orm, owner)
                .await?
                .ok_or(AppError::NotFound)?;
            (user.email, Some(user.name))
        }
    };

    if order.payment_status == PAYMENT_PAID {
        return Err(AppError::bad_request("Order is already paid"));
    }
    if order.status == OrderStatus::Cancelled.as_str() {
        return Err(AppError::bad_request("Order was cancelled"));
    }

    let tx_ref = build_tx_ref(&order.order_number, Utc::now().timestamp());
    let (first_name, last_name) = split_name(customer_name.as_deref().unwrap_or("Customer"));

    let session = state
        .payments
        .initialize(&InitializePayment {
            tx_ref: tx_ref.clone(),
            amount: order.total_amount,
            currency: CURRENCY.to_string(),
            email,
            first_name,
            last_name,
            order_id: order.id.to_string(),
            order_number: order.order_number.clone(),
            guest: order.user_id.is_none(),
        })
        .await?;

    let order_id = order.id;
    let mut active: OrderActive = order.into();
    active.tx_ref = Set(Some(tx_ref.clone()));
    active.updated_at = Set(Utc::now().into());
    active.update(&state.orm).await?;

    record(
        &state.pool,
        AuditEvent::new(
            caller.0.as_ref().map(|user| user.user_id),
            "payment_initialize",
            "orders",
            serde_json::json!({ "order_id": order_id, "tx_ref": tx_ref }),
        ),
    )
    .await;

    Ok(ApiResponse::ok("Payment initialized", session))
}

/// The one path that marks an order paid. Provider callbacks and client
/// verification both land here; replays are no-ops.
pub async fn confirm(state: &AppState, tx_ref: &str) -> AppResult<ApiResponse<PaymentConfirmation>> {
    policy::authorize(None, Resource::Payments, Action::Update)?;

    let tx_ref = tx_ref.trim();
    let order_number = order_number_from_tx_ref(tx_ref)
        .ok_or_else(|| AppError::bad_request("Invalid transaction reference"))?;

    let verification = state.payments.verify(tx_ref).await?;
    if !verification.successful {
        tracing::info!(%tx_ref, "payment not successful at provider");
        return Err(PaymentError::NotSuccessful(tx_ref.to_string()).into());
    }

    let txn = state.orm.begin().await?;
    let order = repo::orders::lock_by_number(&txn, order_number)
        .await?
        .ok_or(AppError::NotFound)?;

    if order.payment_status == PAYMENT_PAID {
        txn.commit().await?;
        tracing::debug!(order_number = %order.order_number, "payment already confirmed");
        return Ok(ApiResponse::ok(
            "Payment already confirmed",
            PaymentConfirmation {
                order_id: order.id,
                order_number: order.order_number,
                status: order.status,
                payment_status: order.payment_status,
                already_paid: true,
            },
        ));
    }

    if let Some(amount) = verification.amount {
        if amount != order.total_amount {
            tracing::warn!(
                order_number = %order.order_number,
                expected = order.total_amount,
                paid = amount,
                "payment amount mismatch"
            );
            return Err(AppError::bad_request("Payment amount does not match order total"));
        }
    }

    let current = order
        .status
        .parse::<OrderStatus>()
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    if current == OrderStatus::Cancelled {
        tracing::warn!(order_number = %order.order_number, %tx_ref, "payment received for cancelled order");
        return Err(AppError::bad_request("Order was cancelled"));
    }

    // Stock was reserved at checkout and stays reserved until cancellation.
    let next = if current.is_confirmed_or_later() {
        current
    } else {
        OrderStatus::Confirmed
    };

    let order_id = order.id;
    let mut active: OrderActive = order.into();
    active.payment_status = Set(PAYMENT_PAID.to_string());
    active.paid_at = Set(Some(Utc::now().into()));
    active.tx_ref = Set(Some(tx_ref.to_string()));
    active.status = Set(next.as_str().to_string());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    repo::orders::append_history(
        &txn,
        order_id,
        next,
        Some("Payment confirmed".to_string()),
        None,
    )
    .await?;

    txn.commit().await?;

    record(
        &state.pool,
        AuditEvent::new(
            order.user_id,
            "payment_confirmed",
            "orders",
            serde_json::json!({ "order_id": order.id, "tx_ref": tx_ref }),
        ),
    )
    .await;

    Ok(ApiResponse::ok(
        "Payment confirmed",
        PaymentConfirmation {
            order_id: order.id,
            order_number: order.order_number,
            status: order.status,
            payment_status: order.payment_status,
            already_paid: false,
        },
    ))
}
