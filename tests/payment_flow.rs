mod common;

use std::sync::Arc;

use furniture_store::{
    dto::{
        cart::AddToCartRequest,
        orders::CheckoutRequest,
        payments::InitializePaymentRequest,
    },
    error::AppError,
    middleware::auth::MaybeAuthUser,
    models::{OrderStatus, PaymentMethod, Role, PAYMENT_PAID, PAYMENT_UNPAID},
    payments::build_tx_ref,
    services::{cart_service, order_service, payment_service},
};

use common::{FakeGateway, create_product, create_user, setup_state, setup_state_with_gateway, stock_of};

async fn place_chapa_order(
    state: &furniture_store::state::AppState,
    caller: &MaybeAuthUser,
) -> anyhow::Result<furniture_store::models::Order> {
    let placed = order_service::checkout(
        state,
        caller,
        CheckoutRequest {
            shipping_address: "CMC, Addis Ababa".into(),
            payment_method: PaymentMethod::Chapa,
            guest: None,
            cart_items: Vec::new(),
        },
    )
    .await?
    .data
    .expect("checkout data");
    Ok(placed.order)
}

#[tokio::test]
async fn confirming_twice_is_idempotent() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let user = create_user(&state, Role::User).await?;
    let product_id = create_product(&state, 20_000, 5, None).await?;
    cart_service::add_to_cart(&state, &user, AddToCartRequest { product_id, quantity: 2 }).await?;

    let caller = MaybeAuthUser(Some(user.clone()));
    let order = place_chapa_order(&state, &caller).await?;
    assert_eq!(order.status, OrderStatus::Pending.as_str());
    assert_eq!(order.payment_status, PAYMENT_UNPAID);
    assert_eq!(stock_of(&state, product_id).await?, 3);

    let session = payment_service::initialize(
        &state,
        &caller,
        InitializePaymentRequest {
            order_id: order.id,
            email: None,
        },
    )
    .await?
    .data
    .expect("session");
    assert!(session.tx_ref.contains(&order.order_number));

    let first = payment_service::confirm(&state, &session.tx_ref)
        .await?
        .data
        .expect("confirmation");
    assert!(!first.already_paid);
    assert_eq!(first.status, OrderStatus::Confirmed.as_str());
    assert_eq!(first.payment_status, PAYMENT_PAID);

    let second = payment_service::confirm(&state, &session.tx_ref)
        .await?
        .data
        .expect("confirmation");
    assert!(second.already_paid);

    // Stock was taken once, at checkout.
    assert_eq!(stock_of(&state, product_id).await?, 3);

    let detail = order_service::get_order(&state, &user, order.id).await?.data.unwrap();
    let confirmations = detail
        .history
        .iter()
        .filter(|entry| entry.status == OrderStatus::Confirmed.as_str())
        .count();
    assert_eq!(confirmations, 1);
    Ok(())
}

#[tokio::test]
async fn other_users_cannot_pay_for_an_order() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let owner = create_user(&state, Role::User).await?;
    let stranger = create_user(&state, Role::User).await?;
    let product_id = create_product(&state, 5_000, 5, None).await?;
    cart_service::add_to_cart(&state, &owner, AddToCartRequest { product_id, quantity: 1 }).await?;
    let order = place_chapa_order(&state, &MaybeAuthUser(Some(owner))).await?;

    let err = payment_service::initialize(
        &state,
        &MaybeAuthUser(Some(stranger)),
        InitializePaymentRequest {
            order_id: order.id,
            email: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
    Ok(())
}

#[tokio::test]
async fn amount_mismatch_leaves_order_unpaid() -> anyhow::Result<()> {
    let gateway = Arc::new(FakeGateway {
        reported_amount: Some(1),
    });
    let Some(state) = setup_state_with_gateway(gateway).await? else {
        return Ok(());
    };
    let user = create_user(&state, Role::User).await?;
    let product_id = create_product(&state, 7_500, 5, None).await?;
    cart_service::add_to_cart(&state, &user, AddToCartRequest { product_id, quantity: 1 }).await?;

    let caller = MaybeAuthUser(Some(user.clone()));
    let order = place_chapa_order(&state, &caller).await?;
    let tx_ref = build_tx_ref(&order.order_number, 1_700_000_000);

    let err = payment_service::confirm(&state, &tx_ref).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let detail = order_service::get_order(&state, &user, order.id).await?.data.unwrap();
    assert_eq!(detail.order.payment_status, PAYMENT_UNPAID);
    assert_eq!(detail.order.status, OrderStatus::Pending.as_str());
    Ok(())
}

#[tokio::test]
async fn malformed_reference_is_rejected() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let err = payment_service::confirm(&state, "not-a-reference")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callbacks_confirm_once() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let user = create_user(&state, Role::User).await?;
    let product_id = create_product(&state, 12_000, 5, None).await?;
    cart_service::add_to_cart(&state, &user, AddToCartRequest { product_id, quantity: 2 }).await?;

    let caller = MaybeAuthUser(Some(user.clone()));
    let order = place_chapa_order(&state, &caller).await?;
    let tx_ref = build_tx_ref(&order.order_number, 1_700_000_000);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let state = state.clone();
        let tx_ref = tx_ref.clone();
        handles.push(tokio::spawn(async move {
            payment_service::confirm(&state, &tx_ref)
                .await
                .map(|resp| resp.data.expect("confirmation").already_paid)
        }));
    }

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await?.expect("confirm"));
    }
    assert_eq!(outcomes.iter().filter(|already_paid| !**already_paid).count(), 1);
    assert_eq!(stock_of(&state, product_id).await?, 3);

    let detail = order_service::get_order(&state, &user, order.id).await?.data.unwrap();
    assert_eq!(detail.order.payment_status, PAYMENT_PAID);
    let confirmations = detail
        .history
        .iter()
        .filter(|entry| entry.status == OrderStatus::Confirmed.as_str())
        .count();
    assert_eq!(confirmations, 1);
    Ok(())
}
