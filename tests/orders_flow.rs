mod common;

use furniture_store::{
    dto::{
        admin::{AssignCourierRequest, InventoryAdjustRequest, UpdateOrderStatusRequest},
        cart::AddToCartRequest,
        orders::{CheckoutRequest, GuestCartLine, GuestDetails, TrackOrderQuery},
        products::UpdateProductRequest,
    },
    error::AppError,
    middleware::auth::MaybeAuthUser,
    models::{OrderStatus, PaymentMethod, Role, PAYMENT_PAID},
    services::{admin_service, cart_service, courier_service, order_service, product_service, user_service},
};

use common::{create_product, create_user, setup_state, stock_of};

fn registered_checkout(method: PaymentMethod) -> CheckoutRequest {
    CheckoutRequest {
        shipping_address: "Bole Road 12, Addis Ababa".into(),
        payment_method: method,
        guest: None,
        cart_items: Vec::new(),
    }
}

#[tokio::test]
async fn cart_quantity_never_exceeds_stock() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let user = create_user(&state, Role::User).await?;
    let product_id = create_product(&state, 1_000, 3, None).await?;

    cart_service::add_to_cart(&state, &user, AddToCartRequest { product_id, quantity: 2 }).await?;
    let err = cart_service::add_to_cart(&state, &user, AddToCartRequest { product_id, quantity: 2 })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let cart = cart_service::list_cart(&state, &user).await?.data.unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.summary.count, 2);
    assert_eq!(cart.summary.total, 2_000);
    Ok(())
}

#[tokio::test]
async fn checkout_prices_order_and_keeps_item_prices() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let user = create_user(&state, Role::User).await?;
    let admin = create_user(&state, Role::Admin).await?;
    let chair = create_product(&state, 1_000, 10, None).await?;
    let lamp = create_product(&state, 2_500, 5, None).await?;

    cart_service::add_to_cart(&state, &user, AddToCartRequest { product_id: chair, quantity: 3 }).await?;
    cart_service::add_to_cart(&state, &user, AddToCartRequest { product_id: lamp, quantity: 1 }).await?;

    let caller = MaybeAuthUser(Some(user.clone()));
    let placed = order_service::checkout(&state, &caller, registered_checkout(PaymentMethod::CashOnDelivery))
        .await?
        .data
        .unwrap();

    // 4 items: 15% off 5500 = 825, plus flat shipping.
    assert_eq!(placed.order.subtotal, 5_500);
    assert_eq!(placed.order.discount_amount, 825);
    assert_eq!(placed.order.shipping_fee, 4_999);
    assert_eq!(placed.order.total_amount, 5_500 - 825 + 4_999);
    assert_eq!(placed.order.status, OrderStatus::Confirmed.as_str());
    assert!(placed.order.order_number.starts_with("JF-"));

    assert_eq!(stock_of(&state, chair).await?, 7);
    assert_eq!(stock_of(&state, lamp).await?, 4);
    let cart = cart_service::list_cart(&state, &user).await?.data.unwrap();
    assert!(cart.items.is_empty());

    product_service::update_product(
        &state,
        &admin,
        chair,
        UpdateProductRequest {
            price: Some(9_999),
            ..Default::default()
        },
    )
    .await?;

    let detail = order_service::get_order(&state, &user, placed.order.id)
        .await?
        .data
        .unwrap();
    let sum: i64 = detail
        .items
        .iter()
        .map(|item| item.price * i64::from(item.quantity))
        .sum();
    assert_eq!(sum, detail.order.subtotal);
    assert!(detail.items.iter().all(|item| item.price != 9_999));
    Ok(())
}

#[tokio::test]
async fn checkout_rejects_empty_cart() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let user = create_user(&state, Role::User).await?;
    let err = order_service::checkout(
        &state,
        &MaybeAuthUser(Some(user)),
        registered_checkout(PaymentMethod::CashOnDelivery),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    Ok(())
}

#[tokio::test]
async fn courier_delivers_cash_order() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let user = create_user(&state, Role::User).await?;
    let admin = create_user(&state, Role::Admin).await?;
    let courier = create_user(&state, Role::Courier).await?;
    let other_courier = create_user(&state, Role::Courier).await?;
    let product_id = create_product(&state, 15_000, 2, None).await?;

    cart_service::add_to_cart(&state, &user, AddToCartRequest { product_id, quantity: 1 }).await?;
    let placed = order_service::checkout(
        &state,
        &MaybeAuthUser(Some(user.clone())),
        registered_checkout(PaymentMethod::CashOnDelivery),
    )
    .await?
    .data
    .unwrap();
    let order_id = placed.order.id;

    let err = courier_service::confirm_delivery(&state, &courier, order_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let shipped = admin_service::assign_courier(
        &state,
        &admin,
        order_id,
        AssignCourierRequest {
            courier_id: courier.user_id,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(shipped.status, OrderStatus::Shipped.as_str());

    let deliveries = courier_service::list_deliveries(&state, &courier).await?.data.unwrap();
    assert!(deliveries.iter().any(|d| d.order_id == order_id && d.collect_on_delivery));

    let err = courier_service::confirm_delivery(&state, &other_courier, order_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let delivered = courier_service::confirm_delivery(&state, &courier, order_id)
        .await?
        .data
        .unwrap();
    assert_eq!(delivered.status, OrderStatus::Delivered.as_str());
    assert_eq!(delivered.payment_status, PAYMENT_PAID);

    let err = admin_service::update_order_status(
        &state,
        &admin,
        order_id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Cancelled,
            note: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let detail = admin_service::get_order_admin(&state, &admin, order_id)
        .await?
        .data
        .unwrap();
    let statuses: Vec<&str> = detail.history.iter().map(|entry| entry.status.as_str()).collect();
    assert_eq!(statuses, ["confirmed", "shipped", "delivered"]);
    Ok(())
}

#[tokio::test]
async fn cancelling_guest_order_returns_stock() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let admin = create_user(&state, Role::Admin).await?;
    let product_id = create_product(&state, 4_000, 6, None).await?;
    let email = format!("guest-{}@example.com", uuid::Uuid::new_v4());

    let placed = order_service::checkout(
        &state,
        &MaybeAuthUser(None),
        CheckoutRequest {
            shipping_address: "Piassa, Addis Ababa".into(),
            payment_method: PaymentMethod::Chapa,
            guest: Some(GuestDetails {
                email: email.clone(),
                name: Some("Guest Buyer".into()),
                phone: None,
            }),
            cart_items: vec![
                GuestCartLine { product_id, quantity: 2 },
                GuestCartLine { product_id, quantity: 1 },
            ],
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(placed.order.status, OrderStatus::Pending.as_str());
    assert_eq!(placed.items.len(), 1);
    assert_eq!(stock_of(&state, product_id).await?, 3);

    let tracked = order_service::track_guest_order(
        &state,
        TrackOrderQuery {
            order_number: placed.order.order_number.clone(),
            email: email.to_uppercase(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(tracked.order.id, placed.order.id);

    let courier = create_user(&state, Role::Courier).await?;
    let err = admin_service::assign_courier(
        &state,
        &admin,
        placed.order.id,
        AssignCourierRequest {
            courier_id: courier.user_id,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = admin_service::adjust_inventory(
        &state,
        &admin,
        product_id,
        InventoryAdjustRequest { delta: -4 },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert_eq!(stock_of(&state, product_id).await?, 3);

    admin_service::update_order_status(
        &state,
        &admin,
        placed.order.id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Cancelled,
            note: Some("Customer called to cancel".into()),
        },
    )
    .await?;
    assert_eq!(stock_of(&state, product_id).await?, 6);
    Ok(())
}

#[tokio::test]
async fn oversized_cart_add_is_rejected() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let user = create_user(&state, Role::User).await?;
    let product_id = create_product(&state, 1_000, 5, None).await?;

    cart_service::add_to_cart(&state, &user, AddToCartRequest { product_id, quantity: 1 }).await?;
    let err = cart_service::add_to_cart(
        &state,
        &user,
        AddToCartRequest {
            product_id,
            quantity: i32::MAX,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let cart = cart_service::list_cart(&state, &user).await?.data.unwrap();
    assert_eq!(cart.summary.count, 1);
    Ok(())
}

#[tokio::test]
async fn oversized_guest_lines_are_rejected() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let product_id = create_product(&state, 1_000, 5, None).await?;

    let err = order_service::checkout(
        &state,
        &MaybeAuthUser(None),
        CheckoutRequest {
            shipping_address: "Kazanchis, Addis Ababa".into(),
            payment_method: PaymentMethod::CashOnDelivery,
            guest: Some(GuestDetails {
                email: "bulk-buyer@example.com".into(),
                name: None,
                phone: None,
            }),
            cart_items: vec![
                GuestCartLine { product_id, quantity: i32::MAX },
                GuestCartLine { product_id, quantity: i32::MAX },
            ],
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert_eq!(stock_of(&state, product_id).await?, 5);
    Ok(())
}

#[tokio::test]
async fn deleting_customer_keeps_contact_on_orders() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let admin = create_user(&state, Role::Admin).await?;
    let user = create_user(&state, Role::User).await?;
    let product_id = create_product(&state, 3_000, 4, None).await?;

    cart_service::add_to_cart(&state, &user, AddToCartRequest { product_id, quantity: 1 }).await?;
    let placed = order_service::checkout(
        &state,
        &MaybeAuthUser(Some(user.clone())),
        registered_checkout(PaymentMethod::CashOnDelivery),
    )
    .await?
    .data
    .unwrap();

    user_service::delete_user(&state, &admin, user.user_id).await?;

    let detail = admin_service::get_order_admin(&state, &admin, placed.order.id)
        .await?
        .data
        .unwrap();
    assert_eq!(detail.order.user_id, None);
    assert_eq!(
        detail.order.guest_email.as_deref(),
        Some(format!("user-{}@example.com", user.user_id).as_str())
    );
    assert_eq!(detail.order.guest_name.as_deref(), Some("Test user"));
    Ok(())
}
