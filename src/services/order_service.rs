use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, ConnectionTrait,
    DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::{AuditEvent, record},
    dto::orders::{
        CheckoutRequest, CheckoutResponse, GuestDetails, OrderList, OrderWithItems,
        TrackOrderQuery,
    },
    entity::{
        order_items::ActiveModel as OrderItemActive,
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, MaybeAuthUser},
    models::{Order, OrderItem, OrderStatusEntry, PAYMENT_UNPAID, PaymentMethod, Role},
    policy::{self, Action, Resource},
    pricing::{PricedLine, PricingRules},
    repo,
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::{auth_service::is_valid_email, cart_service::quantity_sum},
    state::AppState,
};

/// `JF-YYYYMMDD-XXXXXXXX`, the suffix taken from the order id.
pub fn build_order_number(order_id: Uuid, placed_at: DateTime<Utc>) -> String {
    let suffix = order_id.simple().to_string()[..8].to_uppercase();
    format!("JF-{}-{}", placed_at.format("%Y%m%d"), suffix)
}

/// Merges duplicate product lines and rejects non-positive quantities.
pub fn merge_lines(lines: impl IntoIterator<Item = (Uuid, i32)>) -> AppResult<BTreeMap<Uuid, i32>> {
    let mut merged = BTreeMap::new();
    for (product_id, quantity) in lines {
        if quantity <= 0 {
            return Err(AppError::bad_request("Quantity must be greater than zero"));
        }
        let total = merged.entry(product_id).or_insert(0);
        *total = quantity_sum(*total, quantity)?;
    }
    Ok(merged)
}

/// Who is placing the order.
enum Buyer {
    Registered(Uuid),
    Guest(GuestDetails),
}

impl Buyer {
    fn user_id(&self) -> Option<Uuid> {
        match self {
            Buyer::Registered(id) => Some(*id),
            Buyer::Guest(_) => None,
        }
    }
}

fn guest_buyer(payload: &CheckoutRequest) -> AppResult<Buyer> {
    let guest = payload
        .guest
        .clone()
        .ok_or_else(|| AppError::bad_request("Guest email is required"))?;
    let email = guest.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(AppError::bad_request("Guest email is required"));
    }
    if !is_valid_email(&email) {
        return Err(AppError::bad_request("Invalid email address"));
    }
    Ok(Buyer::Guest(GuestDetails {
        email,
        name: guest.name.map(|name| name.trim().to_string()).filter(|n| !n.is_empty()),
        phone: guest.phone.map(|phone| phone.trim().to_string()).filter(|p| !p.is_empty()),
    }))
}

pub async fn checkout(
    state: &AppState,
    caller: &MaybeAuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<CheckoutResponse>> {
    policy::authorize(caller.role(), Resource::Orders, Action::Create)?;

    let shipping_address = payload.shipping_address.trim().to_string();
    if shipping_address.is_empty() {
        return Err(AppError::bad_request("Shipping address is required"));
    }

    let buyer = match &caller.0 {
        Some(user) => Buyer::Registered(user.user_id),
        None => guest_buyer(&payload)?,
    };

    let txn = state.orm.begin().await?;
    let placed = place_order(
        &txn,
        &state.config.pricing,
        &buyer,
        &payload,
        shipping_address,
    )
    .await;

    let response = match placed {
        Ok(response) => {
            txn.commit().await?;
            response
        }
        Err(err) => {
            if err.status().is_server_error() {
                tracing::error!(error = %err, "checkout rolled back");
            }
            txn.rollback().await?;
            return Err(err);
        }
    };

    record(
        &state.pool,
        AuditEvent::new(
            buyer.user_id(),
            "checkout",
            "orders",
            serde_json::json!({
                "order_id": response.order.id,
                "order_number": response.order.order_number,
                "guest": buyer.user_id().is_none(),
            }),
        ),
    )
    .await;

    Ok(ApiResponse::success(
        "Order placed",
        response,
        Some(Meta::empty()),
    ))
}

async fn place_order(
    txn: &DatabaseTransaction,
    pricing: &PricingRules,
    buyer: &Buyer,
    payload: &CheckoutRequest,
    shipping_address: String,
) -> AppResult<CheckoutResponse> {
    let wanted = match buyer {
        Buyer::Registered(user_id) => merge_lines(
            repo::cart::lines(txn, *user_id)
                .await?
                .into_iter()
                .map(|(item, _)| (item.product_id, item.quantity)),
        )?,
        Buyer::Guest(_) => merge_lines(
            payload
                .cart_items
                .iter()
                .map(|line| (line.product_id, line.quantity)),
        )?,
    };

    if wanted.is_empty() {
        return Err(AppError::bad_request("Cart is empty"));
    }

    let ids: Vec<Uuid> = wanted.keys().copied().collect();
    let products: BTreeMap<Uuid, _> = repo::products::lock_many(txn, &ids)
        .await?
        .into_iter()
        .map(|product| (product.id, product))
        .collect();

    let mut priced = Vec::with_capacity(wanted.len());
    for (product_id, quantity) in &wanted {
        let product = products
            .get(product_id)
            .ok_or_else(|| AppError::bad_request(format!("Product {product_id} is no longer available")))?;
        if product.stock_quantity < *quantity {
            return Err(AppError::bad_request(format!(
                "Insufficient stock for {}",
                product.name
            )));
        }
        priced.push((
            *product_id,
            PricedLine {
                unit_price: product.price,
                quantity: *quantity,
            },
        ));
    }

    let lines: Vec<PricedLine> = priced.iter().map(|(_, line)| *line).collect();
    let quote = pricing.quote(&lines);

    let now = Utc::now();
    let order_id = Uuid::new_v4();
    let method = payload.payment_method;
    let status = method.initial_status();
    let guest = match buyer {
        Buyer::Guest(details) => Some(details),
        Buyer::Registered(_) => None,
    };

    let order = OrderActive {
        id: Set(order_id),
        order_number: Set(build_order_number(order_id, now)),
        user_id: Set(buyer.user_id()),
        guest_email: Set(guest.map(|g| g.email.clone())),
        guest_name: Set(guest.and_then(|g| g.name.clone())),
        guest_phone: Set(guest.and_then(|g| g.phone.clone())),
        subtotal: Set(quote.subtotal),
        discount_amount: Set(quote.discount_amount),
        shipping_fee: Set(quote.shipping_fee),
        total_amount: Set(quote.total_amount),
        status: Set(status.as_str().to_string()),
        payment_method: Set(method.as_str().to_string()),
        payment_status: Set(PAYMENT_UNPAID.to_string()),
        shipping_address: Set(shipping_address),
        courier_id: Set(None),
        tx_ref: Set(None),
        stock_reserved: Set(true),
        paid_at: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(txn)
    .await?;

    let mut items = Vec::with_capacity(priced.len());
    for (product_id, line) in &priced {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(*product_id),
            quantity: Set(line.quantity),
            price: Set(line.unit_price),
            created_at: NotSet,
        }
        .insert(txn)
        .await?;
        items.push(OrderItem::from(item));

        if !repo::products::decrement_stock(txn, *product_id, line.quantity).await? {
            return Err(AppError::bad_request("Insufficient stock"));
        }
    }

    let note = match method {
        PaymentMethod::CashOnDelivery => "Order placed, cash on delivery",
        PaymentMethod::Chapa => "Order placed, awaiting payment",
    };
    repo::orders::append_history(txn, order.id, status, Some(note.to_string()), buyer.user_id())
        .await?;

    if let Buyer::Registered(user_id) = buyer {
        repo::cart::clear(txn, *user_id).await?;
    }

    Ok(CheckoutResponse {
        order: Order::from(order),
        items,
        quote,
    })
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    user.authorize(Resource::Orders, Action::Read)?;
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::Status.eq(status.clone()));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut finder = Orders::find().filter(condition);
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
    Ok(ApiResponse::success(
        "Orders",
        OrderList { items: orders },
        Some(meta),
    ))
}

/// Order with its items and status history.
pub(crate) async fn load_detail<C: ConnectionTrait>(
    conn: &C,
    order: OrderModel,
) -> AppResult<OrderWithItems> {
    let items = repo::orders::items(conn, order.id)
        .await?
        .into_iter()
        .map(OrderItem::from)
        .collect();
    let history = repo::orders::history(conn, order.id)
        .await?
        .into_iter()
        .map(OrderStatusEntry::from)
        .collect();
    Ok(OrderWithItems {
        order: Order::from(order),
        items,
        history,
    })
}

/// Own order, or any order for admins.
pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    user.authorize(Resource::Orders, Action::Read)?;
    let order = repo::orders::find(&state.orm, id)
        .await?
        .ok_or(AppError::NotFound)?;
    if user.role != Role::Admin && order.user_id != Some(user.user_id) {
        return Err(AppError::NotFound);
    }

    let detail = load_detail(&state.orm, order).await?;
    Ok(ApiResponse::success("Order", detail, Some(Meta::empty())))
}

/// Guest order lookup by order number and the email used at checkout.
pub async fn track_guest_order(
    state: &AppState,
    query: TrackOrderQuery,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let email = query.email.trim().to_lowercase();
    let order = repo::orders::find_by_number(&state.orm, query.order_number.trim())
        .await?
        .filter(|order| {
            order
                .guest_email
                .as_deref()
                .is_some_and(|guest| guest.eq_ignore_ascii_case(&email))
        })
        .ok_or(AppError::NotFound)?;

    let detail = load_detail(&state.orm, order).await?;
    Ok(ApiResponse::ok("Order", detail))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn order_number_has_date_and_short_id() {
        let id = Uuid::parse_str("a1b2c3d4-0000-4000-8000-000000000000").expect("uuid");
        let at = Utc.with_ymd_and_hms(2025, 3, 9, 12, 0, 0).single().expect("date");
        assert_eq!(build_order_number(id, at), "JF-20250309-A1B2C3D4");
    }

    #[test]
    fn duplicate_lines_merge() {
        let chair = Uuid::new_v4();
        let table = Uuid::new_v4();
        let merged = merge_lines([(chair, 1), (table, 2), (chair, 3)]).expect("merge");
        assert_eq!(merged.get(&chair), Some(&4));
        assert_eq!(merged.get(&table), Some(&2));
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn overflowing_merge_is_a_bad_request() {
        let chair = Uuid::new_v4();
        let err = merge_lines([(chair, i32::MAX), (chair, i32::MAX)]).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(merge_lines([(chair, i32::MAX)]).expect("merge").get(&chair), Some(&i32::MAX));
    }

    #[test]
    fn non_positive_lines_are_rejected() {
        assert!(merge_lines([(Uuid::new_v4(), 0)]).is_err());
        assert!(merge_lines([(Uuid::new_v4(), -2)]).is_err());
    }
}

