use sea_orm::{ConnectionTrait, EntityTrait, TransactionTrait};
use uuid::Uuid;

use crate::{
    dto::cart::{AddToCartRequest, CartItemDto, CartList, CartSummary, UpdateCartItemRequest},
    entity::cart_items::{Entity as CartItems, Model as CartModel},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{CartItem, Product},
    policy::{Action, Resource},
    pricing::{OrderQuote, PricedLine},
    repo,
    response::{ApiResponse, Meta},
    state::AppState,
};

pub fn summarize(items: &[CartItemDto]) -> CartSummary {
    CartSummary {
        total: items.iter().map(|item| item.line_total).sum(),
        count: items.iter().map(|item| i64::from(item.quantity)).sum(),
    }
}

fn ensure_positive(quantity: i32) -> AppResult<()> {
    if quantity <= 0 {
        return Err(AppError::bad_request("Quantity must be greater than zero"));
    }
    Ok(())
}

/// Adds two line quantities, rejecting totals that do not fit an `i32`.
pub(crate) fn quantity_sum(current: i32, extra: i32) -> AppResult<i32> {
    current
        .checked_add(extra)
        .ok_or_else(|| AppError::bad_request("Quantity is too large"))
}

pub(crate) fn ensure_in_stock(product_name: &str, requested: i32, stock: i32) -> AppResult<()> {
    if requested > stock {
        return Err(AppError::bad_request(format!(
            "Only {stock} item(s) of {product_name} in stock"
        )));
    }
    Ok(())
}

async fn cart_items(state: &AppState, user_id: Uuid) -> AppResult<Vec<CartItemDto>> {
    let items = repo::cart::lines(&state.orm, user_id)
        .await?
        .into_iter()
        .map(|(item, product)| CartItemDto {
            id: item.id,
            line_total: product.price * i64::from(item.quantity),
            quantity: item.quantity,
            product: Product::from(product),
        })
        .collect();
    Ok(items)
}

pub async fn list_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartList>> {
    user.authorize(Resource::Cart, Action::Read)?;
    let items = cart_items(state, user.user_id).await?;
    let summary = summarize(&items);
    let total = items.len() as i64;
    Ok(ApiResponse::success(
        "Cart",
        CartList { items, summary },
        Some(Meta::new(1, total, total)),
    ))
}

/// Priced preview of the cart with the same rules checkout applies.
pub async fn quote_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<OrderQuote>> {
    user.authorize(Resource::Cart, Action::Read)?;
    let lines: Vec<PricedLine> = cart_items(state, user.user_id)
        .await?
        .iter()
        .map(|item| PricedLine {
            unit_price: item.product.price,
            quantity: item.quantity,
        })
        .collect();
    Ok(ApiResponse::ok("Cart quote", state.config.pricing.quote(&lines)))
}

/// Adds `quantity` of a product, merging with an existing line. Runs on the
/// caller's connection so it can join a larger transaction.
pub(crate) async fn add_line<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    product_id: Uuid,
    quantity: i32,
) -> AppResult<CartModel> {
    ensure_positive(quantity)?;
    let product = repo::products::lock_one(conn, product_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let existing = repo::cart::find_by_product(conn, user_id, product_id).await?;
    let merged = quantity_sum(existing.as_ref().map_or(0, |item| item.quantity), quantity)?;
    ensure_in_stock(&product.name, merged, product.stock_quantity)?;

    let item = repo::cart::upsert(conn, existing, user_id, product_id, merged).await?;
    Ok(item)
}

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    user.authorize(Resource::Cart, Action::Create)?;
    ensure_positive(payload.quantity)?;

    let txn = state.orm.begin().await?;
    let item = add_line(&txn, user.user_id, payload.product_id, payload.quantity).await?;
    txn.commit().await?;

    tracing::debug!(user_id = %user.user_id, product_id = %item.product_id, quantity = item.quantity, "cart line saved");
    Ok(ApiResponse::ok("Added to cart", CartItem::from(item)))
}

pub async fn update_quantity(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<CartItem>> {
    user.authorize(Resource::Cart, Action::Update)?;
    ensure_positive(payload.quantity)?;

    let txn = state.orm.begin().await?;
    let item = repo::cart::find_for_user(&txn, user.user_id, item_id)
        .await?
        .ok_or(AppError::NotFound)?;
    let product = repo::products::lock_one(&txn, item.product_id)
        .await?
        .ok_or(AppError::NotFound)?;
    ensure_in_stock(&product.name, payload.quantity, product.stock_quantity)?;

    let product_id = item.product_id;
    let item = repo::cart::upsert(&txn, Some(item), user.user_id, product_id, payload.quantity).await?;
    txn.commit().await?;

    Ok(ApiResponse::ok("Cart updated", CartItem::from(item)))
}

pub async fn remove_item(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    user.authorize(Resource::Cart, Action::Delete)?;
    let item = repo::cart::find_for_user(&state.orm, user.user_id, item_id)
        .await?
        .ok_or(AppError::NotFound)?;
    CartItems::delete_by_id(item.id).exec(&state.orm).await?;
    Ok(ApiResponse::ok("Removed from cart", serde_json::json!({ "id": item_id })))
}

pub async fn clear_cart(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<serde_json::Value>> {
    user.authorize(Resource::Cart, Action::Delete)?;
    let removed = repo::cart::clear(&state.orm, user.user_id).await?;
    Ok(ApiResponse::ok("Cart cleared", serde_json::json!({ "removed": removed })))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn line(price: i64, quantity: i32) -> CartItemDto {
        let now = Utc::now();
        CartItemDto {
            id: Uuid::new_v4(),
            product: Product {
                id: Uuid::new_v4(),
                name: "Chair".into(),
                description: None,
                price,
                stock_quantity: 10,
                category_id: None,
                image_url: None,
                created_at: now,
                updated_at: now,
            },
            quantity,
            line_total: price * i64::from(quantity),
        }
    }

    #[test]
    fn summary_counts_units_not_lines() {
        let summary = summarize(&[line(1_000, 2), line(250, 3)]);
        assert_eq!(summary, CartSummary { total: 2_750, count: 5 });
        assert_eq!(summarize(&[]), CartSummary { total: 0, count: 0 });
    }

    #[test]
    fn stock_limit_is_inclusive() {
        assert!(ensure_in_stock("Sofa", 3, 3).is_ok());
        assert!(ensure_in_stock("Sofa", 4, 3).is_err());
        assert!(ensure_positive(0).is_err());
    }

    #[test]
    fn quantity_sum_rejects_overflow() {
        assert_eq!(quantity_sum(2, 3).expect("sum"), 5);
        assert!(matches!(quantity_sum(1, i32::MAX), Err(AppError::BadRequest(_))));
    }
}
