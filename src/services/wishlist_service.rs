use chrono::Utc;
use sea_orm::TransactionTrait;
use uuid::Uuid;

use crate::{
    dto::wishlist::{AddToWishlistRequest, MoveToCartRequest, WishlistEntry, WishlistList},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{CartItem, Product, WishlistItem},
    policy::{Action, Resource},
    repo,
    response::ApiResponse,
    services::cart_service,
    state::AppState,
};

pub async fn list_wishlist(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<WishlistList>> {
    user.authorize(Resource::Wishlist, Action::Read)?;
    let items: Vec<WishlistEntry> = repo::wishlist::products(&state.orm, user.user_id)
        .await?
        .into_iter()
        .map(|(entry, product)| WishlistEntry {
            id: entry.id,
            product: Product::from(product),
            added_at: entry.created_at.with_timezone(&Utc),
        })
        .collect();
    let count = items.len() as i64;
    Ok(ApiResponse::ok("Wishlist", WishlistList { items, count }))
}

/// Idempotent: adding a listed product returns the existing entry.
pub async fn add_to_wishlist(
    state: &AppState,
    user: &AuthUser,
    payload: AddToWishlistRequest,
) -> AppResult<ApiResponse<WishlistItem>> {
    user.authorize(Resource::Wishlist, Action::Create)?;
    if repo::products::find(&state.orm, payload.product_id)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound);
    }
    let entry = repo::wishlist::add(&state.orm, user.user_id, payload.product_id).await?;
    Ok(ApiResponse::ok("Added to wishlist", WishlistItem::from(entry)))
}

pub async fn remove_from_wishlist(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    user.authorize(Resource::Wishlist, Action::Delete)?;
    let removed = repo::wishlist::remove(&state.orm, user.user_id, product_id).await?;
    if removed == 0 {
        return Err(AppError::NotFound);
    }
    Ok(ApiResponse::ok(
        "Removed from wishlist",
        serde_json::json!({ "product_id": product_id }),
    ))
}

/// Moves a wishlist entry into the cart in one transaction.
pub async fn move_to_cart(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: MoveToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    user.authorize(Resource::Wishlist, Action::Update)?;
    user.authorize(Resource::Cart, Action::Create)?;
    let quantity = payload.quantity.unwrap_or(1);

    let txn = state.orm.begin().await?;
    if repo::wishlist::find(&txn, user.user_id, product_id)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound);
    }
    let item = cart_service::add_line(&txn, user.user_id, product_id, quantity).await?;
    repo::wishlist::remove(&txn, user.user_id, product_id).await?;
    txn.commit().await?;

    Ok(ApiResponse::ok("Moved to cart", CartItem::from(item)))
}
