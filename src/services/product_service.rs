use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
    sea_query::{Expr, extension::postgres::PgExpr},
};
use uuid::Uuid;

use crate::{
    audit::{AuditEvent, record},
    dto::products::{CreateProductRequest, ProductDetail, ProductList, UpdateProductRequest},
    entity::{
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        products::{ActiveModel, Column, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Category, Product},
    policy::{Action, Resource},
    repo,
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    state::AppState,
};

pub const PLACEHOLDER_IMAGE: &str = "images/placeholder.jpg";
const RELATED_LIMIT: u64 = 4;

/// Splits the stored comma separated image list; never returns an empty list.
pub fn parse_images(image_url: Option<&str>) -> Vec<String> {
    let images: Vec<String> = image_url
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|path| !path.is_empty())
        .map(String::from)
        .collect();

    if images.is_empty() {
        vec![PLACEHOLDER_IMAGE.to_string()]
    } else {
        images
    }
}

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();

    if let Some(slug) = query.category.as_deref().filter(|s| !s.is_empty()) {
        match repo::categories::find_by_slug(&state.orm, slug).await? {
            Some(category) => condition = condition.add(Column::CategoryId.eq(category.id)),
            None => {
                let meta = Meta::new(page, limit, 0);
                return Ok(ApiResponse::success(
                    "Products",
                    ProductList { items: Vec::new() },
                    Some(meta),
                ));
            }
        }
    }

    if let Some(search) = query.q.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Name).ilike(pattern.clone()))
                .add(Expr::col(Column::Description).ilike(pattern)),
        );
    }

    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }

    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let sort_col = match sort_by {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::Price,
        ProductSortBy::Name => Column::Name,
    };

    let mut finder = Products::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

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
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let product = repo::products::find(&state.orm, id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::ok("Product", Product::from(product)))
}

/// Product page data: the product, its category, images and a few related items.
pub async fn product_detail(state: &AppState, id: Uuid) -> AppResult<ApiResponse<ProductDetail>> {
    let product = repo::products::find(&state.orm, id)
        .await?
        .ok_or(AppError::NotFound)?;

    let (category, related) = match product.category_id {
        Some(category_id) => {
            let category = repo::categories::find(&state.orm, category_id)
                .await?
                .map(Category::from);
            let related = repo::products::related(&state.orm, category_id, product.id, RELATED_LIMIT)
                .await?
                .into_iter()
                .map(Product::from)
                .collect();
            (category, related)
        }
        None => (None, Vec::new()),
    };

    let images = parse_images(product.image_url.as_deref());

    Ok(ApiResponse::ok(
        "Product",
        ProductDetail {
            product: Product::from(product),
            category,
            images,
            related,
        },
    ))
}

async fn ensure_category_exists(state: &AppState, category_id: Option<Uuid>) -> AppResult<()> {
    if let Some(id) = category_id {
        if repo::categories::find(&state.orm, id).await?.is_none() {
            return Err(AppError::bad_request("Category does not exist"));
        }
    }
    Ok(())
}

fn validate_fields(name: Option<&str>, price: Option<i64>, stock: Option<i32>) -> AppResult<()> {
    if name.is_some_and(|name| name.trim().is_empty()) {
        return Err(AppError::bad_request("Product name is required"));
    }
    if price.is_some_and(|price| price < 0) {
        return Err(AppError::bad_request("Price must not be negative"));
    }
    if stock.is_some_and(|stock| stock < 0) {
        return Err(AppError::bad_request("Stock quantity must not be negative"));
    }
    Ok(())
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    user.authorize(Resource::Catalog, Action::Create)?;
    validate_fields(
        Some(&payload.name),
        Some(payload.price),
        Some(payload.stock_quantity),
    )?;
    ensure_category_exists(state, payload.category_id).await?;

    let product = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name.trim().to_string()),
        description: Set(payload.description),
        price: Set(payload.price),
        stock_quantity: Set(payload.stock_quantity),
        category_id: Set(payload.category_id),
        image_url: Set(payload.image_url),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    record(
        &state.pool,
        AuditEvent::new(
            Some(user.user_id),
            "product_create",
            "products",
            serde_json::json!({ "product_id": product.id }),
        ),
    )
    .await;

    Ok(ApiResponse::success(
        "Product created",
        Product::from(product),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    user.authorize(Resource::Catalog, Action::Update)?;
    validate_fields(
        payload.name.as_deref(),
        payload.price,
        payload.stock_quantity,
    )?;
    ensure_category_exists(state, payload.category_id).await?;

    let existing = repo::products::find(&state.orm, id)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(price) = payload.price {
        active.price = Set(price);
    }
    if let Some(stock) = payload.stock_quantity {
        active.stock_quantity = Set(stock);
    }
    if let Some(category_id) = payload.category_id {
        active.category_id = Set(Some(category_id));
    }
    if let Some(image_url) = payload.image_url {
        active.image_url = Set(Some(image_url));
    }
    active.updated_at = Set(chrono::Utc::now().into());

    let product = active.update(&state.orm).await?;

    record(
        &state.pool,
        AuditEvent::new(
            Some(user.user_id),
            "product_update",
            "products",
            serde_json::json!({ "product_id": product.id }),
        ),
    )
    .await;

    Ok(ApiResponse::success(
        "Product updated",
        Product::from(product),
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    user.authorize(Resource::Catalog, Action::Delete)?;

    let ordered = OrderItems::find()
        .filter(OrderItemCol::ProductId.eq(id))
        .count(&state.orm)
        .await?;
    if ordered > 0 {
        return Err(AppError::bad_request(
            "Product appears in orders and cannot be deleted",
        ));
    }

    let result = Products::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    record(
        &state.pool,
        AuditEvent::new(
            Some(user.user_id),
            "product_delete",
            "products",
            serde_json::json!({ "product_id": id }),
        ),
    )
    .await;

    Ok(ApiResponse::success(
        "Product deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn images_split_and_trim() {
        assert_eq!(
            parse_images(Some("a.jpg, b.jpg,,c.jpg ")),
            vec!["a.jpg", "b.jpg", "c.jpg"]
        );
    }

    #[test]
    fn missing_images_fall_back_to_placeholder() {
        assert_eq!(parse_images(None), vec![PLACEHOLDER_IMAGE]);
        assert_eq!(parse_images(Some(" , ")), vec![PLACEHOLDER_IMAGE]);
    }

    #[test]
    fn product_fields_are_validated() {
        assert!(validate_fields(Some("Sofa"), Some(0), Some(0)).is_ok());
        assert!(validate_fields(Some("  "), Some(10), Some(1)).is_err());
        assert!(validate_fields(None, Some(-1), None).is_err());
        assert!(validate_fields(None, None, Some(-5)).is_err());
        assert!(validate_fields(None, None, None).is_ok());
    }
}
