use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use sea_orm::{ActiveModelTrait, ActiveValue::NotSet, EntityTrait, Set};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit::{AuditEvent, record},
    dto::categories::{CategoryList, CategoryView, CreateCategoryRequest, UpdateCategoryRequest},
    entity::categories::{ActiveModel, Entity as Categories},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Category,
    policy::{Action, Resource},
    repo,
    response::{ApiResponse, Meta},
    routes::params::CategoryQuery,
    state::AppState,
};

static SLUG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9-]+$").expect("slug pattern compiles"));

pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_PATTERN.is_match(slug)
}

fn validate_slug(slug: &str) -> AppResult<()> {
    if is_valid_slug(slug) {
        Ok(())
    } else {
        Err(AppError::bad_request(
            "Slug may only contain lowercase letters, numbers and hyphens",
        ))
    }
}

#[derive(FromRow)]
struct CategoryRow {
    id: Uuid,
    name: String,
    slug: String,
    description: Option<String>,
    parent_id: Option<Uuid>,
    image_url: Option<String>,
    is_active: bool,
    sort_order: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    parent_name: Option<String>,
    product_count: i64,
}

impl CategoryRow {
    fn into_view(self, with_count: bool) -> CategoryView {
        CategoryView {
            category: Category {
                id: self.id,
                name: self.name,
                slug: self.slug,
                description: self.description,
                parent_id: self.parent_id,
                image_url: self.image_url,
                is_active: self.is_active,
                sort_order: self.sort_order,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
            parent_name: self.parent_name,
            product_count: with_count.then_some(self.product_count),
        }
    }
}

const CATEGORY_SELECT: &str = r#"
    SELECT c.id, c.name, c.slug, c.description, c.parent_id, c.image_url,
           c.is_active, c.sort_order, c.created_at, c.updated_at,
           parent.name AS parent_name,
           (SELECT COUNT(*) FROM products p WHERE p.category_id = c.id) AS product_count
    FROM categories c
    LEFT JOIN categories parent ON parent.id = c.parent_id
"#;

pub async fn list_categories(
    state: &AppState,
    query: CategoryQuery,
) -> AppResult<ApiResponse<CategoryList>> {
    let active_only = query.active_only.unwrap_or(false);
    let with_counts = query.with_counts.unwrap_or(false);

    let sql = format!(
        "{CATEGORY_SELECT} WHERE ($1 = FALSE OR c.is_active) ORDER BY c.sort_order ASC, c.name ASC"
    );
    let rows = sqlx::query_as::<_, CategoryRow>(&sql)
        .bind(active_only)
        .fetch_all(&state.pool)
        .await?;

    let items: Vec<CategoryView> = rows
        .into_iter()
        .map(|row| row.into_view(with_counts))
        .collect();
    let total = items.len() as i64;

    Ok(ApiResponse::success(
        "Categories",
        CategoryList { items },
        Some(Meta::new(1, total, total)),
    ))
}

pub async fn get_category(state: &AppState, id: Uuid) -> AppResult<ApiResponse<CategoryView>> {
    let sql = format!("{CATEGORY_SELECT} WHERE c.id = $1");
    let row = sqlx::query_as::<_, CategoryRow>(&sql)
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::ok("Category", row.into_view(true)))
}

pub async fn get_category_by_slug(
    state: &AppState,
    slug: &str,
) -> AppResult<ApiResponse<CategoryView>> {
    let sql = format!("{CATEGORY_SELECT} WHERE c.slug = $1");
    let row = sqlx::query_as::<_, CategoryRow>(&sql)
        .bind(slug)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::ok("Category", row.into_view(true)))
}

pub async fn create_category(
    state: &AppState,
    user: &AuthUser,
    payload: CreateCategoryRequest,
) -> AppResult<ApiResponse<Category>> {
    user.authorize(Resource::Catalog, Action::Create)?;

    let name = payload.name.trim().to_string();
    let slug = payload.slug.trim().to_string();
    if name.is_empty() || slug.is_empty() {
        return Err(AppError::bad_request("Name and slug are required"));
    }
    validate_slug(&slug)?;

    if repo::categories::name_or_slug_taken(&state.orm, Some(&name), Some(&slug), None).await? {
        return Err(AppError::bad_request(
            "Category with this name or slug already exists",
        ));
    }
    if let Some(parent_id) = payload.parent_id {
        if repo::categories::find(&state.orm, parent_id).await?.is_none() {
            return Err(AppError::bad_request("Parent category does not exist"));
        }
    }

    let category = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        slug: Set(slug),
        description: Set(payload.description),
        parent_id: Set(payload.parent_id),
        image_url: Set(payload.image_url),
        is_active: Set(payload.is_active.unwrap_or(true)),
        sort_order: Set(payload.sort_order.unwrap_or(0)),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    record(
        &state.pool,
        AuditEvent::new(
            Some(user.user_id),
            "category_create",
            "categories",
            serde_json::json!({ "category_id": category.id, "slug": category.slug }),
        ),
    )
    .await;

    Ok(ApiResponse::ok("Category created", Category::from(category)))
}

pub async fn update_category(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateCategoryRequest,
) -> AppResult<ApiResponse<Category>> {
    user.authorize(Resource::Catalog, Action::Update)?;

    if payload.is_empty() {
        return Err(AppError::bad_request("No fields to update"));
    }

    let existing = repo::categories::find(&state.orm, id)
        .await?
        .ok_or(AppError::NotFound)?;

    let name = payload.name.as_deref().map(str::trim);
    let slug = payload.slug.as_deref().map(str::trim);
    if name.is_some_and(str::is_empty) {
        return Err(AppError::bad_request("Name must not be empty"));
    }
    if let Some(slug) = slug {
        validate_slug(slug)?;
    }
    if repo::categories::name_or_slug_taken(&state.orm, name, slug, Some(id)).await? {
        return Err(AppError::bad_request(
            "Category with this name or slug already exists",
        ));
    }
    if let Some(parent_id) = payload.parent_id {
        if parent_id == id {
            return Err(AppError::bad_request("Category cannot be its own parent"));
        }
        if repo::categories::find(&state.orm, parent_id).await?.is_none() {
            return Err(AppError::bad_request("Parent category does not exist"));
        }
    }

    let mut active: ActiveModel = existing.into();
    if let Some(name) = name {
        active.name = Set(name.to_string());
    }
    if let Some(slug) = slug {
        active.slug = Set(slug.to_string());
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(parent_id) = payload.parent_id {
        active.parent_id = Set(Some(parent_id));
    }
    if let Some(image_url) = payload.image_url {
        active.image_url = Set(Some(image_url));
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }
    if let Some(sort_order) = payload.sort_order {
        active.sort_order = Set(sort_order);
    }
    active.updated_at = Set(Utc::now().into());

    let category = active.update(&state.orm).await?;

    record(
        &state.pool,
        AuditEvent::new(
            Some(user.user_id),
            "category_update",
            "categories",
            serde_json::json!({ "category_id": category.id }),
        ),
    )
    .await;

    Ok(ApiResponse::ok("Category updated", Category::from(category)))
}

pub async fn delete_category(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    user.authorize(Resource::Catalog, Action::Delete)?;

    if repo::categories::find(&state.orm, id).await?.is_none() {
        return Err(AppError::NotFound);
    }

    let products = repo::categories::product_count(&state.orm, id).await?;
    if products > 0 {
        return Err(AppError::bad_request(format!(
            "Cannot delete category with {products} product(s). Move or delete them first."
        )));
    }
    let children = repo::categories::child_count(&state.orm, id).await?;
    if children > 0 {
        return Err(AppError::bad_request(format!(
            "Cannot delete category with {children} subcategory(ies)."
        )));
    }

    Categories::delete_by_id(id).exec(&state.orm).await?;

    record(
        &state.pool,
        AuditEvent::new(
            Some(user.user_id),
            "category_delete",
            "categories",
            serde_json::json!({ "category_id": id }),
        ),
    )
    .await;

    Ok(ApiResponse::ok("Category deleted", serde_json::json!({})))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_are_lowercase_words_and_hyphens() {
        assert!(is_valid_slug("living-room"));
        assert!(is_valid_slug("chairs2"));
        assert!(!is_valid_slug("Living-Room"));
        assert!(!is_valid_slug("living room"));
        assert!(!is_valid_slug("living_room"));
        assert!(!is_valid_slug(""));
    }
}
