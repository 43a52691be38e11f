mod common;

use furniture_store::{
    dto::{categories::CreateCategoryRequest, products::CreateProductRequest},
    error::AppError,
    models::Role,
    routes::params::CategoryQuery,
    services::{category_service, product_service},
};
use uuid::Uuid;

use common::{create_category, create_product, create_user, setup_state};

#[tokio::test]
async fn category_with_products_or_children_cannot_be_deleted() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let admin = create_user(&state, Role::Admin).await?;

    let parent = create_category(&state, None).await?;
    let child = create_category(&state, Some(parent)).await?;
    let product_id = create_product(&state, 3_000, 1, Some(child)).await?;

    let err = category_service::delete_category(&state, &admin, parent)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = category_service::delete_category(&state, &admin, child)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    product_service::delete_product(&state, &admin, product_id).await?;
    category_service::delete_category(&state, &admin, child).await?;
    category_service::delete_category(&state, &admin, parent).await?;

    let err = category_service::get_category(&state, parent).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound));
    Ok(())
}

#[tokio::test]
async fn category_slugs_are_validated_and_unique() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let admin = create_user(&state, Role::Admin).await?;
    let slug = format!("chairs-{}", Uuid::new_v4().simple());

    let request = |slug: &str| CreateCategoryRequest {
        name: format!("Chairs {slug}"),
        slug: slug.to_string(),
        description: None,
        parent_id: None,
        image_url: None,
        is_active: None,
        sort_order: None,
    };

    let err = category_service::create_category(&state, &admin, request("Bad Slug!"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let created = category_service::create_category(&state, &admin, request(&slug))
        .await?
        .data
        .unwrap();
    let found = category_service::get_category_by_slug(&state, &slug)
        .await?
        .data
        .unwrap();
    assert_eq!(found.category.id, created.id);

    let err = category_service::create_category(&state, &admin, request(&slug))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let listed = category_service::list_categories(
        &state,
        CategoryQuery {
            active_only: Some(true),
            with_counts: Some(true),
        },
    )
    .await?
    .data
    .unwrap();
    assert!(listed.items.iter().any(|view| view.category.id == created.id));
    Ok(())
}

#[tokio::test]
async fn product_detail_falls_back_to_placeholder_image() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let admin = create_user(&state, Role::Admin).await?;
    let category_id = create_category(&state, None).await?;

    let created = product_service::create_product(
        &state,
        &admin,
        CreateProductRequest {
            name: "Teak Side Table".into(),
            description: None,
            price: 12_500,
            stock_quantity: 3,
            category_id: Some(category_id),
            image_url: None,
        },
    )
    .await?
    .data
    .unwrap();

    let detail = product_service::product_detail(&state, created.id)
        .await?
        .data
        .unwrap();
    assert_eq!(detail.images, vec![product_service::PLACEHOLDER_IMAGE.to_string()]);
    assert_eq!(detail.category.map(|c| c.id), Some(category_id));

    let user = create_user(&state, Role::User).await?;
    let err = product_service::delete_product(&state, &user, created.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
    Ok(())
}
