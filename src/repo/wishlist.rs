use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::{
    entity::{
        products::{Entity as Products, Model as ProductModel},
        wishlist_items::{ActiveModel, Column, Entity as WishlistItems, Model},
    },
    models::WishlistItem,
};

pub async fn products<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> Result<Vec<(Model, ProductModel)>, DbErr> {
    let rows = WishlistItems::find()
        .find_also_related(Products)
        .filter(Column::UserId.eq(user_id))
        .order_by_desc(Column::CreatedAt)
        .all(conn)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(item, product)| product.map(|product| (item, product)))
        .collect())
}

pub async fn find<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    product_id: Uuid,
) -> Result<Option<Model>, DbErr> {
    WishlistItems::find()
        .filter(Column::UserId.eq(user_id))
        .filter(Column::ProductId.eq(product_id))
        .one(conn)
        .await
}

/// Adds the product unless it is already listed; returns the stored row.
pub async fn add<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    product_id: Uuid,
) -> Result<Model, DbErr> {
    if let Some(existing) = find(conn, user_id, product_id).await? {
        return Ok(existing);
    }
    ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        product_id: Set(product_id),
        created_at: NotSet,
    }
    .insert(conn)
    .await
}

pub async fn remove<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    product_id: Uuid,
) -> Result<u64, DbErr> {
    let result = WishlistItems::delete_many()
        .filter(Column::UserId.eq(user_id))
        .filter(Column::ProductId.eq(product_id))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

impl From<Model> for WishlistItem {
    fn from(model: Model) -> Self {
        WishlistItem {
            id: model.id,
            product_id: model.product_id,
            user_id: model.user_id,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}
