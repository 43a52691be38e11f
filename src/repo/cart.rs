use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::{
    entity::{
        cart_items::{ActiveModel, Column, Entity as CartItems, Model},
        products::{Entity as Products, Model as ProductModel},
    },
    models::CartItem,
};

/// Cart rows of a user with their products, newest first.
pub async fn lines<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> Result<Vec<(Model, ProductModel)>, DbErr> {
    let rows = CartItems::find()
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

pub async fn find_for_user<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    item_id: Uuid,
) -> Result<Option<Model>, DbErr> {
    CartItems::find_by_id(item_id)
        .filter(Column::UserId.eq(user_id))
        .one(conn)
        .await
}

pub async fn find_by_product<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    product_id: Uuid,
) -> Result<Option<Model>, DbErr> {
    CartItems::find()
        .filter(Column::UserId.eq(user_id))
        .filter(Column::ProductId.eq(product_id))
        .one(conn)
        .await
}

/// Sets the quantity of an existing row or inserts a new one.
pub async fn upsert<C: ConnectionTrait>(
    conn: &C,
    existing: Option<Model>,
    user_id: Uuid,
    product_id: Uuid,
    quantity: i32,
) -> Result<Model, DbErr> {
    match existing {
        Some(item) => {
            let mut active: ActiveModel = item.into();
            active.quantity = Set(quantity);
            active.update(conn).await
        }
        None => {
            ActiveModel {
                id: Set(Uuid::new_v4()),
                user_id: Set(user_id),
                product_id: Set(product_id),
                quantity: Set(quantity),
                created_at: NotSet,
            }
            .insert(conn)
            .await
        }
    }
}

pub async fn clear<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> Result<u64, DbErr> {
    let result = CartItems::delete_many()
        .filter(Column::UserId.eq(user_id))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

impl From<Model> for CartItem {
    fn from(model: Model) -> Self {
        CartItem {
            id: model.id,
            product_id: model.product_id,
            user_id: model.user_id,
            quantity: model.quantity,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}
