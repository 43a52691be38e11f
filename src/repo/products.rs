use chrono::Utc;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    sea_query::{Expr, LockType},
};
use uuid::Uuid;

use crate::{
    entity::products::{Column, Entity as Products, Model},
    models::Product,
};

pub async fn find<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<Option<Model>, DbErr> {
    Products::find_by_id(id).one(conn).await
}

/// Locks the given product rows, always in id order.
pub async fn lock_many<C: ConnectionTrait>(conn: &C, ids: &[Uuid]) -> Result<Vec<Model>, DbErr> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    Products::find()
        .filter(Column::Id.is_in(ids.iter().copied()))
        .order_by_asc(Column::Id)
        .lock(LockType::Update)
        .all(conn)
        .await
}

pub async fn lock_one<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<Option<Model>, DbErr> {
    Products::find_by_id(id)
        .lock(LockType::Update)
        .one(conn)
        .await
}

/// Takes `quantity` units out of stock. Returns false, changing nothing, when
/// fewer than `quantity` units are left.
pub async fn decrement_stock<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    quantity: i32,
) -> Result<bool, DbErr> {
    let result = Products::update_many()
        .col_expr(
            Column::StockQuantity,
            Expr::col(Column::StockQuantity).sub(quantity),
        )
        .col_expr(Column::UpdatedAt, Expr::current_timestamp().into())
        .filter(Column::Id.eq(id))
        .filter(Column::StockQuantity.gte(quantity))
        .exec(conn)
        .await?;
    Ok(result.rows_affected == 1)
}

pub async fn increment_stock<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    quantity: i32,
) -> Result<(), DbErr> {
    Products::update_many()
        .col_expr(
            Column::StockQuantity,
            Expr::col(Column::StockQuantity).add(quantity),
        )
        .col_expr(Column::UpdatedAt, Expr::current_timestamp().into())
        .filter(Column::Id.eq(id))
        .exec(conn)
        .await?;
    Ok(())
}

/// In-stock products of the same category, newest first.
pub async fn related<C: ConnectionTrait>(
    conn: &C,
    category_id: Uuid,
    exclude: Uuid,
    limit: u64,
) -> Result<Vec<Model>, DbErr> {
    Products::find()
        .filter(Column::CategoryId.eq(category_id))
        .filter(Column::Id.ne(exclude))
        .filter(Column::StockQuantity.gt(0))
        .order_by_desc(Column::CreatedAt)
        .limit(limit)
        .all(conn)
        .await
}

impl From<Model> for Product {
    fn from(model: Model) -> Self {
        Product {
            id: model.id,
            name: model.name,
            description: model.description,
            price: model.price,
            stock_quantity: model.stock_quantity,
            category_id: model.category_id,
            image_url: model.image_url,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}
