use chrono::Utc;
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter,
};
use uuid::Uuid;

use crate::{
    entity::{
        categories::{Column, Entity as Categories, Model},
        products::{Column as ProdCol, Entity as Products},
    },
    models::Category,
};

pub async fn find<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<Option<Model>, DbErr> {
    Categories::find_by_id(id).one(conn).await
}

pub async fn find_by_slug<C: ConnectionTrait>(
    conn: &C,
    slug: &str,
) -> Result<Option<Model>, DbErr> {
    Categories::find().filter(Column::Slug.eq(slug)).one(conn).await
}

/// True when another category already uses `name` or `slug`.
pub async fn name_or_slug_taken<C: ConnectionTrait>(
    conn: &C,
    name: Option<&str>,
    slug: Option<&str>,
    except: Option<Uuid>,
) -> Result<bool, DbErr> {
    if name.is_none() && slug.is_none() {
        return Ok(false);
    }

    let mut either = Condition::any();
    if let Some(name) = name {
        either = either.add(Column::Name.eq(name));
    }
    if let Some(slug) = slug {
        either = either.add(Column::Slug.eq(slug));
    }
    let mut condition = Condition::all().add(either);
    if let Some(id) = except {
        condition = condition.add(Column::Id.ne(id));
    }
    let count = Categories::find().filter(condition).count(conn).await?;
    Ok(count > 0)
}

pub async fn product_count<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<u64, DbErr> {
    Products::find()
        .filter(ProdCol::CategoryId.eq(id))
        .count(conn)
        .await
}

pub async fn child_count<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<u64, DbErr> {
    Categories::find()
        .filter(Column::ParentId.eq(id))
        .count(conn)
        .await
}

impl From<Model> for Category {
    fn from(model: Model) -> Self {
        Category {
            id: model.id,
            name: model.name,
            slug: model.slug,
            description: model.description,
            parent_id: model.parent_id,
            image_url: model.image_url,
            is_active: model.is_active,
            sort_order: model.sort_order,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}
