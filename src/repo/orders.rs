use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, sea_query::LockType,
};
use uuid::Uuid;

use crate::{
    entity::{
        order_items::{Column as ItemCol, Entity as OrderItems, Model as ItemModel},
        order_status_history::{
            ActiveModel as HistoryActive, Column as HistoryCol, Entity as History,
            Model as HistoryModel,
        },
        orders::{Column, Entity as Orders, Model},
    },
    models::{Order, OrderItem, OrderStatus, OrderStatusEntry},
};

pub async fn find<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<Option<Model>, DbErr> {
    Orders::find_by_id(id).one(conn).await
}

pub async fn lock<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<Option<Model>, DbErr> {
    Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(conn)
        .await
}

pub async fn lock_by_number<C: ConnectionTrait>(
    conn: &C,
    order_number: &str,
) -> Result<Option<Model>, DbErr> {
    Orders::find()
        .filter(Column::OrderNumber.eq(order_number))
        .lock(LockType::Update)
        .one(conn)
        .await
}

pub async fn find_by_number<C: ConnectionTrait>(
    conn: &C,
    order_number: &str,
) -> Result<Option<Model>, DbErr> {
    Orders::find()
        .filter(Column::OrderNumber.eq(order_number))
        .one(conn)
        .await
}

pub async fn items<C: ConnectionTrait>(conn: &C, order_id: Uuid) -> Result<Vec<ItemModel>, DbErr> {
    OrderItems::find()
        .filter(ItemCol::OrderId.eq(order_id))
        .order_by_asc(ItemCol::CreatedAt)
        .all(conn)
        .await
}

pub async fn history<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> Result<Vec<HistoryModel>, DbErr> {
    History::find()
        .filter(HistoryCol::OrderId.eq(order_id))
        .order_by_asc(HistoryCol::CreatedAt)
        .all(conn)
        .await
}

pub async fn append_history<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
    status: OrderStatus,
    note: Option<String>,
    changed_by: Option<Uuid>,
) -> Result<HistoryModel, DbErr> {
    HistoryActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order_id),
        status: Set(status.as_str().to_string()),
        note: Set(note),
        changed_by: Set(changed_by),
        created_at: NotSet,
    }
    .insert(conn)
    .await
}

impl From<Model> for Order {
    fn from(model: Model) -> Self {
        Order {
            id: model.id,
            order_number: model.order_number,
            user_id: model.user_id,
            guest_email: model.guest_email,
            guest_name: model.guest_name,
            guest_phone: model.guest_phone,
            subtotal: model.subtotal,
            discount_amount: model.discount_amount,
            shipping_fee: model.shipping_fee,
            total_amount: model.total_amount,
            status: model.status,
            payment_method: model.payment_method,
            payment_status: model.payment_status,
            shipping_address: model.shipping_address,
            courier_id: model.courier_id,
            tx_ref: model.tx_ref,
            paid_at: model.paid_at.map(|dt| dt.with_timezone(&Utc)),
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

impl From<ItemModel> for OrderItem {
    fn from(model: ItemModel) -> Self {
        OrderItem {
            id: model.id,
            order_id: model.order_id,
            product_id: model.product_id,
            quantity: model.quantity,
            price: model.price,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

impl From<HistoryModel> for OrderStatusEntry {
    fn from(model: HistoryModel) -> Self {
        OrderStatusEntry {
            id: model.id,
            status: model.status,
            note: model.note,
            changed_by: model.changed_by,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}
