use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    models::{Order, OrderItem, OrderStatusEntry, PaymentMethod},
    pricing::OrderQuote,
};

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct GuestDetails {
    pub email: String,
    pub name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct GuestCartLine {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CheckoutRequest {
    pub shipping_address: String,
    pub payment_method: PaymentMethod,
    /// Required when checking out without a session.
    pub guest: Option<GuestDetails>,
    /// Guest cart; ignored for registered users, whose server cart is used.
    #[serde(default)]
    pub cart_items: Vec<GuestCartLine>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub history: Vec<OrderStatusEntry>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CheckoutResponse {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub quote: OrderQuote,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TrackOrderQuery {
    pub order_number: String,
    pub email: String,
}
