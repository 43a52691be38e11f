use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct InitializePaymentRequest {
    pub order_id: Uuid,
    /// Must match the order's guest email for guest orders.
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PaymentReference {
    #[serde(alias = "trx_ref")]
    pub tx_ref: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentConfirmation {
    pub order_id: Uuid,
    pub order_number: String,
    pub status: String,
    pub payment_status: String,
    /// True when this call found the order already paid.
    pub already_paid: bool,
}
