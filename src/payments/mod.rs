use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    domain::{CustomerDetail, ExpiryWindow, ItemDetail},
    error::Result,
};

pub mod midtrans_client;

pub use midtrans_client::{verify_signature, MidtransClient};

/// What the gateway needs to open a hosted payment page.
#[derive(Debug, Clone)]
pub struct PaymentLinkRequest {
    pub order_id: String,
    pub gross_amount: i64,
    pub customer: CustomerDetail,
    pub item: ItemDetail,
    pub expiry: ExpiryWindow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentLink {
    pub token: String,
    pub redirect_url: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment_link(&self, request: PaymentLinkRequest) -> Result<PaymentLink>;
}
