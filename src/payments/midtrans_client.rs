use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;

use crate::{
    domain::ExpiryWindow,
    error::{AppError, Result},
    payments::{PaymentGateway, PaymentLink, PaymentLinkRequest},
};

const SANDBOX_URL: &str = "https://app.sandbox.midtrans.com";
const PRODUCTION_URL: &str = "https://app.midtrans.com";

pub struct MidtransClient {
    client: reqwest::Client,
    server_key: String,
    base_url: String,
}

#[derive(Serialize)]
struct SnapRequest<'a> {
    transaction_details: TransactionDetails<'a>,
    customer_details: CustomerDetails<'a>,
    item_details: [SnapItem<'a>; 1],
    expiry: ExpiryWindow,
}

#[derive(Serialize)]
struct TransactionDetails<'a> {
    order_id: &'a str,
    gross_amount: i64,
}

#[derive(Serialize)]
struct CustomerDetails<'a> {
    first_name: &'a str,
    email: &'a str,
    phone: &'a str,
}

#[derive(Serialize)]
struct SnapItem<'a> {
    id: &'a str,
    price: i64,
    quantity: i32,
    name: &'a str,
}

#[derive(Deserialize)]
struct SnapResponse {
    token: String,
    redirect_url: String,
}

#[derive(Deserialize)]
struct SnapErrorResponse {
    #[serde(default)]
    error_messages: Vec<String>,
}

impl MidtransClient {
    pub fn new(server_key: String, is_production: bool) -> Self {
        if is_production {
            tracing::info!("Midtrans running in production mode");
        } else {
            tracing::info!("Midtrans running in sandbox mode");
        }

        let base_url = if is_production { PRODUCTION_URL } else { SANDBOX_URL };
        Self::with_base_url(server_key, base_url.to_string())
    }

    pub fn with_base_url(server_key: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            server_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PaymentGateway for MidtransClient {
    async fn create_payment_link(&self, request: PaymentLinkRequest) -> Result<PaymentLink> {
        let body = snap_request(&request);

        let response = self
            .client
            .post(format!("{}/snap/v1/transactions", self.base_url))
            .basic_auth(&self.server_key, Some(""))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("Midtrans request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let messages = response
                .json::<SnapErrorResponse>()
                .await
                .map(|e| e.error_messages.join(", "))
                .unwrap_or_default();
            tracing::error!("Error create transaction: {} {}", status, messages);
            return Err(AppError::Gateway(format!(
                "Midtrans returned {}: {}",
                status, messages
            )));
        }

        let snap = response
            .json::<SnapResponse>()
            .await
            .map_err(|e| AppError::Gateway(format!("Invalid Midtrans response: {}", e)))?;

        Ok(PaymentLink {
            token: snap.token,
            redirect_url: snap.redirect_url,
        })
    }
}

/// Only the first item is forwarded; the gross amount is the order total.
fn snap_request(request: &PaymentLinkRequest) -> SnapRequest<'_> {
    SnapRequest {
        transaction_details: TransactionDetails {
            order_id: &request.order_id,
            gross_amount: request.gross_amount,
        },
        customer_details: CustomerDetails {
            first_name: &request.customer.name,
            email: &request.customer.email,
            phone: &request.customer.phone,
        },
        item_details: [SnapItem {
            id: &request.item.id,
            price: request.item.amount,
            quantity: request.item.quantity,
            name: &request.item.name,
        }],
        expiry: request.expiry,
    }
}

/// Checks a notification's `signature_key`, which Midtrans computes as
/// hex(sha512(order_id + status_code + gross_amount + server_key)).
pub fn verify_signature(
    server_key: &str,
    order_id: &str,
    status_code: &str,
    gross_amount: &str,
    signature_key: &str,
) -> bool {
    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    let expected = hex::encode(hasher.finalize());

    expected
        .as_bytes()
        .ct_eq(signature_key.to_ascii_lowercase().as_bytes())
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CustomerDetail, ExpiryUnit, ItemDetail};

    fn sign(parts: &[&str]) -> String {
        let mut hasher = Sha512::new();
        for part in parts {
            hasher.update(part.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    #[test]
    fn accepts_matching_signature() {
        let signature = sign(&["ORD-1", "200", "50000.00", "server-key"]);
        assert!(verify_signature("server-key", "ORD-1", "200", "50000.00", &signature));
        assert!(verify_signature(
            "server-key",
            "ORD-1",
            "200",
            "50000.00",
            &signature.to_uppercase()
        ));
    }

    #[test]
    fn rejects_tampered_signature() {
        let signature = sign(&["ORD-1", "200", "50000.00", "server-key"]);
        assert!(!verify_signature("server-key", "ORD-1", "200", "99999.00", &signature));
        assert!(!verify_signature("other-key", "ORD-1", "200", "50000.00", &signature));
        assert!(!verify_signature("server-key", "ORD-1", "200", "50000.00", ""));
    }

    #[test]
    fn snap_request_body_shape() {
        let request = PaymentLinkRequest {
            order_id: "ORD-1".to_string(),
            gross_amount: 50_000,
            customer: CustomerDetail {
                name: "Budi".to_string(),
                email: "budi@example.com".to_string(),
                phone: "08123".to_string(),
            },
            item: ItemDetail {
                id: "SKU-1".to_string(),
                amount: 50_000,
                quantity: 1,
                name: "Futsal court".to_string(),
            },
            expiry: ExpiryWindow { duration: 30, unit: ExpiryUnit::Minute },
        };
        let body = snap_request(&request);

        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["transaction_details"]["gross_amount"], 50_000);
        assert_eq!(value["item_details"][0]["id"], "SKU-1");
        assert_eq!(value["expiry"]["unit"], "minute");
        assert_eq!(value["expiry"]["duration"], 30);
    }

    #[test]
    fn base_url_is_normalised() {
        let client = MidtransClient::with_base_url("key".to_string(), "http://localhost:9000/".to_string());
        assert_eq!(client.base_url, "http://localhost:9000");
        assert_eq!(MidtransClient::new("key".to_string(), true).base_url, PRODUCTION_URL);
    }
}
