use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Payment, PaymentStatus};

/// Envelope published on the payment topic after a status change commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    pub event: EventName,
    pub metadata: EventMetadata,
    pub body: EventBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventName {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    pub sender: String,
    #[serde(rename = "sendingAt")]
    pub sending_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBody {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: PaymentEventData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEventData {
    #[serde(rename = "orderID")]
    pub order_id: String,
    #[serde(rename = "paymentID")]
    pub payment_id: Uuid,
    pub status: String,
    #[serde(rename = "paidAt")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(rename = "expiredAt")]
    pub expired_at: DateTime<Utc>,
}

impl EventMessage {
    pub fn status_changed(
        payment: &Payment,
        status: PaymentStatus,
        paid_at: Option<DateTime<Utc>>,
        sender: &str,
        sending_at: DateTime<Utc>,
    ) -> Self {
        let name = status.as_str().to_uppercase();
        Self {
            event: EventName { name: name.clone() },
            metadata: EventMetadata {
                sender: sender.to_string(),
                sending_at: sending_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            },
            body: EventBody {
                kind: "JSON".to_string(),
                data: PaymentEventData {
                    order_id: payment.order_id.clone(),
                    payment_id: payment.uuid,
                    status: name,
                    paid_at,
                    expired_at: payment.expired_at,
                },
            },
        }
    }
}
