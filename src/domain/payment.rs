use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub uuid: Uuid,
    pub order_id: String,
    pub amount: i64,
    pub status: PaymentStatus,
    pub payment_link: String,
    pub invoice_link: Option<String>,
    pub invoice_number: Option<String>,
    pub transaction_id: Option<String>,
    pub va_number: Option<String>,
    pub bank: Option<String>,
    pub acquirer: Option<String>,
    pub description: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub expired_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lifecycle of a payment. Codes are what the gateway side talks in and are
/// order-preserving; tokens are what we store in the history log and show.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Initial,
    Pending,
    Settlement,
    Expired,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 4] = [
        PaymentStatus::Initial,
        PaymentStatus::Pending,
        PaymentStatus::Settlement,
        PaymentStatus::Expired,
    ];

    pub fn code(self) -> i32 {
        match self {
            PaymentStatus::Initial => 0,
            PaymentStatus::Pending => 100,
            PaymentStatus::Settlement => 200,
            PaymentStatus::Expired => 300,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Initial => "initial",
            PaymentStatus::Pending => "pending",
            PaymentStatus::Settlement => "settlement",
            PaymentStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PaymentStatus::Settlement | PaymentStatus::Expired)
    }

    /// Initial -> Pending -> {Settlement, Expired}. A gateway may skip the
    /// pending notification, so Initial can also settle or expire directly.
    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (PaymentStatus::Initial, PaymentStatus::Pending) => true,
            (_, PaymentStatus::Settlement | PaymentStatus::Expired) => true,
            _ => false,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<i32> for PaymentStatus {
    type Error = AppError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(PaymentStatus::Initial),
            100 => Ok(PaymentStatus::Pending),
            200 => Ok(PaymentStatus::Settlement),
            300 => Ok(PaymentStatus::Expired),
            _ => Err(AppError::Internal(format!("unknown payment status code: {}", code))),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initial" => Ok(PaymentStatus::Initial),
            "pending" => Ok(PaymentStatus::Pending),
            "settlement" => Ok(PaymentStatus::Settlement),
            "expired" => Ok(PaymentStatus::Expired),
            _ => Err(AppError::Internal(format!("unknown payment status: {}", s))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreatePaymentRequest {
    #[validate(length(min = 1, max = 100))]
    pub order_id: String,
    #[validate(range(min = 1))]
    pub amount: i64,
    #[validate(nested)]
    pub customer_detail: CustomerDetail,
    #[validate(length(min = 1), nested)]
    pub item_details: Vec<ItemDetail>,
    pub description: Option<String>,
    pub expired_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CustomerDetail {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ItemDetail {
    #[validate(length(min = 1))]
    pub id: String,
    #[validate(range(min = 1))]
    pub amount: i64,
    #[validate(range(min = 1))]
    pub quantity: i32,
    #[validate(length(min = 1))]
    pub name: String,
}

/// Gateway notification, in the Midtrans field naming.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WebhookRequest {
    #[validate(length(min = 1))]
    pub order_id: String,
    pub transaction_id: Option<String>,
    pub transaction_status: PaymentStatus,
    #[serde(default)]
    pub va_numbers: Vec<VaNumber>,
    pub acquirer: Option<String>,
    #[serde(default)]
    pub payment_type: String,
    pub status_code: Option<String>,
    pub gross_amount: Option<String>,
    pub signature_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaNumber {
    pub bank: String,
    pub va_number: String,
}

/// Row to insert for a freshly created payment link.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub order_id: String,
    pub amount: i64,
    pub status: PaymentStatus,
    pub payment_link: String,
    pub description: Option<String>,
    pub expired_at: DateTime<Utc>,
}

/// Partial update; `None` leaves the stored column untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdatePayment {
    pub transaction_id: Option<String>,
    pub status: Option<PaymentStatus>,
    pub va_number: Option<String>,
    pub bank: Option<String>,
    pub acquirer: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub invoice_link: Option<String>,
    pub invoice_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub uuid: Uuid,
    pub order_id: String,
    pub amount: i64,
    pub status: PaymentStatus,
    pub payment_link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub va_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acquirer: Option<String>,
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expired_at: Option<DateTime<Utc>>,
}

impl PaymentResponse {
    /// The projection returned right after creation.
    pub fn summary(payment: &Payment) -> Self {
        Self {
            uuid: payment.uuid,
            order_id: payment.order_id.clone(),
            amount: payment.amount,
            status: payment.status,
            payment_link: payment.payment_link.clone(),
            invoice_link: None,
            transaction_id: None,
            va_number: None,
            bank: None,
            acquirer: None,
            description: payment.description.clone(),
            paid_at: None,
            created_at: None,
            updated_at: None,
            expired_at: None,
        }
    }
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        Self {
            uuid: payment.uuid,
            order_id: payment.order_id,
            amount: payment.amount,
            status: payment.status,
            payment_link: payment.payment_link,
            invoice_link: payment.invoice_link,
            transaction_id: payment.transaction_id,
            va_number: payment.va_number,
            bank: payment.bank,
            acquirer: payment.acquirer,
            description: payment.description,
            paid_at: payment.paid_at,
            created_at: Some(payment.created_at),
            updated_at: Some(payment.updated_at),
            expired_at: Some(payment.expired_at),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpiryUnit {
    Minute,
    Hour,
}

/// How long the hosted link stays open, in the gateway's duration+unit form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryWindow {
    pub duration: i64,
    pub unit: ExpiryUnit,
}

impl ExpiryWindow {
    /// Whole minutes until `expired_at`, or whole hours once at least an hour
    /// remains. Longer windows stay in hours; there is no day unit.
    pub fn between(now: DateTime<Utc>, expired_at: DateTime<Utc>) -> Self {
        let remaining = expired_at - now;
        if remaining >= Duration::hours(1) {
            Self {
                duration: remaining.num_hours(),
                unit: ExpiryUnit::Hour,
            }
        } else {
            Self {
                duration: remaining.num_minutes(),
                unit: ExpiryUnit::Minute,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_round_trip() {
        for status in PaymentStatus::ALL {
            assert_eq!(PaymentStatus::try_from(status.code()).unwrap(), status);
            assert_eq!(status.as_str().parse::<PaymentStatus>().unwrap(), status);
        }
    }

    #[test]
    fn status_codes_are_order_preserving() {
        let codes: Vec<i32> = PaymentStatus::ALL.iter().map(|s| s.code()).collect();
        assert_eq!(codes, vec![0, 100, 200, 300]);
        assert!(PaymentStatus::Initial < PaymentStatus::Expired);
    }

    #[test]
    fn unknown_codes_and_tokens_are_errors() {
        assert!(PaymentStatus::try_from(150).is_err());
        assert!(PaymentStatus::try_from(-1).is_err());
        assert!("capture".parse::<PaymentStatus>().is_err());
        assert!("Settlement".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn status_serializes_as_token() {
        let json = serde_json::to_string(&PaymentStatus::Settlement).unwrap();
        assert_eq!(json, "\"settlement\"");
        assert!(serde_json::from_str::<PaymentStatus>("\"deny\"").is_err());
    }

    #[test]
    fn transition_table() {
        use PaymentStatus::*;
        assert!(Initial.can_transition_to(Pending));
        assert!(Pending.can_transition_to(Settlement));
        assert!(Pending.can_transition_to(Expired));
        assert!(!Pending.can_transition_to(Initial));
        assert!(!Settlement.can_transition_to(Expired));
        assert!(!Expired.can_transition_to(Settlement));
        assert!(!Settlement.can_transition_to(Settlement));
        assert!(Settlement.is_terminal() && Expired.is_terminal());
    }

    #[test]
    fn expiry_window_uses_minutes_under_an_hour() {
        let now = Utc::now();
        let window = ExpiryWindow::between(now, now + Duration::minutes(30));
        assert_eq!(window, ExpiryWindow { duration: 30, unit: ExpiryUnit::Minute });

        let window = ExpiryWindow::between(now, now + Duration::seconds(3599));
        assert_eq!(window, ExpiryWindow { duration: 59, unit: ExpiryUnit::Minute });
    }

    #[test]
    fn expiry_window_switches_to_hours() {
        let now = Utc::now();
        let window = ExpiryWindow::between(now, now + Duration::minutes(90));
        assert_eq!(window, ExpiryWindow { duration: 1, unit: ExpiryUnit::Hour });

        let window = ExpiryWindow::between(now, now + Duration::days(3));
        assert_eq!(window, ExpiryWindow { duration: 72, unit: ExpiryUnit::Hour });
    }
}
