use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PaymentStatus;

/// One immutable status snapshot in a payment's audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentHistory {
    pub id: i64,
    pub payment_id: i64,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}
