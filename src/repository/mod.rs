use async_trait::async_trait;
use sqlx::SqliteConnection;
use uuid::Uuid;
use crate::domain::*;
use crate::error::Result;

pub mod payment_repository;
pub mod payment_history_repository;
pub mod transaction;

pub use payment_repository::SqlitePaymentRepository;
pub use payment_history_repository::SqlitePaymentHistoryRepository;
pub use transaction::WriteTransaction;

/// Methods taking a connection run on the caller's transaction; the rest use
/// the repository's own pool.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn create(&self, conn: &mut SqliteConnection, payment: NewPayment) -> Result<Payment>;
    async fn find_by_uuid(&self, uuid: Uuid) -> Result<Option<Payment>>;
    async fn find_by_order_id(&self, conn: &mut SqliteConnection, order_id: &str) -> Result<Option<Payment>>;
    async fn invoice_number_exists(&self, conn: &mut SqliteConnection, invoice_number: &str) -> Result<bool>;
    async fn update(&self, conn: &mut SqliteConnection, order_id: &str, update: UpdatePayment) -> Result<()>;
    async fn list(&self, params: &PaymentListParams) -> Result<(Vec<Payment>, i64)>;
}

#[async_trait]
pub trait PaymentHistoryRepository: Send + Sync {
    async fn create(&self, conn: &mut SqliteConnection, payment_id: i64, status: PaymentStatus) -> Result<PaymentHistory>;
    async fn list_by_payment(&self, payment_id: i64) -> Result<Vec<PaymentHistory>>;
}
