use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};

use crate::{
    domain::{PaymentHistory, PaymentStatus},
    error::{AppError, Result},
    repository::PaymentHistoryRepository,
};

#[derive(FromRow)]
struct PaymentHistoryRow {
    id: i64,
    payment_id: i64,
    status: String,
    created_at: NaiveDateTime,
}

pub struct SqlitePaymentHistoryRepository {
    pool: SqlitePool,
}

impl SqlitePaymentHistoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_history(row: PaymentHistoryRow) -> Result<PaymentHistory> {
        Ok(PaymentHistory {
            id: row.id,
            payment_id: row.payment_id,
            status: row.status.parse::<PaymentStatus>()
                .map_err(|e| AppError::Database(e.to_string()))?,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
        })
    }
}

#[async_trait]
impl PaymentHistoryRepository for SqlitePaymentHistoryRepository {
    async fn create(&self, conn: &mut SqliteConnection, payment_id: i64, status: PaymentStatus) -> Result<PaymentHistory> {
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            INSERT INTO payment_histories (payment_id, status, created_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(payment_id)
        .bind(status.as_str())
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(PaymentHistory {
            id: result.last_insert_rowid(),
            payment_id,
            status,
            created_at: DateTime::from_naive_utc_and_offset(now, Utc),
        })
    }

    async fn list_by_payment(&self, payment_id: i64) -> Result<Vec<PaymentHistory>> {
        let rows = sqlx::query_as::<_, PaymentHistoryRow>(
            r#"
            SELECT id, payment_id, status, created_at
            FROM payment_histories
            WHERE payment_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(payment_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter()
            .map(Self::row_to_history)
            .collect()
    }
}
